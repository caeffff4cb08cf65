//! Write functions - persist batches to PostgreSQL and companion CSV files
//!
//! Both tables are assumed to exist. Sensor rows are plain appends; history
//! rows are delivered per window inside one transaction that first clears the
//! (sensor, window start, window end) key, so re-running a range replaces
//! what the previous run delivered instead of stacking duplicates.

use anyhow::Result;
use sqlx::PgPool;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::ingestion::fetch::SENSOR_FIELDS;
use crate::ingestion::types::{DateWindow, HistoryRecord, MeasurementBatch, Sensor};
use crate::ingestion::utils::file_stamp;

/// Append the located sensors to the `sensors` table
pub async fn write_sensors(db: &PgPool, sensors: &[Sensor]) -> Result<u64> {
    info!("Writing {} sensors to database", sensors.len());

    let mut written = 0;
    for sensor in sensors {
        sqlx::query(
            r#"
            INSERT INTO sensors (sensor_index, name, latitude, longitude, location_type)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(sensor.sensor_index)
        .bind(&sensor.name)
        .bind(sensor.latitude)
        .bind(sensor.longitude)
        .bind(sensor.location.to_string())
        .execute(db)
        .await?;
        written += 1;
    }

    Ok(written)
}

/// Replace one (sensor, window) delivery in the `sensor_history` table
pub async fn write_history(
    db: &PgPool,
    sensor_index: i64,
    window: &DateWindow,
    records: &[HistoryRecord],
) -> Result<u64> {
    let mut tx = db.begin().await?;

    let cleared = sqlx::query(
        r#"
        DELETE FROM sensor_history
        WHERE sensor_index = $1 AND window_start = $2 AND window_end = $3
        "#,
    )
    .bind(sensor_index)
    .bind(window.start)
    .bind(window.end)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if cleared > 0 {
        debug!(
            "Replacing {} previously delivered rows for sensor {} {}",
            cleared, sensor_index, window
        );
    }

    for record in records {
        sqlx::query(
            r#"
            INSERT INTO sensor_history (
                sensor_index, window_start, window_end, time_stamp, recorded_at,
                pm25_atm_a, pm25_atm_b, pm25_cf1_a, pm25_cf1_b,
                humidity_a, humidity_b, temperature_a, temperature_b,
                pressure_a, pressure_b
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15
            )
            "#,
        )
        .bind(sensor_index)
        .bind(window.start)
        .bind(window.end)
        .bind(record.time_stamp)
        .bind(record.recorded_at)
        .bind(record.pm2_5_atm_a)
        .bind(record.pm2_5_atm_b)
        .bind(record.pm2_5_cf_1_a)
        .bind(record.pm2_5_cf_1_b)
        .bind(record.humidity_a)
        .bind(record.humidity_b)
        .bind(record.temperature_a)
        .bind(record.temperature_b)
        .bind(record.pressure_a)
        .bind(record.pressure_b)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(records.len() as u64)
}

/// Companion file for the sensor-list fetch
pub fn sensors_csv_path(dir: &Path) -> PathBuf {
    dir.join("sensors_list.csv")
}

/// Companion file for one (sensor, window) batch
pub fn history_csv_path(dir: &Path, sensor_index: i64, window: &DateWindow) -> PathBuf {
    dir.join(format!(
        "sensor_{}_{}_{}.csv",
        sensor_index,
        file_stamp(window.start),
        file_stamp(window.end)
    ))
}

pub fn write_sensors_csv(dir: &Path, sensors: &[Sensor]) -> Result<PathBuf> {
    let path = sensors_csv_path(dir);
    let mut writer = csv::Writer::from_path(&path)?;

    writer.write_record(SENSOR_FIELDS)?;
    for sensor in sensors {
        writer.write_record([
            sensor.sensor_index.to_string(),
            sensor.name.clone(),
            sensor.latitude.map(|v| v.to_string()).unwrap_or_default(),
            sensor.longitude.map(|v| v.to_string()).unwrap_or_default(),
            sensor.location.to_string(),
        ])?;
    }
    writer.flush()?;

    info!("Wrote sensor list to {:?}", path);
    Ok(path)
}

pub fn write_history_csv(
    dir: &Path,
    sensor_index: i64,
    window: &DateWindow,
    batch: &MeasurementBatch,
) -> Result<PathBuf> {
    let path = history_csv_path(dir, sensor_index, window);
    let mut writer = csv::Writer::from_path(&path)?;

    writer.write_record(&batch.headers)?;
    for row in &batch.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;

    debug!("Wrote {} rows to {:?}", batch.len(), path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::types::LocationType;
    use chrono::TimeZone;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use tempfile::tempdir;

    fn window() -> DateWindow {
        DateWindow {
            start: Utc.with_ymd_and_hms(2022, 6, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2022, 6, 15, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_history_csv_path_encodes_sensor_and_window() {
        let path = history_csv_path(Path::new("/data"), 131075, &window());
        assert_eq!(
            path.to_str().unwrap(),
            "/data/sensor_131075_20220601T000000Z_20220615T000000Z.csv"
        );
    }

    #[test]
    fn test_write_sensors_csv() {
        let dir = tempdir().unwrap();
        let sensors = vec![
            Sensor {
                sensor_index: 131075,
                name: "Downtown".to_string(),
                latitude: Some(Decimal::from_str("36.999").unwrap()),
                longitude: Some(Decimal::from_str("66.123").unwrap()),
                location: LocationType::Outdoor,
            },
            Sensor {
                sensor_index: 77001,
                name: "Rooftop".to_string(),
                latitude: None,
                longitude: None,
                location: LocationType::Unknown,
            },
        ];

        let path = write_sensors_csv(dir.path(), &sensors).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        let mut lines = content.lines();

        assert_eq!(
            lines.next().unwrap(),
            "sensor_index,name,latitude,longitude,location_type"
        );
        assert_eq!(lines.next().unwrap(), "131075,Downtown,36.999,66.123,outdoor");
        assert_eq!(lines.next().unwrap(), "77001,Rooftop,,,unknown");
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_write_history_csv() {
        let dir = tempdir().unwrap();
        let batch = MeasurementBatch {
            headers: vec!["time_stamp".to_string(), "humidity_a".to_string()],
            rows: vec![
                vec!["1654041600".to_string(), "45.1".to_string()],
                vec!["1654045200".to_string(), "44.8".to_string()],
            ],
        };

        let path = write_history_csv(dir.path(), 131075, &window(), &batch).unwrap();
        let content = std::fs::read_to_string(path).unwrap();

        assert_eq!(
            content,
            "time_stamp,humidity_a\n1654041600,45.1\n1654045200,44.8\n"
        );
    }
}

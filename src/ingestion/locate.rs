//! Sensor Locator - resolves the set of sensors to ingest
//!
//! One bounding-box query against the sensor-list endpoint. The parsed
//! sensors are appended to the `sensors` table and written to
//! `sensors_list.csv` before the ids are handed to the history fetcher.
//! Nothing is written unless both the fetch and the parse succeed.

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::ingestion::error::ProviderError;
use crate::ingestion::fetch::PurpleAirClient;
use crate::ingestion::parse;
use crate::ingestion::types::{Config, FailurePolicy, Sensor};
use crate::ingestion::write;

/// Locate sensors inside the configured bounding box, persist the list to
/// both sinks, and return the sensor ids in provider order.
///
/// The locator's failure policy defaults to fatal: a partial or missing
/// sensor list would silently shrink the whole run.
pub async fn locate_sensors(
    client: &PurpleAirClient,
    config: &Config,
    db: &PgPool,
) -> Result<Vec<i64>> {
    let sensors = match fetch_and_parse(client, config).await {
        Ok(sensors) => sensors,
        Err(e) => match config.locator_policy {
            FailurePolicy::Fatal => {
                return Err(e).context("sensor list query failed");
            }
            FailurePolicy::Skip => {
                warn!("Sensor list query failed, continuing with no sensors: {}", e);
                return Ok(Vec::new());
            }
        },
    };

    info!("Located {} sensors inside the bounding box", sensors.len());

    write::write_sensors(db, &sensors).await?;
    write::write_sensors_csv(&config.output_dir, &sensors)?;

    Ok(sensor_ids(&sensors))
}

async fn fetch_and_parse(
    client: &PurpleAirClient,
    config: &Config,
) -> Result<Vec<Sensor>, ProviderError> {
    let body = client
        .fetch_sensor_list(&config.bbox, config.location_filter)
        .await?;
    parse::parse_sensor_list(&body)
}

pub fn sensor_ids(sensors: &[Sensor]) -> Vec<i64> {
    sensors.iter().map(|s| s.sensor_index).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::types::LocationType;

    #[test]
    fn test_sensor_ids_preserve_order() {
        let sensors: Vec<Sensor> = [131075, 77001, 90210]
            .into_iter()
            .map(|sensor_index| Sensor {
                sensor_index,
                name: String::new(),
                latitude: None,
                longitude: None,
                location: LocationType::Unknown,
            })
            .collect();

        assert_eq!(sensor_ids(&sensors), vec![131075, 77001, 90210]);
    }
}

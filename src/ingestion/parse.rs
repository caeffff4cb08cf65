//! Parse functions - decode provider payloads into ingestion types
//!
//! The sensor list arrives as JSON whose `data` rows are positional; the
//! provider also declares the column order in a `fields` array, and that
//! declaration is checked against what was requested before any row is
//! decoded. History bodies are comma-delimited text with a header row and
//! are kept as strings for the CSV sink, with a typed view extracted for the
//! relational sink.

use serde::Deserialize;
use std::collections::HashSet;
use tracing::debug;

use crate::ingestion::error::ProviderError;
use crate::ingestion::fetch::{HISTORY_FIELDS, SENSOR_FIELDS};
use crate::ingestion::types::{
    BatchSchema, HistoryRecord, LocationType, MeasurementBatch, Sensor,
};
use crate::ingestion::utils::format_timestamp;

/// Top-level shape of the sensor-list payload
#[derive(Debug, Deserialize)]
struct SensorListPayload {
    fields: Vec<String>,
    data: Vec<Vec<serde_json::Value>>,
}

/// Decode the sensor-list body, provider row order preserved.
///
/// Fails closed if the provider's declared `fields` differ from the
/// requested set in any way, so a silent column reorder upstream can never
/// mis-map coordinates into names.
pub fn parse_sensor_list(body: &str) -> Result<Vec<Sensor>, ProviderError> {
    let payload: SensorListPayload = serde_json::from_str(body)?;

    if payload.fields != SENSOR_FIELDS {
        return Err(ProviderError::FieldMismatch {
            expected: SENSOR_FIELDS.iter().map(|f| f.to_string()).collect(),
            actual: payload.fields,
        });
    }

    let mut sensors = Vec::with_capacity(payload.data.len());
    for row in &payload.data {
        let sensor_index = row
            .first()
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ProviderError::MalformedValue {
                column: "sensor_index",
                value: row.first().map(|v| v.to_string()).unwrap_or_default(),
            })?;

        sensors.push(Sensor {
            sensor_index,
            name: row
                .get(1)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            latitude: row.get(2).and_then(decimal_value),
            longitude: row.get(3).and_then(decimal_value),
            location: LocationType::from_code(row.get(4).and_then(|v| v.as_i64())),
        });
    }

    Ok(sensors)
}

fn decimal_value(value: &serde_json::Value) -> Option<rust_decimal::Decimal> {
    match value {
        serde_json::Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

/// Decode a history body. An empty body (which is also how a non-success
/// status is represented upstream) yields an empty batch, not an error.
pub fn parse_history(body: &str) -> Result<MeasurementBatch, ProviderError> {
    if body.trim().is_empty() {
        return Ok(MeasurementBatch::default());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = reader.headers()?.iter().map(String::from).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(String::from).collect());
    }

    Ok(MeasurementBatch { headers, rows })
}

/// Drop rows that are identical across every column, keeping the first
/// occurrence and the surviving order. Returns how many rows were dropped.
pub fn dedupe_rows(batch: &mut MeasurementBatch) -> usize {
    let before = batch.rows.len();
    let mut seen = HashSet::new();
    batch.rows.retain(|row| seen.insert(row.clone()));

    let dropped = before - batch.rows.len();
    if dropped > 0 {
        debug!("Dropped {} duplicate rows", dropped);
    }
    dropped
}

/// Apply the configured batch schema. `Plain` leaves the provider columns
/// untouched; `Annotated` appends the sensor id and an ISO timestamp derived
/// from the raw epoch column (blank when that column is absent or
/// unparseable).
pub fn annotate_batch(batch: &mut MeasurementBatch, sensor_index: i64, schema: BatchSchema) {
    if schema == BatchSchema::Plain {
        return;
    }

    let ts_column = batch.column("time_stamp");
    batch.headers.push("sensor_index".to_string());
    batch.headers.push("recorded_at".to_string());

    for row in &mut batch.rows {
        let recorded_at = ts_column
            .and_then(|i| row.get(i))
            .and_then(|v| v.trim().parse::<i64>().ok())
            .and_then(|epoch| chrono::DateTime::from_timestamp(epoch, 0))
            .map(format_timestamp)
            .unwrap_or_default();

        row.push(sensor_index.to_string());
        row.push(recorded_at);
    }
}

/// Extract the typed rows the relational sink binds. The epoch column is
/// required; channel columns the provider did not return come back as null.
pub fn typed_records(batch: &MeasurementBatch) -> Result<Vec<HistoryRecord>, ProviderError> {
    let ts_column = batch
        .column("time_stamp")
        .ok_or(ProviderError::MissingColumn("time_stamp"))?;

    let channel_columns: Vec<Option<usize>> = HISTORY_FIELDS
        .iter()
        .map(|field| batch.column(field))
        .collect();

    let mut records = Vec::with_capacity(batch.rows.len());
    for row in &batch.rows {
        let raw_ts = row.get(ts_column).map(|v| v.trim()).unwrap_or_default();
        let time_stamp = raw_ts
            .parse::<i64>()
            .map_err(|_| ProviderError::MalformedValue {
                column: "time_stamp",
                value: raw_ts.to_string(),
            })?;

        let channel = |field: usize| -> Option<f64> {
            channel_columns[field]
                .and_then(|i| row.get(i))
                .and_then(|v| v.trim().parse().ok())
        };

        records.push(HistoryRecord {
            time_stamp,
            recorded_at: chrono::DateTime::from_timestamp(time_stamp, 0),
            pm2_5_atm_a: channel(0),
            pm2_5_atm_b: channel(1),
            pm2_5_cf_1_a: channel(2),
            pm2_5_cf_1_b: channel(3),
            humidity_a: channel(4),
            humidity_b: channel(5),
            temperature_a: channel(6),
            temperature_b: channel(7),
            pressure_a: channel(8),
            pressure_b: channel(9),
        });
    }

    Ok(records)
}

//! Core data types for the ingestion pipeline

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Provider-side averaging intervals (minutes) accepted by the history endpoint
pub const ALLOWED_AVERAGES: [u32; 6] = [0, 10, 30, 60, 360, 1440];

/// Sensor placement as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationType {
    Outdoor,
    Indoor,
    Unknown,
}

impl LocationType {
    /// Decode the provider's numeric `location_type` field (0 = outdoor, 1 = indoor)
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(0) => LocationType::Outdoor,
            Some(1) => LocationType::Indoor,
            _ => LocationType::Unknown,
        }
    }
}

impl std::fmt::Display for LocationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocationType::Outdoor => write!(f, "outdoor"),
            LocationType::Indoor => write!(f, "indoor"),
            LocationType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Restricts the sensor-list query to one placement, or neither
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationFilter {
    Outdoor,
    Indoor,
    Any,
}

impl LocationFilter {
    /// Value for the `location_type` query parameter; `None` means the
    /// parameter is omitted and both placements are returned.
    pub fn query_value(&self) -> Option<&'static str> {
        match self {
            LocationFilter::Outdoor => Some("0"),
            LocationFilter::Indoor => Some("1"),
            LocationFilter::Any => None,
        }
    }
}

impl FromStr for LocationFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "outdoor" => Ok(LocationFilter::Outdoor),
            "indoor" => Ok(LocationFilter::Indoor),
            "any" | "both" | "unrestricted" => Ok(LocationFilter::Any),
            other => bail!("unknown location filter {:?} (expected outdoor, indoor or any)", other),
        }
    }
}

/// Geographic rectangle given by its north-west and south-east corners
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub nwlng: Decimal,
    pub nwlat: Decimal,
    pub selng: Decimal,
    pub selat: Decimal,
}

/// One monitoring device returned by the sensor-list query
#[derive(Debug, Clone)]
pub struct Sensor {
    pub sensor_index: i64,
    pub name: String,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    pub location: LocationType,
}

/// Half-open interval `[start, end)` covered by one history request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    pub fn width(&self) -> Duration {
        self.end - self.start
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}..{}",
            self.start.format("%Y-%m-%d %H:%M"),
            self.end.format("%Y-%m-%d %H:%M")
        )
    }
}

/// One history response body, kept as provider text plus a header row
#[derive(Debug, Clone, Default)]
pub struct MeasurementBatch {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl MeasurementBatch {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Index of a named column, if the provider returned it
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// Typed view of one history row, bound for the relational sink
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub time_stamp: i64,
    pub recorded_at: Option<DateTime<Utc>>,
    pub pm2_5_atm_a: Option<f64>,
    pub pm2_5_atm_b: Option<f64>,
    pub pm2_5_cf_1_a: Option<f64>,
    pub pm2_5_cf_1_b: Option<f64>,
    pub humidity_a: Option<f64>,
    pub humidity_b: Option<f64>,
    pub temperature_a: Option<f64>,
    pub temperature_b: Option<f64>,
    pub pressure_a: Option<f64>,
    pub pressure_b: Option<f64>,
}

/// Shape of the persisted batch. The provider columns are always kept;
/// `Annotated` additionally carries the sensor id and an RFC 3339 timestamp
/// derived from the raw epoch column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchSchema {
    Plain,
    Annotated,
}

impl FromStr for BatchSchema {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "plain" => Ok(BatchSchema::Plain),
            "annotated" => Ok(BatchSchema::Annotated),
            other => bail!("unknown batch schema {:?} (expected plain or annotated)", other),
        }
    }
}

/// What to do when a provider call fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Propagate the error and abort the run
    Fatal,
    /// Log the failing URL and move on to the next unit of work
    Skip,
}

impl FromStr for FailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fatal" => Ok(FailurePolicy::Fatal),
            "skip" => Ok(FailurePolicy::Skip),
            other => bail!("unknown failure policy {:?} (expected fatal or skip)", other),
        }
    }
}

/// Outcome counters for one history run
#[derive(Debug, Default, Clone)]
pub struct FetchStats {
    pub windows_fetched: usize,
    pub windows_empty: usize,
    pub windows_skipped: usize,
    pub rows_written: usize,
}

impl std::fmt::Display for FetchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "fetched: {}, empty: {}, skipped: {}, rows written: {}",
            self.windows_fetched, self.windows_empty, self.windows_skipped, self.rows_written
        )
    }
}

/// Run configuration, loaded once and passed into each component
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub api_key: String,
    pub bbox: BoundingBox,
    pub location_filter: LocationFilter,
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub average_minutes: u32,
    pub sleep_seconds: u64,
    pub output_dir: PathBuf,
    pub batch_schema: BatchSchema,
    pub locator_policy: FailurePolicy,
    pub history_policy: FailurePolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Config {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,

            api_key: std::env::var("PURPLEAIR_API_KEY")
                .context("PURPLEAIR_API_KEY must be set")?,

            bbox: BoundingBox {
                nwlng: env_decimal("BBOX_NWLNG", "65.001")?,
                nwlat: env_decimal("BBOX_NWLAT", "37.001")?,
                selng: env_decimal("BBOX_SELNG", "99.001")?,
                selat: env_decimal("BBOX_SELAT", "5.001")?,
            },

            location_filter: std::env::var("LOCATION_FILTER")
                .unwrap_or_else(|_| "outdoor".to_string())
                .parse()?,

            begin: env_datetime("BEGIN_DATE", "2022-06-01T00:00:00+00:00")?,
            end: env_datetime("END_DATE", "2022-06-15T00:00:00+00:00")?,

            average_minutes: std::env::var("AVERAGE_MINUTES")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("AVERAGE_MINUTES must be an integer")?,

            sleep_seconds: std::env::var("SLEEP_SECONDS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("SLEEP_SECONDS must be an integer")?,

            output_dir: std::env::var("OUTPUT_DIR")
                .unwrap_or_else(|_| "./data".to_string())
                .into(),

            batch_schema: std::env::var("BATCH_SCHEMA")
                .unwrap_or_else(|_| "annotated".to_string())
                .parse()?,

            locator_policy: std::env::var("LOCATOR_POLICY")
                .unwrap_or_else(|_| "fatal".to_string())
                .parse()?,

            history_policy: std::env::var("HISTORY_POLICY")
                .unwrap_or_else(|_| "skip".to_string())
                .parse()?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_average(self.average_minutes)?;
        if self.end < self.begin {
            bail!("END_DATE precedes BEGIN_DATE");
        }
        Ok(())
    }
}

/// The provider only honors a fixed set of averaging intervals
pub fn validate_average(minutes: u32) -> Result<()> {
    if !ALLOWED_AVERAGES.contains(&minutes) {
        bail!(
            "averaging interval {} is not supported (expected one of {:?})",
            minutes,
            ALLOWED_AVERAGES
        );
    }
    Ok(())
}

fn env_decimal(name: &str, default: &str) -> Result<Decimal> {
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("{} must be a decimal coordinate", name))
}

fn env_datetime(name: &str, default: &str) -> Result<DateTime<Utc>> {
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    let parsed = DateTime::parse_from_rfc3339(&raw)
        .with_context(|| format!("{} must be an RFC 3339 date-time", name))?;
    Ok(parsed.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_filter_parsing() {
        assert_eq!(
            "outdoor".parse::<LocationFilter>().unwrap(),
            LocationFilter::Outdoor
        );
        assert_eq!(
            "Indoor".parse::<LocationFilter>().unwrap(),
            LocationFilter::Indoor
        );
        assert_eq!("both".parse::<LocationFilter>().unwrap(), LocationFilter::Any);
        assert!("underwater".parse::<LocationFilter>().is_err());
    }

    #[test]
    fn test_location_filter_query_value() {
        assert_eq!(LocationFilter::Outdoor.query_value(), Some("0"));
        assert_eq!(LocationFilter::Indoor.query_value(), Some("1"));
        assert_eq!(LocationFilter::Any.query_value(), None);
    }

    #[test]
    fn test_location_type_from_code() {
        assert_eq!(LocationType::from_code(Some(0)), LocationType::Outdoor);
        assert_eq!(LocationType::from_code(Some(1)), LocationType::Indoor);
        assert_eq!(LocationType::from_code(Some(7)), LocationType::Unknown);
        assert_eq!(LocationType::from_code(None), LocationType::Unknown);
    }

    #[test]
    fn test_validate_average() {
        for minutes in ALLOWED_AVERAGES {
            assert!(validate_average(minutes).is_ok());
        }
        assert!(validate_average(45).is_err());
        assert!(validate_average(61).is_err());
    }

    #[test]
    fn test_failure_policy_parsing() {
        assert_eq!("fatal".parse::<FailurePolicy>().unwrap(), FailurePolicy::Fatal);
        assert_eq!("skip".parse::<FailurePolicy>().unwrap(), FailurePolicy::Skip);
        assert!("retry".parse::<FailurePolicy>().is_err());
    }

    #[test]
    fn test_batch_column_lookup() {
        let batch = MeasurementBatch {
            headers: vec!["time_stamp".to_string(), "humidity_a".to_string()],
            rows: vec![],
        };
        assert_eq!(batch.column("humidity_a"), Some(1));
        assert_eq!(batch.column("pressure_a"), None);
    }
}

//! Fetch functions - HTTP calls against the PurpleAir v1 API
//!
//! Two endpoints are used: `GET /sensors` returns the bounding-box sensor
//! list as JSON, and `GET /sensors/{index}/history/csv` returns one window of
//! measurements as comma-delimited text. Both are issued synchronously, one
//! at a time; parsing lives in [`parse`](crate::ingestion::parse).

use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use crate::ingestion::error::ProviderError;
use crate::ingestion::types::{BoundingBox, DateWindow, LocationFilter};
use crate::ingestion::utils::{format_timestamp, join_fields};

const DEFAULT_BASE_URL: &str = "https://api.purpleair.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Fields requested from the sensor-list endpoint, in the order the provider
/// is asked to return them
pub const SENSOR_FIELDS: [&str; 5] =
    ["sensor_index", "name", "latitude", "longitude", "location_type"];

/// The fixed channel set requested for every history window, regardless of
/// window width
pub const HISTORY_FIELDS: [&str; 10] = [
    "pm2.5_atm_a",
    "pm2.5_atm_b",
    "pm2.5_cf_1_a",
    "pm2.5_cf_1_b",
    "humidity_a",
    "humidity_b",
    "temperature_a",
    "temperature_b",
    "pressure_a",
    "pressure_b",
];

pub struct PurpleAirClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl PurpleAirClient {
    pub fn new(api_key: &str) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(PurpleAirClient {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Point the client at a different host (stand-in servers in tests)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Query parameters for the sensor-list request
    pub fn sensor_list_params(
        &self,
        bbox: &BoundingBox,
        filter: LocationFilter,
    ) -> Vec<(String, String)> {
        let mut params = vec![
            ("api_key".to_string(), self.api_key.clone()),
            ("fields".to_string(), join_fields(&SENSOR_FIELDS)),
            ("nwlng".to_string(), bbox.nwlng.to_string()),
            ("nwlat".to_string(), bbox.nwlat.to_string()),
            ("selng".to_string(), bbox.selng.to_string()),
            ("selat".to_string(), bbox.selat.to_string()),
        ];
        if let Some(code) = filter.query_value() {
            params.push(("location_type".to_string(), code.to_string()));
        }
        params
    }

    /// Query parameters for one history request
    pub fn history_params(&self, window: &DateWindow, average_minutes: u32) -> Vec<(String, String)> {
        vec![
            ("api_key".to_string(), self.api_key.clone()),
            ("start_timestamp".to_string(), format_timestamp(window.start)),
            ("end_timestamp".to_string(), format_timestamp(window.end)),
            ("average".to_string(), average_minutes.to_string()),
            ("fields".to_string(), join_fields(&HISTORY_FIELDS)),
        ]
    }

    /// Fetch the sensor list for a bounding box. Any transport error or
    /// non-success status is an error; the caller applies the locator's
    /// failure policy.
    pub async fn fetch_sensor_list(
        &self,
        bbox: &BoundingBox,
        filter: LocationFilter,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/sensors", self.base_url);
        info!("Fetching sensor list from {}", url);

        let params = self.sensor_list_params(bbox, filter);
        let response = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|source| ProviderError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::HttpStatus { url, status });
        }

        response
            .text()
            .await
            .map_err(|source| ProviderError::Request { url, source })
    }

    /// Fetch one (sensor, window) history body. A non-success status means
    /// "no data for this window" and comes back as an empty body; only
    /// transport failures are errors.
    pub async fn fetch_history(
        &self,
        sensor_index: i64,
        window: &DateWindow,
        average_minutes: u32,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/sensors/{}/history/csv", self.base_url, sensor_index);
        info!("Downloading sensor {} for {}", sensor_index, window);

        let params = self.history_params(window, average_minutes);
        let response = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|source| ProviderError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            debug!("{} returned HTTP {}, treating window as empty", url, status);
            return Ok(String::new());
        }

        response
            .text()
            .await
            .map_err(|source| ProviderError::Request { url, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn client() -> PurpleAirClient {
        PurpleAirClient::new("test-key").unwrap()
    }

    fn bbox() -> BoundingBox {
        BoundingBox {
            nwlng: Decimal::from_str("65.001").unwrap(),
            nwlat: Decimal::from_str("37.001").unwrap(),
            selng: Decimal::from_str("99.001").unwrap(),
            selat: Decimal::from_str("5.001").unwrap(),
        }
    }

    #[test]
    fn test_sensor_list_params_outdoor() {
        let params = client().sensor_list_params(&bbox(), LocationFilter::Outdoor);

        assert_eq!(params[0], ("api_key".to_string(), "test-key".to_string()));
        assert_eq!(
            params[1],
            (
                "fields".to_string(),
                "sensor_index,name,latitude,longitude,location_type".to_string()
            )
        );
        assert_eq!(params[2], ("nwlng".to_string(), "65.001".to_string()));
        assert_eq!(params[3], ("nwlat".to_string(), "37.001".to_string()));
        assert_eq!(params[4], ("selng".to_string(), "99.001".to_string()));
        assert_eq!(params[5], ("selat".to_string(), "5.001".to_string()));
        assert_eq!(
            params[6],
            ("location_type".to_string(), "0".to_string())
        );
    }

    #[test]
    fn test_sensor_list_params_unrestricted_omits_location() {
        let params = client().sensor_list_params(&bbox(), LocationFilter::Any);
        assert!(params.iter().all(|(name, _)| name != "location_type"));
    }

    #[test]
    fn test_history_params() {
        let window = DateWindow {
            start: Utc.with_ymd_and_hms(2022, 6, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2022, 6, 15, 0, 0, 0).unwrap(),
        };
        let params = client().history_params(&window, 60);

        assert_eq!(
            params[1],
            (
                "start_timestamp".to_string(),
                "2022-06-01T00:00:00Z".to_string()
            )
        );
        assert_eq!(
            params[2],
            (
                "end_timestamp".to_string(),
                "2022-06-15T00:00:00Z".to_string()
            )
        );
        assert_eq!(params[3], ("average".to_string(), "60".to_string()));

        let fields = &params[4].1;
        assert_eq!(fields.split(',').count(), 10);
        assert!(fields.starts_with("pm2.5_atm_a,pm2.5_atm_b"));
        assert!(fields.ends_with("pressure_a,pressure_b"));
    }

    #[test]
    fn test_base_url_override_trims_trailing_slash() {
        let client = client().with_base_url("http://localhost:9000/");
        assert_eq!(client.base_url, "http://localhost:9000");
    }
}

//! Historical Fetcher - the windowed fetch/parse/dedupe/persist loop
//!
//! Sensors in the outer loop, date windows in the inner loop, one blocking
//! request at a time with the throttle waited on before each. A window that
//! fails to fetch is handled per the configured history failure policy;
//! persistence errors always propagate.

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::ingestion::error::ProviderError;
use crate::ingestion::fetch::PurpleAirClient;
use crate::ingestion::parse;
use crate::ingestion::throttle::Throttle;
use crate::ingestion::types::{
    BatchSchema, Config, DateWindow, FailurePolicy, FetchStats, HistoryRecord, MeasurementBatch,
};
use crate::ingestion::windows::build_windows;
use crate::ingestion::write;

/// Fetch and persist every (sensor, window) pair of the configured range.
///
/// There is no checkpointing: a re-run attempts every pair again, and the
/// keyed window upsert in the write layer makes that harmless.
pub async fn fetch_history(
    client: &PurpleAirClient,
    config: &Config,
    db: &PgPool,
    sensor_ids: &[i64],
) -> Result<FetchStats> {
    let windows = build_windows(config.begin, config.end, config.average_minutes);
    let throttle = Throttle::fixed(config.sleep_seconds);

    info!(
        "Fetching {} windows per sensor across {} sensors",
        windows.len(),
        sensor_ids.len()
    );

    let mut stats = FetchStats::default();
    for &sensor_index in sensor_ids {
        for window in &windows {
            throttle.wait().await;

            let prepared = match fetch_window(client, config, sensor_index, window).await {
                Ok(prepared) => prepared,
                Err(e) => match config.history_policy {
                    FailurePolicy::Fatal => {
                        return Err(e).with_context(|| {
                            format!("history fetch failed for sensor {} {}", sensor_index, window)
                        });
                    }
                    FailurePolicy::Skip => {
                        warn!("Skipping sensor {} {}: {}", sensor_index, window, e);
                        stats.windows_skipped += 1;
                        continue;
                    }
                },
            };

            let (batch, records) = match prepared {
                Some(prepared) => prepared,
                None => {
                    info!("No data available for sensor {} {}", sensor_index, window);
                    stats.windows_empty += 1;
                    continue;
                }
            };

            write::write_history(db, sensor_index, window, &records).await?;
            write::write_history_csv(&config.output_dir, sensor_index, window, &batch)?;

            stats.windows_fetched += 1;
            stats.rows_written += records.len();
        }
    }

    info!("History fetch complete: {}", stats);
    Ok(stats)
}

async fn fetch_window(
    client: &PurpleAirClient,
    config: &Config,
    sensor_index: i64,
    window: &DateWindow,
) -> Result<Option<(MeasurementBatch, Vec<HistoryRecord>)>, ProviderError> {
    let body = client
        .fetch_history(sensor_index, window, config.average_minutes)
        .await?;
    let batch = parse::parse_history(&body)?;
    prepare_batch(batch, sensor_index, config.batch_schema)
}

/// Post-fetch stages for one window: empty check, duplicate drop, schema
/// annotation, typed extraction. `None` means there is nothing to persist.
fn prepare_batch(
    mut batch: MeasurementBatch,
    sensor_index: i64,
    schema: BatchSchema,
) -> Result<Option<(MeasurementBatch, Vec<HistoryRecord>)>, ProviderError> {
    if batch.is_empty() {
        return Ok(None);
    }

    parse::dedupe_rows(&mut batch);
    parse::annotate_batch(&mut batch, sensor_index, schema);
    let records = parse::typed_records(&batch)?;

    Ok(Some((batch, records)))
}

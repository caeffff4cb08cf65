//! Data ingestion orchestrator - locates sensors, then pages through their history

use anyhow::Result;
use purpleair_ingest::ingestion::fetch::PurpleAirClient;
use purpleair_ingest::ingestion::history::fetch_history;
use purpleair_ingest::ingestion::locate::locate_sensors;
use purpleair_ingest::ingestion::Config;
use sqlx::PgPool;
use std::fs;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    info!("Starting PurpleAir ingestion pipeline");

    let config = Config::from_env()?;
    info!("Configuration loaded");

    let db = PgPool::connect(&config.database_url).await?;
    info!("Database connected");

    fs::create_dir_all(&config.output_dir)?;

    let client = PurpleAirClient::new(&config.api_key)?;

    // Step 1: one bounding-box query resolves the sensors to ingest
    info!("Step 1/2: Locating sensors...");
    let sensor_ids = locate_sensors(&client, &config, &db).await?;
    if sensor_ids.is_empty() {
        warn!("No sensors inside the bounding box, nothing to fetch");
        return Ok(());
    }
    info!("✓ Located {} sensors", sensor_ids.len());

    // Step 2: windowed history fetch per sensor
    info!("Step 2/2: Fetching history...");
    let stats = fetch_history(&client, &config, &db, &sensor_ids).await?;
    info!("✓ History fetch complete: {}", stats);

    Ok(())
}

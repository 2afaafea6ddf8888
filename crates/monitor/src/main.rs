//! Standalone watch loop over the tenant directory.

use std::{io, sync::Arc};

use walletwatch_domain::config::MonitorConfig;
use walletwatch_domain::services::cursor::InMemoryCursorStore;
use walletwatch_domain::services::telemetry::{init_telemetry, TelemetryConfig};
use walletwatch_monitor::{build_engine, run_monitor, MonitorError};
use walletwatch_storage::SeaOrmStorage;

#[tokio::main]
async fn main() -> io::Result<()> {
    if let Err(err) = bootstrap().await {
        eprintln!("[monitor] bootstrap failed: {err}");
        return Err(io::Error::other(err.to_string()));
    }

    Ok(())
}

async fn bootstrap() -> Result<(), MonitorError> {
    let config = MonitorConfig::load_from_env()?;
    let telemetry_config = TelemetryConfig::from_env("MONITOR");
    let _telemetry = init_telemetry(&telemetry_config)?;
    let storage = SeaOrmStorage::connect(config.database_url()).await?;
    let engine = build_engine(
        &config,
        Arc::new(storage),
        Arc::new(InMemoryCursorStore::new()),
    )?;
    run_monitor(Arc::new(engine), config.watch_interval()).await
}

//! Process bootstrap: configuration, telemetry, storage, the in-process watch
//! loop and the public/internal HTTP listeners.

use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use thiserror::Error;
use tracing::error;
use walletwatch_domain::config::{ApiConfig, ConfigError, MonitorConfig};
use walletwatch_domain::services::{
    cooldown::CommandCooldowns,
    cursor::InMemoryCursorStore,
    telemetry::{init_telemetry, TelemetryConfig, TelemetryError},
};
use walletwatch_domain::storage::StorageError;
use walletwatch_monitor::{build_engine, run_monitor, MonitorError};
use walletwatch_storage::SeaOrmStorage;

use crate::{
    handlers::{
        add_wallet_handler, credits_handler, healthz_handler, metrics_handler, plan_handler,
        remove_wallet_handler, root_handler, set_channel_handler,
    },
    state::AppState,
};

pub async fn run() -> Result<(), BootstrapError> {
    let config = ApiConfig::load_from_env()?;
    let monitor_config = MonitorConfig::load_from_env()?;

    let telemetry_config = TelemetryConfig::from_env("API");
    let telemetry = init_telemetry(&telemetry_config)?;

    let storage = SeaOrmStorage::connect(config.database_url()).await?;

    // The HTTP handlers and the watch loop share one cursor store so a wallet
    // seeded on insertion is never re-reported by the loop.
    let cursors = Arc::new(InMemoryCursorStore::new());
    let engine = Arc::new(build_engine(
        &monitor_config,
        Arc::new(storage.clone()),
        cursors,
    )?);

    let watch_engine = engine.clone();
    let watch_interval = monitor_config.watch_interval();
    tokio::spawn(async move {
        if let Err(err) = run_monitor(watch_engine, watch_interval).await {
            error!(%err, "watch loop stopped");
        }
    });

    let state = AppState::new(
        storage,
        engine,
        Arc::new(CommandCooldowns::default()),
        telemetry,
    );

    // Metrics stay off the public listener when an internal one exists.
    let include_metrics_on_public = !config.has_internal_listener();

    let public_state = state.clone();
    let public_server = HttpServer::new(move || {
        let app = App::new()
            .app_data(web::Data::new(public_state.clone()))
            .wrap(Logger::default())
            .configure(public_routes);

        if include_metrics_on_public {
            app.route("/metrics", web::get().to(metrics_handler))
        } else {
            app
        }
    })
    .bind(config.api_bind_address())?
    .run();

    let internal_server = match config.internal_bind_address() {
        Some(addr) => {
            let internal_state = state.clone();
            let server = HttpServer::new(move || {
                App::new()
                    .app_data(web::Data::new(internal_state.clone()))
                    .wrap(Logger::default())
                    .configure(internal_routes)
            })
            .bind(addr)?
            .run();
            Some(server)
        }
        None => None,
    };

    if let Some(internal) = internal_server {
        tokio::try_join!(public_server, internal)?;
    } else {
        public_server.await?;
    }

    Ok(())
}

pub fn public_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(root_handler))
        .route("/healthz", web::get().to(healthz_handler))
        .route(
            "/api/v1/tenants/{tenant}/channel",
            web::put().to(set_channel_handler),
        )
        .route(
            "/api/v1/tenants/{tenant}/wallets",
            web::post().to(add_wallet_handler),
        )
        .route(
            "/api/v1/tenants/{tenant}/wallets/{address}",
            web::delete().to(remove_wallet_handler),
        )
        .route(
            "/api/v1/tenants/{tenant}/credits/{user}",
            web::get().to(credits_handler),
        );
}

pub fn internal_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(metrics_handler))
        .route("/healthz", web::get().to(healthz_handler))
        .route(
            "/api/v1/tenants/{tenant}/plan",
            web::post().to(plan_handler),
        );
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("monitor error: {0}")]
    Monitor(#[from] MonitorError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

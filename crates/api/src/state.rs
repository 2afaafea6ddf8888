use std::sync::Arc;

use walletwatch_domain::services::{cooldown::CommandCooldowns, telemetry::TelemetryGuard};
use walletwatch_monitor::WatchEngine;
use walletwatch_storage::SeaOrmStorage;

#[derive(Clone)]
pub struct AppState {
    storage: SeaOrmStorage,
    engine: Arc<WatchEngine>,
    cooldowns: Arc<CommandCooldowns>,
    telemetry: TelemetryGuard,
}

impl AppState {
    pub fn new(
        storage: SeaOrmStorage,
        engine: Arc<WatchEngine>,
        cooldowns: Arc<CommandCooldowns>,
        telemetry: TelemetryGuard,
    ) -> Self {
        Self {
            storage,
            engine,
            cooldowns,
            telemetry,
        }
    }

    pub fn storage(&self) -> &SeaOrmStorage {
        &self.storage
    }

    pub fn engine(&self) -> &WatchEngine {
        self.engine.as_ref()
    }

    pub fn cooldowns(&self) -> &CommandCooldowns {
        self.cooldowns.as_ref()
    }

    pub fn telemetry(&self) -> &TelemetryGuard {
        &self.telemetry
    }
}

//! Library entrypoint for embedding the watch cycle inside other binaries
//! (e.g., the API process). The binary in `main.rs` runs the same engine on
//! its own for development and CI; production co-locates it with the API so
//! wallets added over HTTP are seeded against the cursors the loop reads.

pub mod client;
pub mod diff;
pub mod dispatch;
pub mod extract;
pub mod pacer;
pub mod rpc;
pub mod worker;

pub use dispatch::{Dispatcher, Notifier, NotificationMessage, WebhookNotifier};
pub use rpc::{LedgerClient, LedgerError, SolanaRpcClient};
pub use worker::{
    build_engine, run_monitor, CycleReport, Halt, MonitorError, TargetOutcome, WatchDeps, WatchEngine,
    WatchSettings,
};

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use walletwatch_domain::{
    config::{ConfigError, MonitorConfig, DEFAULT_EXPLORER_BASE_URL},
    model::{Cursor, Destination, TenantId, WalletAddress, WatchTarget},
    services::telemetry::TelemetryError,
    storage::{CursorStore, StorageError, TenantDirectory},
};

use crate::{
    diff::{diff_signatures, DiffOutcome},
    dispatch::{Delivery, Dispatcher, Notifier, WebhookNotifier},
    extract::extract_transfer,
    pacer::{Pacer, TokioPacer},
    rpc::{LedgerClient, LedgerError, SignatureInfo, SolanaRpcClient},
};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("http client error: {0}")]
    Http(String),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
}

impl From<reqwest::Error> for MonitorError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value.to_string())
    }
}

/// Tunables of one watch cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSettings {
    /// How many recent signatures are fetched per target and poll.
    pub window_size: usize,
    pub notify_pacing: Duration,
    pub rate_limit_backoff: Duration,
    pub explorer_base_url: String,
}

impl WatchSettings {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            window_size: config.window_size(),
            notify_pacing: config.notify_pacing(),
            rate_limit_backoff: config.rate_limit_backoff(),
            explorer_base_url: config.explorer_base_url().to_string(),
        }
    }
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            window_size: 10,
            notify_pacing: Duration::from_millis(500),
            rate_limit_backoff: Duration::from_secs(5),
            explorer_base_url: DEFAULT_EXPLORER_BASE_URL.to_string(),
        }
    }
}

/// Why a target stopped before its whole diff was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    RateLimited,
    FetchFailed,
}

/// What happened to one target during one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOutcome {
    /// The configured address is not a valid ledger key.
    InvalidAddress,
    /// An overlapping cycle is polling the same target.
    Busy,
    RateLimited,
    FetchFailed,
    StoreFailed,
    /// No signatures yet, or nothing newer than the cursor.
    Idle,
    Seeded,
    /// `transactions` new items were handled. When `halted` is set a detail
    /// fetch stopped the target early and the cursor sits on the last handled
    /// item, so the remainder is retried next cycle.
    Processed {
        transactions: usize,
        notified: usize,
        halted: Option<Halt>,
    },
}

impl TargetOutcome {
    fn label(self) -> &'static str {
        match self {
            TargetOutcome::InvalidAddress => "invalid_address",
            TargetOutcome::Busy => "busy",
            TargetOutcome::RateLimited
            | TargetOutcome::Processed {
                halted: Some(Halt::RateLimited),
                ..
            } => "rate_limited",
            TargetOutcome::FetchFailed
            | TargetOutcome::Processed {
                halted: Some(Halt::FetchFailed),
                ..
            } => "fetch_failed",
            TargetOutcome::StoreFailed => "store_failed",
            TargetOutcome::Idle => "idle",
            TargetOutcome::Seeded => "seeded",
            TargetOutcome::Processed { halted: None, .. } => "processed",
        }
    }
}

/// Summary of one sweep over every tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub tenants: usize,
    pub targets: usize,
    pub invalid_addresses: usize,
    pub rate_limited: usize,
    pub failed: usize,
    pub seeded: usize,
    pub busy: usize,
    pub transactions: usize,
    pub notifications: usize,
    /// Targets holding a cursor once the cycle finished.
    pub tracked: usize,
    pub elapsed_ms: u64,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CycleReport {
    fn record(&mut self, outcome: TargetOutcome) {
        counter!("watch_targets_total", "outcome" => outcome.label()).increment(1);
        self.targets += 1;
        match outcome {
            TargetOutcome::InvalidAddress => self.invalid_addresses += 1,
            TargetOutcome::Busy => self.busy += 1,
            TargetOutcome::RateLimited => self.rate_limited += 1,
            TargetOutcome::FetchFailed | TargetOutcome::StoreFailed => self.failed += 1,
            TargetOutcome::Idle => {}
            TargetOutcome::Seeded => self.seeded += 1,
            TargetOutcome::Processed {
                transactions,
                notified,
                halted,
            } => {
                self.transactions += transactions;
                self.notifications += notified;
                match halted {
                    Some(Halt::RateLimited) => self.rate_limited += 1,
                    Some(Halt::FetchFailed) => self.failed += 1,
                    None => {}
                }
            }
        }
    }
}

/// Per-item result inside one target's poll.
enum ItemOutcome {
    Notified,
    /// Handled without a notification: no detail, no balance change, no
    /// destination, or a failed send.
    Skipped,
    Halted(Halt),
}

type TargetKey = (TenantId, WalletAddress);

/// Marks a target as being polled; released on drop.
struct TargetLease<'a> {
    in_flight: &'a Mutex<HashSet<TargetKey>>,
    key: TargetKey,
}

impl<'a> TargetLease<'a> {
    fn acquire(in_flight: &'a Mutex<HashSet<TargetKey>>, target: &WatchTarget) -> Option<Self> {
        let key = (target.tenant.clone(), target.address.clone());
        let inserted = in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone());
        inserted.then(|| Self { in_flight, key })
    }
}

impl Drop for TargetLease<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

/// Collaborators the watch cycle is wired to.
pub struct WatchDeps {
    pub ledger: Arc<dyn LedgerClient>,
    pub directory: Arc<dyn TenantDirectory>,
    pub cursors: Arc<dyn CursorStore>,
    pub notifier: Arc<dyn Notifier>,
    pub pacer: Arc<dyn Pacer>,
}

/// Polls every tenant's watch-list, reports new transfers once each and keeps
/// the per-target cursors moving forward.
pub struct WatchEngine {
    ledger: Arc<dyn LedgerClient>,
    directory: Arc<dyn TenantDirectory>,
    cursors: Arc<dyn CursorStore>,
    pacer: Arc<dyn Pacer>,
    dispatcher: Dispatcher,
    settings: WatchSettings,
    last_report: Mutex<Option<CycleReport>>,
    in_flight: Mutex<HashSet<TargetKey>>,
}

impl WatchEngine {
    pub fn new(deps: WatchDeps, settings: WatchSettings) -> Self {
        let dispatcher = Dispatcher::new(
            deps.notifier,
            deps.pacer.clone(),
            settings.notify_pacing,
            settings.explorer_base_url.clone(),
        );
        Self {
            ledger: deps.ledger,
            directory: deps.directory,
            cursors: deps.cursors,
            pacer: deps.pacer,
            dispatcher,
            settings,
            last_report: Mutex::new(None),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn settings(&self) -> &WatchSettings {
        &self.settings
    }

    pub fn last_report(&self) -> Option<CycleReport> {
        self.last_report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// One full sweep over every tenant and target. Failures stay contained
    /// to the target they happened on and are only logged.
    pub async fn run_watch_cycle(&self) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::default();

        match self.directory.list_tenants().await {
            Ok(tenants) => {
                for tenant in tenants {
                    report.tenants += 1;
                    self.poll_tenant(&tenant, &mut report).await;
                }
            }
            Err(err) => warn!(?err, "failed to enumerate tenants"),
        }

        let elapsed = started.elapsed();
        report.elapsed_ms = elapsed.as_millis() as u64;
        report.finished_at = Some(Utc::now());
        histogram!("watch_cycle_seconds").record(elapsed.as_secs_f64());
        gauge!("watch_cursor_targets").set(report.tracked as f64);
        debug!(?report, "watch cycle finished");

        *self
            .last_report
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(report.clone());
        report
    }

    async fn poll_tenant(&self, tenant: &TenantId, report: &mut CycleReport) {
        let addresses = match self.directory.list_watched_addresses(tenant).await {
            Ok(addresses) => addresses,
            Err(err) => {
                warn!(tenant = %tenant, ?err, "failed to load watch-list");
                return;
            }
        };
        if addresses.is_empty() {
            return;
        }

        let destination = match self.directory.resolve_destination(tenant).await {
            Ok(destination) => destination,
            Err(err) => {
                warn!(tenant = %tenant, ?err, "failed to resolve destination");
                None
            }
        };

        for raw in addresses {
            let address = match WalletAddress::parse(&raw) {
                Ok(address) => address,
                Err(err) => {
                    debug!(tenant = %tenant, address = %raw, %err, "skipping malformed address");
                    report.record(TargetOutcome::InvalidAddress);
                    continue;
                }
            };
            let target = WatchTarget::new(tenant.clone(), address);
            let outcome = self.poll_target(&target, destination.as_ref()).await;
            report.record(outcome);
            if let Ok(Some(_)) = self.cursors.get(&target.tenant, &target.address).await {
                report.tracked += 1;
            }
        }
    }

    /// Fetches, diffs and reports one target.
    ///
    /// New items are handled oldest first. The cursor moves to the window head
    /// once every item is handled; when a detail fetch is rate limited or
    /// fails it stops on the last handled item instead, so the rest is
    /// retried next cycle and nothing is reported twice.
    pub async fn poll_target(
        &self,
        target: &WatchTarget,
        destination: Option<&Destination>,
    ) -> TargetOutcome {
        let Some(_lease) = TargetLease::acquire(&self.in_flight, target) else {
            debug!(tenant = %target.tenant, address = %target.address, "target already being polled");
            return TargetOutcome::Busy;
        };

        let window = match self
            .ledger
            .recent_signatures(&target.address, self.settings.window_size)
            .await
        {
            Ok(window) => {
                counter!("watch_ledger_calls_total", "call" => "signatures", "result" => "ok")
                    .increment(1);
                window
            }
            Err(LedgerError::RateLimited) => {
                counter!("watch_ledger_calls_total", "call" => "signatures", "result" => "rate_limited")
                    .increment(1);
                warn!(
                    tenant = %target.tenant,
                    address = %target.address,
                    backoff_ms = self.settings.rate_limit_backoff.as_millis() as u64,
                    "ledger rate limited, pausing cycle"
                );
                self.pacer.pause(self.settings.rate_limit_backoff).await;
                return TargetOutcome::RateLimited;
            }
            Err(err) => {
                counter!("watch_ledger_calls_total", "call" => "signatures", "result" => "error")
                    .increment(1);
                warn!(tenant = %target.tenant, address = %target.address, ?err, "signature fetch failed");
                return TargetOutcome::FetchFailed;
            }
        };

        let stored = match self.cursors.get(&target.tenant, &target.address).await {
            Ok(stored) => stored,
            Err(err) => {
                warn!(tenant = %target.tenant, address = %target.address, ?err, "cursor lookup failed");
                return TargetOutcome::StoreFailed;
            }
        };

        let (fresh, head) = match diff_signatures(&window, stored.as_ref()) {
            DiffOutcome::Empty => return TargetOutcome::Idle,
            DiffOutcome::Seeded(cursor) => {
                return match self.commit_cursor(target, None, cursor).await {
                    Some(true) => {
                        debug!(tenant = %target.tenant, address = %target.address, "cursor seeded, history suppressed");
                        TargetOutcome::Seeded
                    }
                    Some(false) => TargetOutcome::Idle,
                    None => TargetOutcome::StoreFailed,
                };
            }
            DiffOutcome::Advanced { fresh, cursor } => (fresh, cursor),
        };

        let mut handled: Option<Cursor> = None;
        let mut transactions = 0;
        let mut notified = 0;
        let mut halted = None;
        for signature in &fresh {
            match self.report_signature(target, signature, destination).await {
                ItemOutcome::Notified => notified += 1,
                ItemOutcome::Skipped => {}
                ItemOutcome::Halted(reason) => {
                    halted = Some(reason);
                    break;
                }
            }
            transactions += 1;
            handled = Some(Cursor::new(signature.signature.clone(), signature.slot));
        }

        let next = if halted.is_none() { Some(head) } else { handled };
        if let Some(next) = next {
            if self
                .commit_cursor(target, stored.as_ref(), next)
                .await
                .is_none()
            {
                return TargetOutcome::StoreFailed;
            }
        }

        if fresh.is_empty() {
            return TargetOutcome::Idle;
        }
        info!(
            tenant = %target.tenant,
            address = %target.address,
            transactions,
            notified,
            pending = fresh.len() - transactions,
            "processed new activity"
        );
        TargetOutcome::Processed {
            transactions,
            notified,
            halted,
        }
    }

    async fn report_signature(
        &self,
        target: &WatchTarget,
        signature: &SignatureInfo,
        destination: Option<&Destination>,
    ) -> ItemOutcome {
        let detail = match self.ledger.transaction_detail(&signature.signature).await {
            Ok(Some(detail)) => {
                counter!("watch_ledger_calls_total", "call" => "transaction", "result" => "ok")
                    .increment(1);
                detail
            }
            Ok(None) => {
                counter!("watch_ledger_calls_total", "call" => "transaction", "result" => "absent")
                    .increment(1);
                debug!(signature = %signature.signature, "transaction detail unavailable, skipping");
                return ItemOutcome::Skipped;
            }
            Err(LedgerError::RateLimited) => {
                counter!("watch_ledger_calls_total", "call" => "transaction", "result" => "rate_limited")
                    .increment(1);
                warn!(signature = %signature.signature, "ledger rate limited detail fetch, pausing cycle");
                self.pacer.pause(self.settings.rate_limit_backoff).await;
                return ItemOutcome::Halted(Halt::RateLimited);
            }
            Err(err) => {
                counter!("watch_ledger_calls_total", "call" => "transaction", "result" => "error")
                    .increment(1);
                warn!(signature = %signature.signature, ?err, "transaction detail fetch failed, retrying next cycle");
                return ItemOutcome::Halted(Halt::FetchFailed);
            }
        };

        let Some(event) = extract_transfer(target, signature, &detail) else {
            debug!(signature = %signature.signature, "no net balance change for target");
            return ItemOutcome::Skipped;
        };

        match self.dispatcher.dispatch(destination, &event).await {
            Delivery::Sent => ItemOutcome::Notified,
            Delivery::Dropped | Delivery::Failed => ItemOutcome::Skipped,
        }
    }

    /// Replaces `expected` with `cursor`. `None` when the store failed,
    /// otherwise whether the cursor moved.
    async fn commit_cursor(
        &self,
        target: &WatchTarget,
        expected: Option<&Cursor>,
        cursor: Cursor,
    ) -> Option<bool> {
        match self
            .cursors
            .set_if(&target.tenant, &target.address, expected, cursor)
            .await
        {
            Ok(stored) => Some(stored),
            Err(err) => {
                warn!(tenant = %target.tenant, address = %target.address, ?err, "cursor update failed");
                None
            }
        }
    }

    /// Sets the cursor of a freshly added target to its newest signature so
    /// that activity before the insertion is never reported. Returns `false`
    /// when the address has no history yet.
    pub async fn seed_target(
        &self,
        tenant: &TenantId,
        address: &WalletAddress,
    ) -> Result<bool, MonitorError> {
        let newest = self.ledger.recent_signatures(address, 1).await?;
        let Some(newest) = newest.into_iter().next() else {
            return Ok(false);
        };
        self.cursors
            .set(
                tenant,
                address,
                Cursor::new(newest.signature, newest.slot),
            )
            .await?;
        Ok(true)
    }

    /// Drops the cursor of a target that left the watch-list.
    pub async fn forget_target(
        &self,
        tenant: &TenantId,
        address: &WalletAddress,
    ) -> Result<(), MonitorError> {
        self.cursors.remove(tenant, address).await?;
        Ok(())
    }
}

/// Wires the production collaborators: JSON-RPC ledger client, webhook
/// notifier and the tokio timer.
pub fn build_engine(
    config: &MonitorConfig,
    directory: Arc<dyn TenantDirectory>,
    cursors: Arc<dyn CursorStore>,
) -> Result<WatchEngine, MonitorError> {
    let ledger = SolanaRpcClient::new(config.solana_rpc_url(), config.rpc_timeout())?;
    let notifier = WebhookNotifier::new(config.rpc_timeout())?;
    let deps = WatchDeps {
        ledger: Arc::new(ledger),
        directory,
        cursors,
        notifier: Arc::new(notifier),
        pacer: Arc::new(TokioPacer),
    };
    Ok(WatchEngine::new(deps, WatchSettings::from_config(config)))
}

/// Runs the watch cycle on a fixed interval. A cycle that overruns the
/// interval delays the next tick rather than overlapping it.
pub async fn run_monitor(engine: Arc<WatchEngine>, every: Duration) -> Result<(), MonitorError> {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(interval_secs = every.as_secs(), "watch loop started");
    loop {
        ticker.tick().await;
        let report = engine.run_watch_cycle().await;
        info!(
            tenants = report.tenants,
            targets = report.targets,
            seeded = report.seeded,
            notifications = report.notifications,
            rate_limited = report.rate_limited,
            failed = report.failed,
            busy = report.busy,
            elapsed_ms = report.elapsed_ms,
            "watch cycle complete"
        );
    }
}

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{AddressFormatError, Cursor, Destination, PlanTier, TenantId, WalletAddress};

/// Common result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),
    #[error("wallet limit reached ({plan} - {limit})")]
    QuotaExceeded { plan: PlanTier, limit: usize },
    #[error("invalid wallet address: {0}")]
    InvalidAddress(#[from] AddressFormatError),
}

impl StorageError {
    pub fn from_source(err: impl std::fmt::Display) -> Self {
        Self::Database(err.to_string())
    }
}

/// Per (tenant, address) record of the last reported signature.
///
/// `set` and `set_if` must be atomic per key and must refuse to replace a
/// cursor with one from an older slot; both report whether the new value was
/// stored.
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn get(&self, tenant: &TenantId, address: &WalletAddress)
        -> StorageResult<Option<Cursor>>;
    async fn set(
        &self,
        tenant: &TenantId,
        address: &WalletAddress,
        cursor: Cursor,
    ) -> StorageResult<bool>;
    /// Stores `cursor` only while the current value still equals `expected`
    /// (`None` meaning no cursor yet).
    async fn set_if(
        &self,
        tenant: &TenantId,
        address: &WalletAddress,
        expected: Option<&Cursor>,
        cursor: Cursor,
    ) -> StorageResult<bool>;
    async fn remove(&self, tenant: &TenantId, address: &WalletAddress) -> StorageResult<()>;
}

/// Read side of the tenant configuration consumed by the watch cycle.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn list_tenants(&self) -> StorageResult<Vec<TenantId>>;
    /// Raw address strings as configured; validation happens in the watcher.
    async fn list_watched_addresses(&self, tenant: &TenantId) -> StorageResult<Vec<String>>;
    async fn resolve_destination(&self, tenant: &TenantId) -> StorageResult<Option<Destination>>;
}

/// Write side of the tenant configuration used by the management surface.
#[async_trait]
pub trait TenantAdmin: Send + Sync {
    async fn ensure_tenant(&self, tenant: &TenantId) -> StorageResult<()>;
    /// Returns `false` when the address was already on the watch-list.
    async fn add_wallet(&self, tenant: &TenantId, address: &WalletAddress) -> StorageResult<bool>;
    async fn remove_wallet(&self, tenant: &TenantId, address: &str) -> StorageResult<bool>;
    async fn set_alert_destination(
        &self,
        tenant: &TenantId,
        destination: Destination,
    ) -> StorageResult<()>;
    async fn plan(&self, tenant: &TenantId) -> StorageResult<PlanTier>;
    async fn set_plan(&self, tenant: &TenantId, plan: PlanTier) -> StorageResult<()>;
    async fn credits(&self, tenant: &TenantId, user: &str) -> StorageResult<i64>;
    /// Adds `amount` credits and returns the new balance.
    async fn add_credits(&self, tenant: &TenantId, user: &str, amount: i64)
        -> StorageResult<i64>;

    /// Activates `plan` for the tenant and tops the purchasing user's credits
    /// up to the plan's wallet allowance.
    async fn apply_plan_purchase(
        &self,
        tenant: &TenantId,
        user: &str,
        plan: PlanTier,
    ) -> StorageResult<i64> {
        self.set_plan(tenant, plan).await?;
        let current = self.credits(tenant, user).await?;
        let allowance = plan.max_wallets() as i64;
        if current < allowance {
            self.add_credits(tenant, user, allowance - current).await
        } else {
            Ok(current)
        }
    }
}

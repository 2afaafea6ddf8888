use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use tracing::debug;

use crate::model::{Cursor, TenantId, WalletAddress};
use crate::storage::{CursorStore, StorageResult};

type CursorMap = HashMap<TenantId, HashMap<WalletAddress, Cursor>>;

/// Process-lifetime cursor store. Nothing is persisted: after a restart every
/// target is re-seeded and activity in the gap is not reported.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCursorStore {
    inner: Arc<Mutex<CursorMap>>,
}

impl InMemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of (tenant, address) pairs currently holding a cursor.
    pub fn len(&self) -> usize {
        self.lock().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, CursorMap> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CursorStore for InMemoryCursorStore {
    async fn get(
        &self,
        tenant: &TenantId,
        address: &WalletAddress,
    ) -> StorageResult<Option<Cursor>> {
        Ok(self
            .lock()
            .get(tenant)
            .and_then(|targets| targets.get(address))
            .cloned())
    }

    async fn set(
        &self,
        tenant: &TenantId,
        address: &WalletAddress,
        cursor: Cursor,
    ) -> StorageResult<bool> {
        let mut guard = self.lock();
        let targets = guard.entry(tenant.clone()).or_default();
        if let Some(current) = targets.get(address) {
            if cursor.slot < current.slot {
                debug!(
                    tenant = %tenant,
                    address = %address,
                    current_slot = current.slot,
                    offered_slot = cursor.slot,
                    "refusing to move cursor backwards"
                );
                return Ok(false);
            }
        }
        targets.insert(address.clone(), cursor);
        Ok(true)
    }

    async fn set_if(
        &self,
        tenant: &TenantId,
        address: &WalletAddress,
        expected: Option<&Cursor>,
        cursor: Cursor,
    ) -> StorageResult<bool> {
        let mut guard = self.lock();
        let targets = guard.entry(tenant.clone()).or_default();
        let current = targets.get(address);
        if current != expected {
            debug!(
                tenant = %tenant,
                address = %address,
                "cursor changed since it was read, not overwriting"
            );
            return Ok(false);
        }
        if current.is_some_and(|current| cursor.slot < current.slot) {
            return Ok(false);
        }
        targets.insert(address.clone(), cursor);
        Ok(true)
    }

    async fn remove(&self, tenant: &TenantId, address: &WalletAddress) -> StorageResult<()> {
        let mut guard = self.lock();
        if let Some(targets) = guard.get_mut(tenant) {
            targets.remove(address);
            if targets.is_empty() {
                guard.remove(tenant);
            }
        }
        Ok(())
    }
}

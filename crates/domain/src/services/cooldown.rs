use std::time::{Duration, Instant};

use moka::sync::Cache;
use thiserror::Error;

use crate::model::{PlanTier, TenantId};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("command on cooldown, retry in {}s", remaining.as_secs().max(1))]
pub struct CooldownActive {
    pub remaining: Duration,
}

/// Tracks the last management command per (tenant, user) and enforces the
/// plan's minimum interval between commands.
#[derive(Debug)]
pub struct CommandCooldowns {
    recent: Cache<(TenantId, String), Instant>,
}

impl CommandCooldowns {
    pub const DEFAULT_CAPACITY: u64 = 100_000;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: u64) -> Self {
        // Entries older than the longest cooldown can never reject a command.
        let longest = PlanTier::Free
            .command_cooldown()
            .max(PlanTier::Pro.command_cooldown())
            .max(PlanTier::Elite.command_cooldown());
        Self {
            recent: Cache::builder()
                .time_to_live(longest)
                .max_capacity(capacity.max(1))
                .build(),
        }
    }

    /// Records a command if the caller is outside its cooldown window.
    pub fn try_acquire(
        &self,
        tenant: &TenantId,
        user: &str,
        plan: PlanTier,
    ) -> Result<(), CooldownActive> {
        let key = (tenant.clone(), user.to_owned());
        let now = Instant::now();
        if let Some(last) = self.recent.get(&key) {
            let elapsed = now.saturating_duration_since(last);
            let cooldown = plan.command_cooldown();
            if elapsed < cooldown {
                return Err(CooldownActive {
                    remaining: cooldown - elapsed,
                });
            }
        }
        self.recent.insert(key, now);
        Ok(())
    }
}

impl Default for CommandCooldowns {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_back_to_back_commands() {
        let cooldowns = CommandCooldowns::default();
        let tenant = TenantId::from("guild");
        assert!(cooldowns.try_acquire(&tenant, "alice", PlanTier::Free).is_ok());

        let err = cooldowns
            .try_acquire(&tenant, "alice", PlanTier::Free)
            .unwrap_err();
        assert!(err.remaining <= Duration::from_secs(10));
        assert!(err.remaining > Duration::from_secs(9));
    }

    #[test]
    fn cooldowns_are_per_user_and_tenant() {
        let cooldowns = CommandCooldowns::default();
        let tenant = TenantId::from("guild");
        let other = TenantId::from("other-guild");
        assert!(cooldowns.try_acquire(&tenant, "alice", PlanTier::Pro).is_ok());
        assert!(cooldowns.try_acquire(&tenant, "bob", PlanTier::Pro).is_ok());
        assert!(cooldowns.try_acquire(&other, "alice", PlanTier::Pro).is_ok());
    }
}

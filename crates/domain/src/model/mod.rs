//! Data structures and helpers shared across the API and monitor binaries.

use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;

/// Number of lamports in one SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Byte length of a decoded ledger public key.
pub const ADDRESS_BYTES: usize = 32;

/// Converts the ledger's native integer unit into its display unit.
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// Identifier of one tenant (community). Opaque to the watch engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self::new(value.to_owned())
    }
}

/// Errors emitted when a watched address is not a valid base58 public key.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressFormatError {
    #[error("address is empty")]
    Empty,
    #[error("address is not valid base58")]
    NotBase58,
    #[error("address must decode to {ADDRESS_BYTES} bytes, got {0}")]
    WrongLength(usize),
}

/// A syntactically valid ledger address in its canonical base58 form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Trims surrounding whitespace and checks that the value decodes to a
    /// 32-byte key.
    pub fn parse(raw: &str) -> Result<Self, AddressFormatError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AddressFormatError::Empty);
        }
        let bytes = bs58::decode(trimmed)
            .into_vec()
            .map_err(|_| AddressFormatError::NotBase58)?;
        if bytes.len() != ADDRESS_BYTES {
            return Err(AddressFormatError::WrongLength(bytes.len()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One (tenant, address) pair under observation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchTarget {
    pub tenant: TenantId,
    pub address: WalletAddress,
}

impl WatchTarget {
    pub fn new(tenant: TenantId, address: WalletAddress) -> Self {
        Self { tenant, address }
    }
}

/// Last-seen signature for a watch target together with the slot it landed
/// in. The slot is what keeps the cursor from moving backwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub signature: String,
    pub slot: u64,
}

impl Cursor {
    pub fn new(signature: impl Into<String>, slot: u64) -> Self {
        Self {
            signature: signature.into(),
            slot,
        }
    }
}

/// Subscription tier of a tenant.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum PlanTier {
    #[default]
    Free,
    Pro,
    Elite,
}

impl PlanTier {
    /// Maximum number of addresses a tenant on this plan may watch.
    pub fn max_wallets(self) -> usize {
        match self {
            PlanTier::Free => 2,
            PlanTier::Pro => 10,
            PlanTier::Elite => 50,
        }
    }

    /// Minimum interval between two management commands from the same user.
    pub fn command_cooldown(self) -> Duration {
        match self {
            PlanTier::Free => Duration::from_secs(10),
            PlanTier::Pro => Duration::from_secs(3),
            PlanTier::Elite => Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Direction::Inbound => "IN",
            Direction::Outbound => "OUT",
        }
    }

    /// RGB color used when rendering a notification for this direction.
    pub fn color(self) -> u32 {
        match self {
            Direction::Inbound => 0x00ff00,
            Direction::Outbound => 0xff0000,
        }
    }
}

/// A net balance change for a watched address inside one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferEvent {
    pub tenant: TenantId,
    pub address: WalletAddress,
    pub signature: String,
    /// Absolute delta in lamports. Never zero.
    pub lamports: u64,
    pub direction: Direction,
    pub timestamp: DateTime<Utc>,
}

impl TransferEvent {
    pub fn amount_sol(&self) -> f64 {
        lamports_to_sol(self.lamports)
    }
}

/// Where a tenant's notifications are delivered (a webhook URL for the
/// bundled notifier).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination(String);

impl Destination {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    const SYSTEM_PROGRAM: &str = "11111111111111111111111111111111";
    const WALLET: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

    #[test]
    fn parses_valid_addresses() {
        assert!(WalletAddress::parse(SYSTEM_PROGRAM).is_ok());
        let parsed = WalletAddress::parse(&format!("  {WALLET}\n")).expect("valid");
        assert_eq!(parsed.as_str(), WALLET);
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert_eq!(WalletAddress::parse("   "), Err(AddressFormatError::Empty));
        assert_eq!(
            WalletAddress::parse("0OIl-not-base58"),
            Err(AddressFormatError::NotBase58)
        );
        assert!(matches!(
            WalletAddress::parse("abc"),
            Err(AddressFormatError::WrongLength(_))
        ));
    }

    #[test]
    fn plan_limits_match_tiers() {
        assert_eq!(PlanTier::default(), PlanTier::Free);
        assert_eq!(PlanTier::Free.max_wallets(), 2);
        assert_eq!(PlanTier::Pro.max_wallets(), 10);
        assert_eq!(PlanTier::Elite.max_wallets(), 50);
        assert_eq!(PlanTier::Elite.command_cooldown(), Duration::from_secs(1));
    }

    #[test]
    fn plan_round_trips_through_strings() {
        assert_eq!(PlanTier::from_str("pro").unwrap(), PlanTier::Pro);
        assert_eq!(PlanTier::Elite.to_string(), "ELITE");
        assert!(PlanTier::from_str("gold").is_err());
    }

    #[test]
    fn converts_lamports_to_sol() {
        assert_eq!(lamports_to_sol(LAMPORTS_PER_SOL), 1.0);
        assert_eq!(format!("{:.4}", lamports_to_sol(1_234_567)), "0.0012");
    }
}

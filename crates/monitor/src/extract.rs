use chrono::{DateTime, Utc};
use walletwatch_domain::model::{Direction, TransferEvent, WalletAddress, WatchTarget};

use crate::rpc::{SignatureInfo, TransactionDetail};

/// Net lamport change for one address inside one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChange {
    pub lamports: u64,
    pub direction: Direction,
}

/// Computes the balance change of `address` in `detail`.
///
/// An address can show up more than once in the account list; positions are
/// visited in order and the last match wins. Missing balance entries read as
/// zero. Returns `None` when the address is absent or its balance is
/// unchanged.
pub fn balance_change(detail: &TransactionDetail, address: &WalletAddress) -> Option<BalanceChange> {
    let mut delta: Option<i128> = None;
    for (index, key) in detail.account_keys.iter().enumerate() {
        if key != address.as_str() {
            continue;
        }
        let pre = detail.pre_balances.get(index).copied().unwrap_or(0);
        let post = detail.post_balances.get(index).copied().unwrap_or(0);
        delta = Some(post as i128 - pre as i128);
    }

    let delta = delta?;
    let lamports = u64::try_from(delta.unsigned_abs()).ok()?;
    if lamports == 0 {
        return None;
    }
    let direction = if delta > 0 {
        Direction::Inbound
    } else {
        Direction::Outbound
    };
    Some(BalanceChange {
        lamports,
        direction,
    })
}

/// Derives the transfer event for `target`, or `None` when the transaction
/// did not move its balance.
pub fn extract_transfer(
    target: &WatchTarget,
    signature: &SignatureInfo,
    detail: &TransactionDetail,
) -> Option<TransferEvent> {
    let change = balance_change(detail, &target.address)?;
    let timestamp = detail
        .block_time
        .or(signature.block_time)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now);

    Some(TransferEvent {
        tenant: target.tenant.clone(),
        address: target.address.clone(),
        signature: signature.signature.clone(),
        lamports: change.lamports,
        direction: change.direction,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use walletwatch_domain::model::{TenantId, LAMPORTS_PER_SOL};

    const WATCHED: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";
    const OTHER: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

    fn target() -> WatchTarget {
        WatchTarget::new(
            TenantId::from("guild"),
            WalletAddress::parse(WATCHED).unwrap(),
        )
    }

    fn detail(keys: &[&str], pre: &[u64], post: &[u64]) -> TransactionDetail {
        TransactionDetail {
            slot: 42,
            block_time: Some(1_700_000_000),
            pre_balances: pre.to_vec(),
            post_balances: post.to_vec(),
            account_keys: keys.iter().map(|key| key.to_string()).collect(),
        }
    }

    #[test]
    fn rising_balance_is_inbound() {
        let tx = detail(&[OTHER, WATCHED], &[50, 10], &[45, 15]);
        let event = extract_transfer(&target(), &SignatureInfo::new("sig", 42), &tx).unwrap();
        assert_eq!(event.direction, Direction::Inbound);
        assert_eq!(event.lamports, 5);
        assert_eq!(event.signature, "sig");
        assert_eq!(event.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn falling_balance_is_outbound() {
        let tx = detail(&[WATCHED, OTHER], &[15, 0], &[10, 5]);
        let change = balance_change(&tx, &target().address).unwrap();
        assert_eq!(
            change,
            BalanceChange {
                lamports: 5,
                direction: Direction::Outbound
            }
        );
    }

    #[test]
    fn converts_to_display_units() {
        let tx = detail(&[WATCHED], &[0], &[LAMPORTS_PER_SOL + LAMPORTS_PER_SOL / 2]);
        let event = extract_transfer(&target(), &SignatureInfo::new("sig", 1), &tx).unwrap();
        assert_eq!(event.amount_sol(), 1.5);
    }

    #[test]
    fn unchanged_balance_is_suppressed() {
        let tx = detail(&[OTHER, WATCHED], &[50, 10], &[45, 10]);
        assert!(extract_transfer(&target(), &SignatureInfo::new("sig", 42), &tx).is_none());
    }

    #[test]
    fn absent_address_is_suppressed() {
        let tx = detail(&[OTHER], &[50], &[45]);
        assert!(balance_change(&tx, &target().address).is_none());
    }

    #[test]
    fn last_occurrence_wins() {
        let tx = detail(&[WATCHED, OTHER, WATCHED], &[100, 0, 20], &[10, 0, 30]);
        let change = balance_change(&tx, &target().address).unwrap();
        assert_eq!(change.direction, Direction::Inbound);
        assert_eq!(change.lamports, 10);
    }

    #[test]
    fn missing_balances_read_as_zero() {
        let tx = detail(&[OTHER, WATCHED], &[5], &[5, 7]);
        let change = balance_change(&tx, &target().address).unwrap();
        assert_eq!(change.lamports, 7);
        assert_eq!(change.direction, Direction::Inbound);
    }

    #[test]
    fn falls_back_to_signature_block_time() {
        let mut tx = detail(&[WATCHED], &[0], &[1]);
        tx.block_time = None;
        let mut signature = SignatureInfo::new("sig", 1);
        signature.block_time = Some(1_600_000_000);
        let event = extract_transfer(&target(), &signature, &tx).unwrap();
        assert_eq!(event.timestamp.timestamp(), 1_600_000_000);
    }
}

/// One entry of a newest-first signature listing for an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInfo {
    pub signature: String,
    pub slot: u64,
    /// Unix seconds, when the node knows it.
    pub block_time: Option<i64>,
}

impl SignatureInfo {
    pub fn new(signature: impl Into<String>, slot: u64) -> Self {
        Self {
            signature: signature.into(),
            slot,
            block_time: None,
        }
    }
}

/// The balance-relevant part of a confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDetail {
    pub slot: u64,
    pub block_time: Option<i64>,
    /// Balances in lamports, indexed like `account_keys`.
    pub pre_balances: Vec<u64>,
    pub post_balances: Vec<u64>,
    /// Static message keys followed by loaded writable and loaded readonly
    /// addresses.
    pub account_keys: Vec<String>,
}

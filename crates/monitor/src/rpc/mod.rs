use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use thiserror::Error;
use walletwatch_domain::model::WalletAddress;

use crate::client::{JsonRpcRequest, JsonRpcResponse, RpcSignatureStatus, RpcTransaction};

mod types;

pub use types::{SignatureInfo, TransactionDetail};

/// Failure modes of the read-only ledger surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("ledger rate limited the request")]
    RateLimited,
    #[error("ledger request failed: {0}")]
    Transient(String),
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Up to `limit` signatures touching `address`, newest first.
    async fn recent_signatures(
        &self,
        address: &WalletAddress,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, LedgerError>;

    /// `Ok(None)` when the node cannot produce the transaction (pruned,
    /// not yet confirmed, or missing status metadata).
    async fn transaction_detail(
        &self,
        signature: &str,
    ) -> Result<Option<TransactionDetail>, LedgerError>;
}

/// JSON-RPC client for a Solana node at `confirmed` commitment.
pub struct SolanaRpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl SolanaRpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<P, R>(&self, method: &'static str, params: P) -> Result<Option<R>, LedgerError>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(LedgerError::RateLimited);
        }
        if !status.is_success() {
            return Err(LedgerError::Transient(format!("{method}: http status {status}")));
        }

        let body: JsonRpcResponse<R> = response
            .json()
            .await
            .map_err(|err| LedgerError::Transient(format!("{method}: {err}")))?;

        if let Some(error) = body.error {
            return Err(classify_rpc_error(error.code, &error.message));
        }
        Ok(body.result)
    }
}

#[async_trait]
impl LedgerClient for SolanaRpcClient {
    async fn recent_signatures(
        &self,
        address: &WalletAddress,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, LedgerError> {
        let params = json!([
            address.as_str(),
            { "limit": limit, "commitment": "confirmed" }
        ]);
        let statuses: Option<Vec<RpcSignatureStatus>> =
            self.call("getSignaturesForAddress", params).await?;
        Ok(statuses
            .unwrap_or_default()
            .into_iter()
            .map(convert_signature)
            .collect())
    }

    async fn transaction_detail(
        &self,
        signature: &str,
    ) -> Result<Option<TransactionDetail>, LedgerError> {
        let params = json!([
            signature,
            {
                "encoding": "json",
                "commitment": "confirmed",
                "maxSupportedTransactionVersion": 0
            }
        ]);
        let tx: Option<RpcTransaction> = self.call("getTransaction", params).await?;
        Ok(tx.and_then(convert_transaction))
    }
}

fn convert_signature(status: RpcSignatureStatus) -> SignatureInfo {
    SignatureInfo {
        signature: status.signature,
        slot: status.slot,
        block_time: status.block_time,
    }
}

fn convert_transaction(tx: RpcTransaction) -> Option<TransactionDetail> {
    let meta = tx.meta?;
    let loaded = meta.loaded_addresses.unwrap_or_default();

    let mut account_keys = tx.transaction.message.account_keys;
    account_keys.extend(loaded.writable);
    account_keys.extend(loaded.readonly);

    Some(TransactionDetail {
        slot: tx.slot,
        block_time: tx.block_time,
        pre_balances: meta.pre_balances,
        post_balances: meta.post_balances,
        account_keys,
    })
}

fn classify_transport_error(err: reqwest::Error) -> LedgerError {
    if err.status() == Some(StatusCode::TOO_MANY_REQUESTS) {
        return LedgerError::RateLimited;
    }
    LedgerError::Transient(err.to_string())
}

fn classify_rpc_error(code: i64, message: &str) -> LedgerError {
    let lowered = message.to_ascii_lowercase();
    if code == 429
        || lowered.contains("429")
        || lowered.contains("rate limit")
        || lowered.contains("too many requests")
    {
        LedgerError::RateLimited
    } else {
        LedgerError::Transient(format!("rpc error {code}: {message}"))
    }
}

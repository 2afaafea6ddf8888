pub mod health;
pub mod metrics;
pub mod tenants;

pub use health::{healthz_handler, root_handler};
pub use metrics::metrics_handler;
pub use tenants::{
    add_wallet_handler, credits_handler, plan_handler, remove_wallet_handler,
    set_channel_handler,
};

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use walletwatch_domain::model::{AddressFormatError, PlanTier};
use walletwatch_domain::services::cooldown::CooldownActive;
use walletwatch_domain::storage::StorageError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid wallet address: {0}")]
    InvalidAddress(#[from] AddressFormatError),
    #[error("alert destination must be an http(s) webhook url")]
    InvalidDestination,
    #[error("{0}")]
    Cooldown(#[from] CooldownActive),
    #[error("wallet limit reached ({plan} - {limit})")]
    QuotaExceeded { plan: PlanTier, limit: usize },
    #[error("storage failure: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for ApiError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::QuotaExceeded { plan, limit } => ApiError::QuotaExceeded { plan, limit },
            StorageError::InvalidAddress(err) => ApiError::InvalidAddress(err),
            other => ApiError::Storage(other),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidAddress(_) | ApiError::InvalidDestination => StatusCode::BAD_REQUEST,
            ApiError::Cooldown(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::QuotaExceeded { .. } => StatusCode::FORBIDDEN,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

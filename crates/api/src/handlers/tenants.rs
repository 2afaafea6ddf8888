//! Management routes: alert channel, watch-list edits, credits and plan
//! activation.

use actix_web::{web, HttpResponse};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walletwatch_domain::model::{Destination, PlanTier, TenantId, WalletAddress};
use walletwatch_domain::storage::{StorageError, TenantAdmin};

use crate::state::AppState;

use super::ApiError;

pub const WALLET_ADDED: &str = "Wallet added, existing transactions ignored";
pub const WALLET_ALREADY_WATCHED: &str = "Wallet already watched";
pub const WALLET_REMOVED: &str = "Wallet removed";
pub const CHANNEL_SET: &str = "Alert channel set";

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetChannelRequest {
    pub destination: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddWalletRequest {
    pub user_id: String,
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemoveWalletQuery {
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreditsResponse {
    pub tenant: String,
    pub user_id: String,
    pub credits: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlanRequest {
    pub user_id: String,
    pub plan: PlanTier,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlanResponse {
    pub plan: PlanTier,
    pub credits: i64,
}

async fn enforce_cooldown(state: &AppState, tenant: &TenantId, user: &str) -> Result<(), ApiError> {
    let plan = state.storage().plan(tenant).await?;
    state
        .cooldowns()
        .try_acquire(tenant, user, plan)
        .map_err(|err| {
            counter!("api_tenant_requests_total", "endpoint" => "cooldown", "status" => "rejected")
                .increment(1);
            ApiError::from(err)
        })
}

pub async fn set_channel_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<SetChannelRequest>,
) -> Result<HttpResponse, ApiError> {
    let tenant = TenantId::new(path.into_inner());
    let destination = payload.destination.trim();
    if !(destination.starts_with("https://") || destination.starts_with("http://")) {
        counter!("api_tenant_requests_total", "endpoint" => "channel", "status" => "invalid")
            .increment(1);
        return Err(ApiError::InvalidDestination);
    }

    state
        .storage()
        .set_alert_destination(&tenant, Destination::new(destination))
        .await?;
    counter!("api_tenant_requests_total", "endpoint" => "channel", "status" => "ok").increment(1);
    info!(tenant = %tenant, "alert destination updated");
    Ok(HttpResponse::Ok().json(MessageResponse::new(CHANNEL_SET)))
}

pub async fn add_wallet_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<AddWalletRequest>,
) -> Result<HttpResponse, ApiError> {
    let tenant = TenantId::new(path.into_inner());
    let address = WalletAddress::parse(&payload.address).inspect_err(|_| {
        counter!("api_tenant_requests_total", "endpoint" => "add_wallet", "status" => "invalid")
            .increment(1);
    })?;
    enforce_cooldown(&state, &tenant, &payload.user_id).await?;

    let added = match state.storage().add_wallet(&tenant, &address).await {
        Ok(added) => added,
        Err(err) => {
            let status = if matches!(err, StorageError::QuotaExceeded { .. }) {
                "quota_exceeded"
            } else {
                "error"
            };
            counter!("api_tenant_requests_total", "endpoint" => "add_wallet", "status" => status)
                .increment(1);
            return Err(err.into());
        }
    };
    if !added {
        counter!("api_tenant_requests_total", "endpoint" => "add_wallet", "status" => "duplicate")
            .increment(1);
        return Ok(HttpResponse::Ok().json(MessageResponse::new(WALLET_ALREADY_WATCHED)));
    }

    // A failed seed is picked up by the next cycle, which seeds on first sight.
    if let Err(err) = state.engine().seed_target(&tenant, &address).await {
        warn!(tenant = %tenant, address = %address, %err, "cursor seeding deferred to watch loop");
    }
    counter!("api_tenant_requests_total", "endpoint" => "add_wallet", "status" => "ok")
        .increment(1);
    Ok(HttpResponse::Created().json(MessageResponse::new(WALLET_ADDED)))
}

pub async fn remove_wallet_handler(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    query: web::Query<RemoveWalletQuery>,
) -> Result<HttpResponse, ApiError> {
    let (tenant, raw_address) = path.into_inner();
    let tenant = TenantId::new(tenant);
    enforce_cooldown(&state, &tenant, &query.user_id).await?;

    let removed = state.storage().remove_wallet(&tenant, &raw_address).await?;
    if let Ok(address) = WalletAddress::parse(&raw_address) {
        if let Err(err) = state.engine().forget_target(&tenant, &address).await {
            warn!(tenant = %tenant, address = %address, %err, "failed to drop cursor");
        }
    }
    let status = if removed { "ok" } else { "absent" };
    counter!("api_tenant_requests_total", "endpoint" => "remove_wallet", "status" => status)
        .increment(1);
    Ok(HttpResponse::Ok().json(MessageResponse::new(WALLET_REMOVED)))
}

pub async fn credits_handler(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ApiError> {
    let (tenant, user_id) = path.into_inner();
    let tenant = TenantId::new(tenant);
    let credits = state.storage().credits(&tenant, &user_id).await?;
    counter!("api_tenant_requests_total", "endpoint" => "credits", "status" => "ok").increment(1);
    Ok(HttpResponse::Ok().json(CreditsResponse {
        tenant: tenant.into_inner(),
        user_id,
        credits,
    }))
}

/// Activates a purchased plan. Served on the internal listener only.
pub async fn plan_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<PlanRequest>,
) -> Result<HttpResponse, ApiError> {
    let tenant = TenantId::new(path.into_inner());
    let PlanRequest { user_id, plan } = payload.into_inner();
    let credits = state
        .storage()
        .apply_plan_purchase(&tenant, &user_id, plan)
        .await?;
    counter!("api_tenant_requests_total", "endpoint" => "plan", "status" => "ok").increment(1);
    info!(tenant = %tenant, user = %user_id, %plan, credits, "plan activated");
    Ok(HttpResponse::Ok().json(PlanResponse { plan, credits }))
}

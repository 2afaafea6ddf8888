use actix_web::{web::Data, HttpResponse};
use serde::Serialize;
use walletwatch_monitor::CycleReport;

use crate::state::AppState;

/// Keep-alive probe for uptime pingers.
pub async fn root_handler() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body("Bot is running")
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// `None` until the first watch cycle has finished.
    pub last_cycle: Option<CycleReport>,
}

pub async fn healthz_handler(state: Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        last_cycle: state.engine().last_report(),
    })
}

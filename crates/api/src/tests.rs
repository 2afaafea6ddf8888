use std::{sync::Arc, time::Duration};

use actix_web::{body::to_bytes, http::StatusCode, test, web, App};
use async_trait::async_trait;
use walletwatch_domain::model::{Cursor, Destination, PlanTier, TenantId, WalletAddress};
use walletwatch_domain::services::{
    cooldown::CommandCooldowns,
    cursor::InMemoryCursorStore,
    telemetry::{init_telemetry, TelemetryConfig, TelemetryGuard},
};
use walletwatch_domain::storage::{CursorStore, TenantDirectory};
use walletwatch_monitor::{
    dispatch::{NotificationMessage, Notifier, NotifyError},
    pacer::Pacer,
    rpc::{LedgerClient, LedgerError, SignatureInfo, TransactionDetail},
    WatchDeps, WatchEngine, WatchSettings,
};
use walletwatch_storage::SeaOrmStorage;

use crate::application::{internal_routes, public_routes};
use crate::handlers::metrics::PROMETHEUS_CONTENT_TYPE;
use crate::handlers::tenants::{
    CreditsResponse, MessageResponse, PlanResponse, WALLET_ADDED, WALLET_ALREADY_WATCHED,
    WALLET_REMOVED,
};
use crate::state::AppState;

const TENANT: &str = "guild-1";
const WALLETS: [&str; 3] = [
    "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM",
    "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA",
    "SysvarC1ock11111111111111111111111111111111",
];

/// Every address has exactly one historical transaction.
struct StaticLedger;

#[async_trait]
impl LedgerClient for StaticLedger {
    async fn recent_signatures(
        &self,
        _address: &WalletAddress,
        _limit: usize,
    ) -> Result<Vec<SignatureInfo>, LedgerError> {
        Ok(vec![SignatureInfo::new("S9", 9)])
    }

    async fn transaction_detail(
        &self,
        _signature: &str,
    ) -> Result<Option<TransactionDetail>, LedgerError> {
        Ok(None)
    }
}

struct SilentNotifier;

#[async_trait]
impl Notifier for SilentNotifier {
    async fn send(
        &self,
        _destination: &Destination,
        _message: &NotificationMessage,
    ) -> Result<(), NotifyError> {
        Ok(())
    }
}

struct NoPause;

#[async_trait]
impl Pacer for NoPause {
    async fn pause(&self, _duration: Duration) {}
}

struct Fixture {
    state: AppState,
    storage: SeaOrmStorage,
    cursors: Arc<InMemoryCursorStore>,
}

async fn storage() -> SeaOrmStorage {
    SeaOrmStorage::connect("sqlite::memory:")
        .await
        .expect("storage inits")
}

fn telemetry() -> TelemetryGuard {
    let config = TelemetryConfig::from_env("API_TEST");
    init_telemetry(&config).expect("telemetry inits")
}

async fn fixture() -> Fixture {
    let storage = storage().await;
    let cursors = Arc::new(InMemoryCursorStore::new());
    let engine = WatchEngine::new(
        WatchDeps {
            ledger: Arc::new(StaticLedger),
            directory: Arc::new(storage.clone()),
            cursors: cursors.clone(),
            notifier: Arc::new(SilentNotifier),
            pacer: Arc::new(NoPause),
        },
        WatchSettings::default(),
    );
    let state = AppState::new(
        storage.clone(),
        Arc::new(engine),
        Arc::new(CommandCooldowns::default()),
        telemetry(),
    );
    Fixture {
        state,
        storage,
        cursors,
    }
}

fn add_wallet(user: &str, address: &str) -> test::TestRequest {
    test::TestRequest::post()
        .uri(&format!("/api/v1/tenants/{TENANT}/wallets"))
        .set_json(serde_json::json!({ "user_id": user, "address": address }))
}

#[actix_web::test]
async fn root_reports_liveness() {
    let fixture = fixture().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(fixture.state))
            .configure(public_routes),
    )
    .await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = to_bytes(resp.into_body()).await.unwrap();
    assert_eq!(body.as_ref(), b"Bot is running");
}

#[actix_web::test]
async fn healthz_exposes_last_cycle() {
    let fixture = fixture().await;
    let engine_state = fixture.state.clone();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(fixture.state))
            .configure(public_routes),
    )
    .await;

    let before: serde_json::Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/healthz").to_request(),
    )
    .await;
    assert_eq!(before["status"], "ok");
    assert!(before["last_cycle"].is_null());

    engine_state.engine().run_watch_cycle().await;

    let after: serde_json::Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/healthz").to_request(),
    )
    .await;
    assert_eq!(after["last_cycle"]["tenants"], 0);
}

#[actix_web::test]
async fn adding_a_wallet_seeds_its_cursor() {
    let fixture = fixture().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(fixture.state))
            .configure(public_routes),
    )
    .await;

    let resp = test::call_service(&app, add_wallet("alice", WALLETS[0]).to_request()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: MessageResponse = test::read_body_json(resp).await;
    assert_eq!(body.message, WALLET_ADDED);

    let tenant = TenantId::from(TENANT);
    let address = WalletAddress::parse(WALLETS[0]).unwrap();
    assert_eq!(
        fixture.cursors.get(&tenant, &address).await.unwrap(),
        Some(Cursor::new("S9", 9))
    );
    assert_eq!(
        fixture.storage.list_watched_addresses(&tenant).await.unwrap(),
        vec![WALLETS[0].to_string()]
    );

    let resp = test::call_service(&app, add_wallet("bob", WALLETS[0]).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: MessageResponse = test::read_body_json(resp).await;
    assert_eq!(body.message, WALLET_ALREADY_WATCHED);
}

#[actix_web::test]
async fn rejects_invalid_address() {
    let fixture = fixture().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(fixture.state))
            .configure(public_routes),
    )
    .await;

    let resp = test::call_service(&app, add_wallet("alice", "not-a-wallet").to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(fixture.cursors.is_empty());
}

#[actix_web::test]
async fn free_plan_caps_watch_list() {
    let fixture = fixture().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(fixture.state))
            .configure(public_routes),
    )
    .await;

    for (user, wallet) in ["alice", "bob"].iter().zip(WALLETS) {
        let resp = test::call_service(&app, add_wallet(user, wallet).to_request()).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let resp = test::call_service(&app, add_wallet("carol", WALLETS[2]).to_request()).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "wallet limit reached (FREE - 2)");
}

#[actix_web::test]
async fn back_to_back_commands_hit_cooldown() {
    let fixture = fixture().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(fixture.state))
            .configure(public_routes),
    )
    .await;

    let resp = test::call_service(&app, add_wallet("alice", WALLETS[0]).to_request()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let resp = test::call_service(&app, add_wallet("alice", WALLETS[1]).to_request()).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[actix_web::test]
async fn removing_a_wallet_drops_its_cursor() {
    let fixture = fixture().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(fixture.state))
            .configure(public_routes),
    )
    .await;

    let resp = test::call_service(&app, add_wallet("alice", WALLETS[0]).to_request()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::delete()
        .uri(&format!(
            "/api/v1/tenants/{TENANT}/wallets/{}?user_id=bob",
            WALLETS[0]
        ))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: MessageResponse = test::read_body_json(resp).await;
    assert_eq!(body.message, WALLET_REMOVED);

    let tenant = TenantId::from(TENANT);
    assert!(fixture.cursors.is_empty());
    assert!(fixture
        .storage
        .list_watched_addresses(&tenant)
        .await
        .unwrap()
        .is_empty());
}

#[actix_web::test]
async fn channel_requires_webhook_url() {
    let fixture = fixture().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(fixture.state))
            .configure(public_routes),
    )
    .await;

    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/tenants/{TENANT}/channel"))
        .set_json(serde_json::json!({ "destination": "general" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/tenants/{TENANT}/channel"))
        .set_json(serde_json::json!({ "destination": "https://hooks.example/alerts" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    assert_eq!(
        fixture
            .storage
            .resolve_destination(&TenantId::from(TENANT))
            .await
            .unwrap(),
        Some(Destination::new("https://hooks.example/alerts"))
    );
}

#[actix_web::test]
async fn plan_purchase_tops_up_credits() {
    let fixture = fixture().await;
    let state = web::Data::new(fixture.state);
    let internal = test::init_service(
        App::new()
            .app_data(state.clone())
            .configure(internal_routes),
    )
    .await;
    let public = test::init_service(App::new().app_data(state).configure(public_routes)).await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/tenants/{TENANT}/plan"))
        .set_json(serde_json::json!({ "user_id": "alice", "plan": "PRO" }))
        .to_request();
    let resp = test::call_service(&internal, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: PlanResponse = test::read_body_json(resp).await;
    assert_eq!(body.plan, PlanTier::Pro);
    assert_eq!(body.credits, 10);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/tenants/{TENANT}/credits/alice"))
        .to_request();
    let body: CreditsResponse = test::call_and_read_body_json(&public, req).await;
    assert_eq!(body.credits, 10);

    // PRO lifts the wallet cap past the free allowance.
    for (user, wallet) in ["u1", "u2", "u3"].iter().zip(WALLETS) {
        let resp = test::call_service(&public, add_wallet(user, wallet).to_request()).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }
}

#[actix_web::test]
async fn plan_route_is_not_public() {
    let fixture = fixture().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(fixture.state))
            .configure(public_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/tenants/{TENANT}/plan"))
        .set_json(serde_json::json!({ "user_id": "alice", "plan": "ELITE" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn metrics_endpoint_renders_prometheus_text() {
    let fixture = fixture().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(fixture.state))
            .configure(internal_routes),
    )
    .await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        PROMETHEUS_CONTENT_TYPE
    );
}

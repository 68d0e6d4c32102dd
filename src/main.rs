use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use splitpool::config::{CONFIG, EngineSettings};
use splitpool::core::models::wallet::WalletKind;
use splitpool::{CreateWalletRequest, EngineDeps, EngineError, SplitPoolService};
use splitpool::infrastructure::cosign::FeePayerCoSigner;
use splitpool::infrastructure::cosign::local::LocalCoSigner;
use splitpool::infrastructure::directory::in_memory::InMemoryDirectory;
use splitpool::infrastructure::keystore::in_memory::InMemoryKeystore;
use splitpool::infrastructure::ledger::in_memory::InMemoryLedger;
use splitpool::infrastructure::logging::in_memory::InMemoryAuditLog;
use splitpool::infrastructure::storage::in_memory::{InMemoryMirrorStore, InMemoryWalletStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use uuid::Uuid;

struct AppState {
    service: SplitPoolService,
    ledger: Arc<InMemoryLedger>,
    directory: Arc<InMemoryDirectory>,
}

// Request structs for JSON payloads
#[derive(Deserialize)]
struct ContributeRequest {
    participant_id: String,
    amount: u64,
}

#[derive(Deserialize)]
struct RouletteRequest {
    requester_id: String,
}

#[derive(Deserialize)]
struct WithdrawRequest {
    requester_id: String,
    #[serde(default)]
    destination: String,
    amount: u64,
}

#[derive(Deserialize)]
struct CreateAccountRequest {
    user_id: String,
    balance: u64,
}

#[derive(Serialize)]
struct AccountResponse {
    user_id: String,
    address: String,
    balance: u64,
}

struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::Authorization(_) | EngineError::AccessDenied(_) => StatusCode::FORBIDDEN,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::StateConflict(_) => StatusCode::CONFLICT,
            EngineError::Ledger(_) => StatusCode::BAD_GATEWAY,
            EngineError::Custody(_) | EngineError::Sync(_) | EngineError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

async fn create_wallet(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateWalletRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let wallet = state.service.create_wallet(request).await?;
    Ok(Json(wallet))
}

async fn get_wallet(
    State(state): State<Arc<AppState>>,
    Path(wallet_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let wallet = state.service.get_wallet(wallet_id).await?;
    Ok(Json(wallet))
}

async fn get_wallet_by_bill(
    State(state): State<Arc<AppState>>,
    Path((bill_id, kind)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    let wallet = state.service.get_wallet_by_bill(&bill_id, kind).await?;
    Ok(Json(wallet))
}

async fn get_completion(
    State(state): State<Arc<AppState>>,
    Path(wallet_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let completion = state.service.completion(wallet_id).await?;
    Ok(Json(completion))
}

async fn get_summary(
    State(state): State<Arc<AppState>>,
    Path(wallet_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state.service.wallet_summary(wallet_id).await?;
    Ok(Json(summary))
}

async fn contribute(
    State(state): State<Arc<AppState>>,
    Path(wallet_id): Path<Uuid>,
    Json(request): Json<ContributeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = state
        .service
        .contribute(wallet_id, &request.participant_id, request.amount)
        .await?;
    Ok(Json(receipt))
}

async fn execute_roulette(
    State(state): State<Arc<AppState>>,
    Path(wallet_id): Path<Uuid>,
    Json(request): Json<RouletteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let audit = state
        .service
        .execute_roulette(wallet_id, &request.requester_id)
        .await?;
    Ok(Json(audit))
}

async fn withdraw(
    State(state): State<Arc<AppState>>,
    Path(wallet_id): Path<Uuid>,
    Json(request): Json<WithdrawRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = state
        .service
        .withdraw(
            wallet_id,
            &request.requester_id,
            &request.destination,
            request.amount,
        )
        .await?;
    Ok(Json(receipt))
}

async fn get_audit_trail(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let records = state.service.audit_trail().await?;
    Ok(Json(records))
}

async fn run_reconciliation(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let reconciled = state.service.run_reconciliation().await;
    Json(serde_json::json!({ "reconciled": reconciled }))
}

/// Seeds a funded account on the in-memory ledger so the engine has a
/// source wallet to pull contributions from.
async fn create_account(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    let address = hex::encode(SigningKey::generate(&mut OsRng).verifying_key().to_bytes());
    state.ledger.credit(&address, request.balance).await;
    state
        .directory
        .set_primary_address(&request.user_id, &address)
        .await;
    Ok(Json(AccountResponse {
        user_id: request.user_id,
        address,
        balance: request.balance,
    }))
}

fn parse_kind(raw: &str) -> Result<WalletKind, ApiError> {
    match raw.to_ascii_lowercase().as_str() {
        "fair" => Ok(WalletKind::Fair),
        "degen" => Ok(WalletKind::Degen),
        "shared" => Ok(WalletKind::Shared),
        other => Err(ApiError(EngineError::Validation(format!(
            "unknown wallet kind {}",
            other
        )))),
    }
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/accounts", post(create_account))
        .route("/wallets", post(create_wallet))
        .route("/wallets/{wallet_id}", get(get_wallet))
        .route("/wallets/{wallet_id}/completion", get(get_completion))
        .route("/wallets/{wallet_id}/summary", get(get_summary))
        .route("/wallets/{wallet_id}/contributions", post(contribute))
        .route("/wallets/{wallet_id}/roulette", post(execute_roulette))
        .route("/wallets/{wallet_id}/withdrawals", post(withdraw))
        .route("/bills/{bill_id}/wallets/{kind}", get(get_wallet_by_bill))
        .route("/audit", get(get_audit_trail))
        .route("/reconciliation", post(run_reconciliation))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(30)))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| CONFIG.log_level.clone().into()),
        )
        .init();

    let ledger = Arc::new(InMemoryLedger::new());
    let directory = Arc::new(InMemoryDirectory::new());
    let cosigner = Arc::new(LocalCoSigner::generate());
    // The fee payer holds operating funds so co-signed withdrawals clear.
    ledger.credit(&cosigner.fee_payer_address(), 1_000_000_000).await;

    let ledger_dyn: Arc<dyn splitpool::infrastructure::ledger::LedgerClient> = ledger.clone();
    let directory_dyn: Arc<dyn splitpool::infrastructure::directory::UserDirectory> =
        directory.clone();
    let deps = EngineDeps {
        store: Arc::new(InMemoryWalletStore::new()),
        mirror: Arc::new(InMemoryMirrorStore::new()),
        ledger: ledger_dyn,
        secondary_ledger: None,
        keystore: Arc::new(InMemoryKeystore::new()),
        cosigner,
        directory: directory_dyn,
        audit: Arc::new(InMemoryAuditLog::new()),
    };
    let service = SplitPoolService::new(deps, EngineSettings::from_config(&CONFIG));

    let state = Arc::new(AppState {
        service,
        ledger,
        directory,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], CONFIG.port));
    info!("splitpool settlement engine listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, router(state))
        .await
        .expect("server error");
}

// Partnership Ledger - Web Server
// JSON API over the ledger controller, with shared-password sessions

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post, put},
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use partnership_ledger::logging::init_logging;
use partnership_ledger::{
    export_file_name, AllocationEngine, Config, Controller, LedgerError, LedgerSummary, LoginGate, Partner,
    Period, Session, Storage, FIRM_NAME,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

const SESSION_HEADER: &str = "x-session-token";

/// Sessions older than this must sign in again
const SESSION_TTL_HOURS: i64 = 12;

type SharedController = Controller<Box<dyn Storage + Send>>;

/// Shared application state
#[derive(Clone)]
struct AppState {
    ledger: Arc<Mutex<SharedController>>,
    sessions: Arc<Mutex<HashMap<Uuid, Session>>>,
    gate: Arc<LoginGate>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Handler error, rendered as a failed envelope
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "Please sign in".to_string(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let status = match &err {
            LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
            LedgerError::Login(_) => StatusCode::UNAUTHORIZED,
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", err);
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::failure(self.message))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

/// Controller state only changes after a reducer succeeds, so a guard
/// abandoned by a panicking handler still holds a consistent ledger.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("Recovering state lock after a panicked request");
        poisoned.into_inner()
    })
}

fn is_expired(session: &Session, now: DateTime<Utc>) -> bool {
    now - session.started_at > chrono::Duration::hours(SESSION_TTL_HOURS)
}

impl AppState {
    /// Resolve the session named by the request's token header
    fn authorize(&self, headers: &HeaderMap) -> std::result::Result<Session, ApiError> {
        let token = headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .ok_or_else(ApiError::unauthorized)?;

        let mut sessions = lock(&self.sessions);
        let session = sessions.get(&token).cloned().ok_or_else(ApiError::unauthorized)?;

        if is_expired(&session, Utc::now()) {
            sessions.remove(&token);
            tracing::info!("Session for {} expired", session.partner);
            return Err(ApiError::unauthorized());
        }
        Ok(session)
    }

    /// Lock the controller with audit events attributed to `session`
    fn ledger_for(&self, session: &Session) -> std::result::Result<MutexGuard<'_, SharedController>, ApiError> {
        let mut ledger = lock(&self.ledger);
        ledger.set_actor(session.partner.clone());
        Ok(ledger)
    }
}

// ============================================================================
// Request / response bodies
// ============================================================================

#[derive(Deserialize)]
struct LoginRequest {
    partner: String,
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    token: Uuid,
    partner: String,
    greeting: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PartnerResponse {
    id: u32,
    name: String,
    contribution: Decimal,
    ownership: Decimal,
}

#[derive(Deserialize)]
struct ContributionRequest {
    contribution: Decimal,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordPeriodRequest {
    date: Option<NaiveDate>,
    total_value: Decimal,
    #[serde(default)]
    notes: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PeriodResponse {
    #[serde(flatten)]
    period: Period,
    return_pct: Decimal,
}

impl From<Period> for PeriodResponse {
    fn from(period: Period) -> Self {
        Self {
            return_pct: period.return_pct(),
            period,
        }
    }
}

fn partner_rows(ledger: &SharedController) -> Vec<PartnerResponse> {
    ledger
        .state()
        .partners
        .iter()
        .map(|p: &Partner| PartnerResponse {
            id: p.id,
            name: p.name.clone(),
            contribution: p.contribution,
            ownership: ledger.ownership_of(p.id),
        })
        .collect()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/login - Exchange partner name + shared password for a token
async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> ApiResult<LoginResponse> {
    let session = state.gate.login(&req.partner, &req.password).map_err(LedgerError::from)?;

    let response = LoginResponse {
        token: session.token,
        partner: session.partner.clone(),
        greeting: session.greeting(),
    };
    let mut sessions = lock(&state.sessions);
    let now = Utc::now();
    sessions.retain(|_, s| !is_expired(s, now));
    sessions.insert(session.token, session);

    Ok(Json(ApiResponse::ok(response)))
}

/// POST /api/logout
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<&'static str> {
    let session = state.authorize(&headers)?;
    lock(&state.sessions).remove(&session.token);
    tracing::info!("{} logged out", session.partner);

    Ok(Json(ApiResponse::ok("Logged out")))
}

/// GET /api/partners - Roster with live ownership
async fn get_partners(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Vec<PartnerResponse>> {
    let session = state.authorize(&headers)?;
    let ledger = state.ledger_for(&session)?;

    Ok(Json(ApiResponse::ok(partner_rows(&ledger))))
}

/// PUT /api/partners/:id - Set one partner's contribution
async fn update_partner(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u32>,
    Json(req): Json<ContributionRequest>,
) -> ApiResult<Vec<PartnerResponse>> {
    let session = state.authorize(&headers)?;
    let mut ledger = state.ledger_for(&session)?;

    ledger.update_contribution(id, req.contribution)?;

    Ok(Json(ApiResponse::ok(partner_rows(&ledger))))
}

/// GET /api/periods - Period history, oldest first
async fn get_periods(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Vec<PeriodResponse>> {
    let session = state.authorize(&headers)?;
    let ledger = state.ledger_for(&session)?;

    let periods = ledger.state().periods.iter().cloned().map(PeriodResponse::from).collect();
    Ok(Json(ApiResponse::ok(periods)))
}

/// POST /api/periods - Record a period from current contributions
async fn record_period(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RecordPeriodRequest>,
) -> std::result::Result<(StatusCode, Json<ApiResponse<PeriodResponse>>), ApiError> {
    let session = state.authorize(&headers)?;
    let mut ledger = state.ledger_for(&session)?;

    let date = req.date.unwrap_or_else(|| Utc::now().date_naive());
    let id = ledger.record_period(date, req.total_value, req.notes)?;

    let period = ledger
        .state()
        .period(id)
        .cloned()
        .ok_or_else(|| ApiError::internal("Recorded period is missing"))?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(period.into()))))
}

/// DELETE /api/periods/:id
async fn delete_period(State(state): State<AppState>, headers: HeaderMap, Path(id): Path<i64>) -> ApiResult<i64> {
    let session = state.authorize(&headers)?;
    let mut ledger = state.ledger_for(&session)?;

    ledger.delete_period(id)?;

    Ok(Json(ApiResponse::ok(id)))
}

/// GET /api/summary - Summary cards
async fn get_summary(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<LedgerSummary> {
    let session = state.authorize(&headers)?;
    let ledger = state.ledger_for(&session)?;

    Ok(Json(ApiResponse::ok(ledger.summary()?)))
}

/// GET /api/export - CSV download
async fn export_csv(State(state): State<AppState>, headers: HeaderMap) -> std::result::Result<Response, ApiError> {
    let session = state.authorize(&headers)?;
    let csv = state.ledger_for(&session)?.export_csv()?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_file_name(Utc::now().date_naive())
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/partners", get(get_partners))
        .route("/partners/:id", put(update_partner))
        .route("/periods", get(get_periods).post(record_period))
        .route("/periods/:id", delete(delete_period))
        .route("/summary", get(get_summary))
        .route("/export", get(export_csv))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to read configuration")?;
    init_logging(config.log_format, None)?;

    println!("🌐 {} - Ledger Server", FIRM_NAME);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let storage = config
        .open_storage()
        .with_context(|| format!("Failed to open storage in {:?}", config.data_dir))?;
    let controller = Controller::load(
        storage,
        AllocationEngine::new(config.fee_rate),
        Utc::now().date_naive(),
    );
    println!("✓ Ledger opened: {:?} ({:?})", config.data_dir, config.storage);

    let gate = LoginGate::new(
        controller.state().partners.iter().map(|p| p.name.clone()).collect(),
        config.password_digest.clone(),
    );

    let state = AppState {
        ledger: Arc::new(Mutex::new(controller)),
        sessions: Arc::new(Mutex::new(HashMap::new())),
        gate: Arc::new(gate),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    tracing::info!("Listening on {}", config.bind_addr);
    println!("\n🚀 Server running on http://{}", config.bind_addr);
    println!("   API: http://{}/api/summary", config.bind_addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, build_router(state))
        .await
        .context("Server stopped unexpectedly")?;

    Ok(())
}

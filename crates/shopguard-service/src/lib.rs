#![deny(unsafe_code)]

pub mod accounts;
pub mod sessions;

use accounts::{AccountFileError, PersistedAccountStore};
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::header::LOCATION;
use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sessions::CookieSessionStore;
use shopguard_adapters::{
    AdapterError, AlwaysUnavailableScorer, BasketItem, FixedDecisionScorer, HttpRiskScoringClient,
    HttpScoringConfig, InMemoryBasketService, InMemoryCredentialStore, InMemorySessionManager,
    SimulatedRiskScorer,
};
use shopguard_core::{
    sign_in_form_return_url, AccountError, AccountLifecycleExecutor, BasketHandoff,
    CallerContext, CorrelationId, CredentialStore, ExecutorConfig, GateConfig, RegisterCommand,
    RequestContext, RiskScoringService, Session as AccountSession, SignInCommand, TrailEntry,
    VerificationGate, DEFAULT_REDIRECT,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, CookieManagerLayer, Cookies};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, Session, SessionManagerLayer};
use tracing::{info, warn};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "session";
pub const BASKET_COOKIE: &str = "basket_id";
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Key of the signed-in account inside the cookie session.
const ACCOUNT_SESSION_KEY: &str = "account";

#[derive(Debug, Clone)]
pub enum AccountStoreConfig {
    Memory,
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub enum ScorerConfig {
    Simulated { approval_ratio: f64 },
    Fixed(String),
    /// Every call fails, for outage drills.
    Unavailable,
    Http(HttpScoringConfig),
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub account_store: AccountStoreConfig,
    pub scorer: ScorerConfig,
    pub gate: GateConfig,
    pub executor: ExecutorConfig,
    pub session_ttl: chrono::Duration,
    pub secure_cookies: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            account_store: AccountStoreConfig::File(PathBuf::from("shopguard/data/accounts.json")),
            scorer: ScorerConfig::Simulated {
                approval_ratio: shopguard_adapters::DEFAULT_APPROVAL_RATIO,
            },
            gate: GateConfig::default(),
            executor: ExecutorConfig::default(),
            session_ttl: chrono::Duration::hours(12),
            secure_cookies: false,
        }
    }
}

#[derive(Clone)]
pub struct ServiceState {
    pub executor: Arc<AccountLifecycleExecutor>,
    pub sessions: Arc<InMemorySessionManager>,
    pub baskets: Arc<InMemoryBasketService>,
    pub cookie_sessions: CookieSessionStore,
    pub session_ttl: chrono::Duration,
    pub secure_cookies: bool,
}

impl ServiceState {
    pub async fn bootstrap(config: ServiceConfig) -> Result<Self, ServiceError> {
        let ServiceConfig {
            account_store,
            scorer,
            gate,
            executor,
            session_ttl,
            secure_cookies,
        } = config;

        let credentials: Arc<dyn CredentialStore> = match account_store {
            AccountStoreConfig::Memory => Arc::new(InMemoryCredentialStore::new()),
            AccountStoreConfig::File(path) => Arc::new(PersistedAccountStore::load(path)?),
        };
        let scorer: Arc<dyn RiskScoringService> = match scorer {
            ScorerConfig::Simulated { approval_ratio } => {
                Arc::new(SimulatedRiskScorer::new(approval_ratio)?)
            }
            ScorerConfig::Fixed(literal) => Arc::new(FixedDecisionScorer::new(literal)),
            ScorerConfig::Unavailable => {
                Arc::new(AlwaysUnavailableScorer::new("scorer disabled by configuration"))
            }
            ScorerConfig::Http(http) => Arc::new(HttpRiskScoringClient::new(http)?),
        };

        let sessions = Arc::new(InMemorySessionManager::new(session_ttl));
        let baskets = Arc::new(InMemoryBasketService::new());
        let gate = Arc::new(VerificationGate::new(scorer, gate));

        info!(
            account_backend = credentials.backend(),
            scorer = gate.provider(),
            "Shopguard state ready"
        );

        let executor = AccountLifecycleExecutor::new(
            gate,
            credentials,
            sessions.clone(),
            baskets.clone(),
            executor,
        );

        Ok(Self {
            executor: Arc::new(executor),
            sessions,
            baskets,
            cookie_sessions: CookieSessionStore::new(),
            session_ttl,
            secure_cookies,
        })
    }
}

/// Storefront-facing routes. Nothing here exposes gate decisions or assessment payloads.
pub fn build_router(state: ServiceState) -> Router {
    let sessions = session_layer(&state);
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/account/signin", get(sign_in_form).post(sign_in))
        .route("/v1/account/register", get(register_form).post(register))
        .route("/v1/account/signout", post(sign_out))
        .route("/v1/account/me", get(current_account))
        .route("/v1/basket", get(view_basket))
        .route("/v1/basket/items", post(add_basket_item))
        .layer(sessions)
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Operator-only routes, served on a separate listener.
pub fn build_operator_router(state: ServiceState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/assessments/:correlation_id", get(list_assessments))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn session_layer(state: &ServiceState) -> SessionManagerLayer<CookieSessionStore> {
    let ttl = time::Duration::seconds(state.session_ttl.num_seconds());
    SessionManagerLayer::new(state.cookie_sessions.clone())
        .with_name(SESSION_COOKIE)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_secure(state.secure_cookies)
        .with_expiry(Expiry::OnInactivity(ttl))
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("account store error: {0}")]
    Accounts(#[from] AccountFileError),
    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),
}

/// Which form an account error is rendered for.
#[derive(Debug, Clone, Copy)]
pub enum AccountForm {
    SignIn,
    Register,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Http { status: StatusCode, message: String },
    #[error("account action {correlation_id} failed: {error}")]
    Account {
        form: AccountForm,
        correlation_id: CorrelationId,
        error: AccountError,
    },
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn unauthorized(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    fn unprocessable(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

fn account_status(form: AccountForm, error: &AccountError) -> StatusCode {
    if error.is_validation() {
        return StatusCode::UNPROCESSABLE_ENTITY;
    }
    match (form, error) {
        (AccountForm::SignIn, _) => StatusCode::UNAUTHORIZED,
        (AccountForm::Register, AccountError::StoreConflict { .. }) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        (AccountForm::Register, AccountError::GateRejected(_))
        | (AccountForm::Register, AccountError::GateUnavailable(_)) => StatusCode::FORBIDDEN,
        (AccountForm::Register, _) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Http { status, message } => {
                (status, Json(serde_json::json!({ "error": message }))).into_response()
            }
            ApiError::Account {
                form,
                correlation_id,
                error,
            } => {
                let status = account_status(form, &error);
                let message = match form {
                    AccountForm::SignIn => error.sign_in_message(),
                    AccountForm::Register => error.registration_message(),
                };
                let field = match form {
                    AccountForm::SignIn if error.is_validation() => error.field(),
                    AccountForm::SignIn => None,
                    AccountForm::Register => error.field(),
                };
                (
                    status,
                    [(HeaderName::from_static(CORRELATION_HEADER), correlation_id.to_string())],
                    Json(serde_json::json!({
                        "error": message,
                        "field": field,
                        "correlation_id": correlation_id,
                    })),
                )
                    .into_response()
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    account_backend: &'static str,
    scorer: &'static str,
}

async fn health(State(state): State<ServiceState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "shopguard-service",
        account_backend: state.executor.credentials().backend(),
        scorer: state.executor.gate().provider(),
    })
}

#[derive(Debug, Clone, Deserialize)]
struct FormQuery {
    return_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct FormContext {
    /// Fresh id the browser hands to the fingerprinting script.
    device_session_id: String,
    return_url: Option<String>,
}

fn new_device_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

async fn sign_in_form(Query(query): Query<FormQuery>) -> Json<FormContext> {
    Json(FormContext {
        device_session_id: new_device_session_id(),
        return_url: sign_in_form_return_url(query.return_url.as_deref()),
    })
}

async fn register_form(Query(query): Query<FormQuery>) -> Json<FormContext> {
    Json(FormContext {
        device_session_id: new_device_session_id(),
        return_url: query.return_url,
    })
}

#[derive(Debug, Clone, Deserialize)]
struct SignInRequest {
    #[serde(flatten)]
    command: SignInCommand,
    #[serde(default)]
    return_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RegisterRequest {
    #[serde(flatten)]
    command: RegisterCommand,
    #[serde(default)]
    return_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct ActionResponse {
    correlation_id: CorrelationId,
    identity: String,
    redirect: String,
    basket_transferred: bool,
}

/// Anonymous basket id from the basket cookie. Only minted ids are honoured so a caller cannot
/// name an account's basket.
fn anonymous_basket_id(cookies: &Cookies) -> Option<String> {
    cookies
        .get(BASKET_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| Uuid::parse_str(value).is_ok())
}

fn caller_context(
    cookies: &Cookies,
    remote: Option<SocketAddr>,
    return_url: Option<String>,
) -> CallerContext {
    CallerContext {
        ip_address: remote.map(|addr| addr.ip().to_string()),
        anonymous_basket_id: anonymous_basket_id(cookies),
        return_url,
    }
}

/// Binds the signed-in account to the cookie session under a fresh session id.
async fn start_cookie_session(
    state: &ServiceState,
    session: &Session,
    account: &AccountSession,
) -> Result<(), ApiError> {
    if let Err(err) = session.cycle_id().await {
        warn!(error = %err, "Failed to rotate session id");
    }
    if let Err(err) = session.insert(ACCOUNT_SESSION_KEY, account).await {
        warn!(error = %err, "Failed to store account session");
        state.executor.sign_out(&account.token).await;
        return Err(ApiError::internal("could not start session"));
    }
    Ok(())
}

/// Live account behind the cookie session, if any.
async fn signed_in_account(state: &ServiceState, session: &Session) -> Option<AccountSession> {
    let account = session
        .get::<AccountSession>(ACCOUNT_SESSION_KEY)
        .await
        .ok()
        .flatten()?;
    state.sessions.lookup(&account.token).await
}

async fn sign_in(
    State(state): State<ServiceState>,
    remote: Option<ConnectInfo<SocketAddr>>,
    session: Session,
    cookies: Cookies,
    Json(request): Json<SignInRequest>,
) -> Result<Response, ApiError> {
    let ctx = RequestContext::new();
    let caller = caller_context(&cookies, remote.map(|ConnectInfo(addr)| addr), request.return_url);

    let outcome = state
        .executor
        .sign_in(&ctx, &caller, request.command)
        .await
        .map_err(|error| ApiError::Account {
            form: AccountForm::SignIn,
            correlation_id: ctx.correlation_id.clone(),
            error,
        })?;

    start_cookie_session(&state, &session, &outcome.session).await?;
    Ok(signed_in_response(
        &cookies,
        outcome.basket,
        ActionResponse {
            correlation_id: outcome.correlation_id,
            identity: outcome.session.identity,
            redirect: outcome.redirect,
            basket_transferred: outcome.basket.moved_items(),
        },
    ))
}

async fn register(
    State(state): State<ServiceState>,
    remote: Option<ConnectInfo<SocketAddr>>,
    session: Session,
    cookies: Cookies,
    Json(request): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    let ctx = RequestContext::new();
    let caller = caller_context(&cookies, remote.map(|ConnectInfo(addr)| addr), request.return_url);

    let outcome = state
        .executor
        .register(&ctx, &caller, request.command)
        .await
        .map_err(|error| ApiError::Account {
            form: AccountForm::Register,
            correlation_id: ctx.correlation_id.clone(),
            error,
        })?;

    start_cookie_session(&state, &session, &outcome.session).await?;
    Ok(signed_in_response(
        &cookies,
        outcome.basket,
        ActionResponse {
            correlation_id: outcome.correlation_id,
            identity: outcome.profile.email,
            redirect: outcome.redirect,
            basket_transferred: outcome.basket.moved_items(),
        },
    ))
}

fn signed_in_response(
    cookies: &Cookies,
    basket: BasketHandoff,
    body: ActionResponse,
) -> Response {
    // A failed transfer keeps the cookie so the anonymous basket is not orphaned.
    if basket.released() {
        cookies.remove(Cookie::build((BASKET_COOKIE, "")).path("/").build());
    }
    (
        StatusCode::SEE_OTHER,
        [
            (LOCATION, body.redirect.clone()),
            (HeaderName::from_static(CORRELATION_HEADER), body.correlation_id.to_string()),
        ],
        Json(body),
    )
        .into_response()
}

async fn sign_out(State(state): State<ServiceState>, session: Session) -> Response {
    if let Ok(Some(account)) = session.get::<AccountSession>(ACCOUNT_SESSION_KEY).await {
        state.executor.sign_out(&account.token).await;
    }
    if let Err(err) = session.flush().await {
        warn!(error = %err, "Failed to clear session during sign-out");
    }
    (StatusCode::SEE_OTHER, [(LOCATION, DEFAULT_REDIRECT.to_string())]).into_response()
}

#[derive(Debug, Clone, Serialize)]
struct CurrentAccount {
    identity: String,
    established_at: chrono::DateTime<chrono::Utc>,
}

async fn current_account(
    State(state): State<ServiceState>,
    session: Session,
) -> Result<Json<CurrentAccount>, ApiError> {
    let account = signed_in_account(&state, &session)
        .await
        .ok_or_else(|| ApiError::unauthorized("not signed in"))?;

    Ok(Json(CurrentAccount {
        identity: account.identity,
        established_at: account.established_at,
    }))
}

#[derive(Debug, Clone, Serialize)]
struct BasketView {
    items: Vec<BasketItem>,
}

/// Signed-in identity, else the anonymous basket id from the cookie.
async fn basket_owner(
    state: &ServiceState,
    session: &Session,
    cookies: &Cookies,
) -> Option<String> {
    match signed_in_account(state, session).await {
        Some(account) => Some(account.identity),
        None => anonymous_basket_id(cookies),
    }
}

async fn view_basket(
    State(state): State<ServiceState>,
    session: Session,
    cookies: Cookies,
) -> Json<BasketView> {
    let items = match basket_owner(&state, &session, &cookies).await {
        Some(owner) => state.baskets.items(&owner).await,
        None => Vec::new(),
    };
    Json(BasketView { items })
}

async fn add_basket_item(
    State(state): State<ServiceState>,
    session: Session,
    cookies: Cookies,
    Json(item): Json<BasketItem>,
) -> Result<Json<BasketView>, ApiError> {
    if item.quantity == 0 {
        return Err(ApiError::unprocessable("quantity must be at least 1"));
    }

    let owner = match basket_owner(&state, &session, &cookies).await {
        Some(owner) => owner,
        None => {
            let anonymous_id = Uuid::new_v4().simple().to_string();
            cookies.add(
                Cookie::build((BASKET_COOKIE, anonymous_id.clone()))
                    .path("/")
                    .http_only(true)
                    .same_site(SameSite::Lax)
                    .secure(state.secure_cookies)
                    .build(),
            );
            anonymous_id
        }
    };

    state.baskets.add_item(&owner, item).await;
    Ok(Json(BasketView {
        items: state.baskets.items(&owner).await,
    }))
}

#[derive(Debug, Clone, Serialize)]
struct AssessmentTrailResponse {
    correlation_id: CorrelationId,
    items: Vec<TrailEntry>,
}

async fn list_assessments(
    Path(correlation_id): Path<String>,
    State(state): State<ServiceState>,
) -> Result<Json<AssessmentTrailResponse>, ApiError> {
    let correlation_id = CorrelationId::from(correlation_id);
    let items = state
        .executor
        .gate()
        .trail()
        .for_correlation(&correlation_id)
        .await;
    if items.is_empty() {
        return Err(ApiError::not_found(format!(
            "no assessments recorded for '{}'",
            correlation_id
        )));
    }

    Ok(Json(AssessmentTrailResponse {
        correlation_id,
        items,
    }))
}

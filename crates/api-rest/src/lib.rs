//! # API REST
//!
//! REST API for the patient intake wizard.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI documentation
//! - REST-specific concerns (JSON serialization, CORS, identity headers)
//!
//! Each wizard instance is a *session* addressed by a canonical UUID. Sessions live in memory
//! behind their own lock; the submit handler releases that lock while the document store is
//! being called. Sessions untouched for longer than the session TTL are evicted by a
//! background sweep.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{Path as AxumPath, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post, put},
    Router,
};
use intake_core::{
    Clock, ConfiguredStore, EmailAddress, FieldErrors, FieldName, Identity, IntakeConfig,
    IntakeError, IntakeWizard, NonEmptyText, PatientDraft, Prepared, RecordStore,
    StaticIdentity, StoreResult, SubmitStatus, WizardView,
};
use intake_uuid::ShardableUuid;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::CorsLayer;
use utoipa::{OpenApi, ToSchema};

/// Header carrying the signed-in user's identifier.
pub const USER_HEADER: &str = "x-intake-user";
/// Optional header carrying the signed-in user's email.
pub const EMAIL_HEADER: &str = "x-intake-email";

/// Idle time after which a session is evicted, overridable via `INTAKE_SESSION_TTL_SECS`.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);
pub const ENV_SESSION_TTL_SECS: &str = "INTAKE_SESSION_TTL_SECS";
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

type ApiError = (StatusCode, &'static str);
type Session = Arc<Mutex<IntakeWizard>>;

struct SessionEntry {
    wizard: Session,
    last_seen: Instant,
}

impl SessionEntry {
    fn new(wizard: IntakeWizard) -> Self {
        Self {
            wizard: Arc::new(Mutex::new(wizard)),
            last_seen: Instant::now(),
        }
    }
}

/// Application state for the REST API server
///
/// Shared by all handlers: the resolved configuration, the document store and the live
/// wizard sessions.
#[derive(Clone)]
pub struct AppState {
    config: Arc<IntakeConfig>,
    store: Arc<ConfiguredStore>,
    clock: Clock,
    session_ttl: Duration,
    sessions: Arc<RwLock<HashMap<ShardableUuid, SessionEntry>>>,
}

impl AppState {
    pub fn new(config: IntakeConfig, store: ConfiguredStore) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
            clock: Clock::System,
            session_ttl: DEFAULT_SESSION_TTL,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Builds the state with the store named by `config`.
    pub fn from_config(config: IntakeConfig) -> StoreResult<Self> {
        let store = ConfiguredStore::from_config(&config)?;
        Ok(Self::new(config, store))
    }

    /// Overrides the clock given to new sessions and the validate endpoint.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops sessions idle for longer than the session TTL and returns how many went.
    ///
    /// A session whose lock is currently held is kept.
    pub async fn evict_idle(&self) -> usize {
        let ttl = self.session_ttl;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let keep = entry.last_seen.elapsed() <= ttl || entry.wizard.try_lock().is_err();
            if !keep {
                tracing::info!("Evicted idle intake session {}", id);
            }
            keep
        });
        before - sessions.len()
    }

    /// Looks up a session and marks it as used.
    async fn session(&self, id: &str) -> Result<(ShardableUuid, Session), ApiError> {
        let id =
            ShardableUuid::parse(id).map_err(|_| (StatusCode::NOT_FOUND, "Session not found"))?;
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(&id)
            .ok_or((StatusCode::NOT_FOUND, "Session not found"))?;
        entry.last_seen = Instant::now();
        Ok((id, Arc::clone(&entry.wizard)))
    }
}

// ============================================================================
// DTOs
// ============================================================================

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ValidateReq {
    /// camelCase field name, e.g. `fullName`.
    pub field: String,
    pub value: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ValidateRes {
    pub field: String,
    pub valid: bool,
    pub message: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct SetFieldReq {
    pub value: String,
}

/// What a front-end needs to render one session.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    /// `step` or `confirmation`.
    pub view: String,
    pub step: u8,
    pub step_title: String,
    /// Field names rendered on the current step.
    pub fields: Vec<String>,
    #[schema(value_type = Object)]
    pub draft: PatientDraft,
    /// Errors for the fields on the current step.
    #[schema(value_type = Object)]
    pub errors: FieldErrors,
    /// Every field with a recorded error, on any step.
    pub failing_fields: Vec<String>,
    /// `idle`, `submitting`, `success` or `error`.
    pub submit_status: String,
    pub banner: Option<String>,
    pub document_id: Option<String>,
}

impl SessionSnapshot {
    fn new(id: ShardableUuid, wizard: &IntakeWizard) -> Self {
        let step = wizard.current_step();
        let (view, document_id) = match wizard.view() {
            WizardView::Step(_) => ("step", None),
            WizardView::Confirmation { document_id } => {
                ("confirmation", Some(document_id.to_string()))
            }
        };
        let submit_status = match wizard.submit_status() {
            SubmitStatus::Idle => "idle",
            SubmitStatus::Submitting => "submitting",
            SubmitStatus::Success { .. } => "success",
            SubmitStatus::Error { .. } => "error",
        };

        Self {
            session_id: id.to_string(),
            view: view.into(),
            step: step.number(),
            step_title: step.title().into(),
            fields: step.fields().iter().map(|f| f.as_str().to_string()).collect(),
            draft: wizard.draft().clone(),
            errors: wizard.visible_errors(),
            failing_fields: wizard
                .errors()
                .iter()
                .map(|(field, _)| field.as_str().to_string())
                .collect(),
            submit_status: submit_status.into(),
            banner: wizard.banner().map(str::to_string),
            document_id,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        validate,
        create_session,
        get_session,
        delete_session,
        set_field,
        next_step,
        previous_step,
        submit,
        start_over,
    ),
    components(schemas(
        HealthRes,
        ValidateReq,
        ValidateRes,
        SetFieldReq,
        SessionSnapshot,
    ))
)]
pub struct ApiDoc;

/// Builds the REST router over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/validate", post(validate))
        .route("/intake", post(create_session))
        .route("/intake/:id", get(get_session).delete(delete_session))
        .route("/intake/:id/fields/:field", put(set_field))
        .route("/intake/:id/next", post(next_step))
        .route("/intake/:id/previous", post(previous_step))
        .route("/intake/:id/submit", post(submit))
        .route("/intake/:id/start-over", post(start_over))
        .route("/api-docs/openapi.json", get(openapi))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Resolves configuration from the process environment.
///
/// Call after `dotenvy::dotenv()` so that `.env` values are visible.
pub fn config_from_env() -> intake_core::IntakeResult<IntakeConfig> {
    IntakeConfig::from_lookup(|key| std::env::var(key).ok())
}

/// Session TTL from `INTAKE_SESSION_TTL_SECS`, or [`DEFAULT_SESSION_TTL`] when unset.
///
/// # Errors
///
/// Returns an error if the variable is set but is not a whole number of seconds.
pub fn session_ttl_from_env() -> anyhow::Result<Duration> {
    match std::env::var(ENV_SESSION_TTL_SECS) {
        Ok(secs) if !secs.trim().is_empty() => {
            let secs: u64 = secs.trim().parse().map_err(|e| {
                anyhow::anyhow!("{} must be a number of seconds: {}", ENV_SESSION_TTL_SECS, e)
            })?;
            Ok(Duration::from_secs(secs))
        }
        _ => Ok(DEFAULT_SESSION_TTL),
    }
}

/// Binds `addr` and serves the REST API until the server stops.
///
/// Also starts the sweep that evicts idle sessions.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails while running.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            sweeper.evict_idle().await;
        }
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn intake_error(e: IntakeError) -> ApiError {
    match e {
        IntakeError::UnknownField(_) => (StatusCode::BAD_REQUEST, "Unknown field"),
        IntakeError::UnknownOption { .. } => (StatusCode::BAD_REQUEST, "Invalid option"),
        IntakeError::InvalidInput(_) | IntakeError::InvalidRecord { .. } => {
            (StatusCode::BAD_REQUEST, "Invalid input")
        }
        IntakeError::NoNextStep => (StatusCode::CONFLICT, "Already on the final step"),
        IntakeError::NotOnFinalStep(_) => (StatusCode::CONFLICT, "Not on the final step"),
        IntakeError::SubmissionInProgress => (StatusCode::CONFLICT, "Submission in progress"),
        IntakeError::NoSubmissionInFlight => (StatusCode::CONFLICT, "No submission in progress"),
        IntakeError::RegistrationComplete => (StatusCode::CONFLICT, "Registration complete"),
        IntakeError::NotCompleted => (StatusCode::CONFLICT, "Registration not complete"),
        IntakeError::Config(e) => {
            tracing::error!("Configuration error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

/// Identity from the request headers; a missing or blank user header means nobody is
/// signed in.
fn identity_from_headers(headers: &HeaderMap) -> Result<Option<Identity>, ApiError> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let Some(uid) = header(USER_HEADER).and_then(|uid| NonEmptyText::new(uid).ok()) else {
        return Ok(None);
    };

    let mut identity = Identity::new(uid);
    if let Some(email) = header(EMAIL_HEADER) {
        let email = EmailAddress::parse(email)
            .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid x-intake-email header"))?;
        identity = identity.with_email(email);
    }
    Ok(Some(identity))
}

// ============================================================================
// HANDLERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Intake REST API is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/validate",
    request_body = ValidateReq,
    responses(
        (status = 200, description = "Validation result", body = ValidateRes),
        (status = 400, description = "Unknown field")
    )
)]
/// Validate a single field value without touching any session
///
/// Uses the configured phone policy and today's date.
#[axum::debug_handler]
async fn validate(
    State(state): State<AppState>,
    Json(req): Json<ValidateReq>,
) -> Result<Json<ValidateRes>, ApiError> {
    let field: FieldName = req.field.parse().map_err(intake_error)?;
    let message = state
        .config
        .validator()
        .validate(field, &req.value, state.clock.today());

    Ok(Json(ValidateRes {
        field: field.as_str().to_string(),
        valid: message.is_none(),
        message,
    }))
}

#[utoipa::path(
    post,
    path = "/intake",
    responses(
        (status = 201, description = "Session created", body = SessionSnapshot)
    )
)]
/// Start a new registration
///
/// Creates a wizard session on step 1 with an empty draft.
#[axum::debug_handler]
async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionSnapshot>) {
    let id = ShardableUuid::new();
    let wizard = IntakeWizard::new(&state.config).with_clock(state.clock);
    let snapshot = SessionSnapshot::new(id, &wizard);

    state
        .sessions
        .write()
        .await
        .insert(id, SessionEntry::new(wizard));
    tracing::info!("Created intake session {}", id);

    (StatusCode::CREATED, Json(snapshot))
}

#[utoipa::path(
    get,
    path = "/intake/{id}",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Current session state", body = SessionSnapshot),
        (status = 404, description = "Session not found")
    )
)]
/// Read the current state of a session
#[axum::debug_handler]
async fn get_session(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let (id, session) = state.session(&id).await?;
    let wizard = session.lock().await;
    Ok(Json(SessionSnapshot::new(id, &wizard)))
}

#[utoipa::path(
    delete,
    path = "/intake/{id}",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 204, description = "Session discarded"),
        (status = 404, description = "Session not found")
    )
)]
/// Discard a session and its draft
#[axum::debug_handler]
async fn delete_session(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<StatusCode, ApiError> {
    let (id, _) = state.session(&id).await?;
    state.sessions.write().await.remove(&id);
    tracing::info!("Discarded intake session {}", id);
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/intake/{id}/fields/{field}",
    params(
        ("id" = String, Path, description = "Session id"),
        ("field" = String, Path, description = "camelCase field name")
    ),
    request_body = SetFieldReq,
    responses(
        (status = 200, description = "Field updated", body = SessionSnapshot),
        (status = 400, description = "Unknown field or option"),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Registration already complete")
    )
)]
/// Set one field of the draft
///
/// Clears any error recorded for the field. Setting `dob` also recomputes `age`.
#[axum::debug_handler]
async fn set_field(
    State(state): State<AppState>,
    AxumPath((id, field)): AxumPath<(String, String)>,
    Json(req): Json<SetFieldReq>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let (id, session) = state.session(&id).await?;
    let field: FieldName = field.parse().map_err(intake_error)?;

    let mut wizard = session.lock().await;
    wizard.set_field(field, req.value).map_err(intake_error)?;
    Ok(Json(SessionSnapshot::new(id, &wizard)))
}

#[utoipa::path(
    post,
    path = "/intake/{id}/next",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Step gate result; errors list every failing field", body = SessionSnapshot),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Already on the final step or registration complete")
    )
)]
/// Validate the current step and advance if it passes
#[axum::debug_handler]
async fn next_step(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let (id, session) = state.session(&id).await?;
    let mut wizard = session.lock().await;
    wizard.next().map_err(intake_error)?;
    Ok(Json(SessionSnapshot::new(id, &wizard)))
}

#[utoipa::path(
    post,
    path = "/intake/{id}/previous",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Moved back one step", body = SessionSnapshot),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Submission in progress or registration complete")
    )
)]
/// Go back one step without validating
#[axum::debug_handler]
async fn previous_step(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let (id, session) = state.session(&id).await?;
    let mut wizard = session.lock().await;
    wizard.previous().map_err(intake_error)?;
    Ok(Json(SessionSnapshot::new(id, &wizard)))
}

#[utoipa::path(
    post,
    path = "/intake/{id}/submit",
    params(
        ("id" = String, Path, description = "Session id"),
        ("x-intake-user" = Option<String>, Header, description = "Signed-in user id"),
        ("x-intake-email" = Option<String>, Header, description = "Signed-in user email")
    ),
    responses(
        (status = 200, description = "Submission result: confirmation view, blocking errors, or error banner", body = SessionSnapshot),
        (status = 400, description = "Malformed identity header"),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Not on the final step, already submitting, or complete")
    )
)]
/// Submit the registration to the document store
///
/// Revalidates every step first. A missing `x-intake-user` header is refused before the
/// store is called and reported with the same banner as a store failure.
#[axum::debug_handler]
async fn submit(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    headers: HeaderMap,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let identity = StaticIdentity::from(identity_from_headers(&headers)?);
    let (id, session) = state.session(&id).await?;

    let prepared = {
        let mut wizard = session.lock().await;
        wizard.prepare_submission(&identity).map_err(intake_error)?
    };

    if let Prepared::Ready(ticket) = prepared {
        // Detached so the store call resolves the session even if this request is dropped.
        let store = Arc::clone(&state.store);
        let pending = Arc::clone(&session);
        tokio::spawn(async move {
            let result = store
                .create_record(ticket.collection().as_str(), ticket.document())
                .await;
            let mut wizard = pending.lock().await;
            wizard.complete_submission(ticket, result)
        })
        .await
        .map_err(|e| {
            tracing::error!("Submission task failed: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        })?
        .map_err(intake_error)?;
    }

    let wizard = session.lock().await;
    Ok(Json(SessionSnapshot::new(id, &wizard)))
}

#[utoipa::path(
    post,
    path = "/intake/{id}/start-over",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Back on step 1 with an empty draft", body = SessionSnapshot),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Registration not complete")
    )
)]
/// Leave the confirmation view and start a new registration in the same session
#[axum::debug_handler]
async fn start_over(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let (id, session) = state.session(&id).await?;
    let mut wizard = session.lock().await;
    wizard.start_over().map_err(intake_error)?;
    Ok(Json(SessionSnapshot::new(id, &wizard)))
}

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::NaiveDate;
    use http_body_util::BodyExt;
    use intake_core::{FileRecordStore, StoreBackend};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn file_state(temp_dir: &TempDir) -> AppState {
        let config = IntakeConfig::new(
            StoreBackend::File {
                data_dir: temp_dir.path().to_path_buf(),
            },
            "patients",
            Default::default(),
        )
        .unwrap();
        AppState::from_config(config)
            .unwrap()
            .with_clock(Clock::Fixed(today()))
    }

    /// State whose HTTP store points at a closed port, so every store call fails.
    async fn unreachable_store_state() -> AppState {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = IntakeConfig::new(
            StoreBackend::Http {
                base_url: format!("http://{addr}"),
                api_key: None,
                timeout: std::time::Duration::from_secs(2),
            },
            "patients",
            Default::default(),
        )
        .unwrap();
        AppState::from_config(config)
            .unwrap()
            .with_clock(Clock::Fixed(today()))
    }

    /// State whose HTTP store accepts connections but never answers. The listener must be
    /// kept alive for as long as the store should hang.
    async fn silent_store_state() -> (AppState, tokio::net::TcpListener) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let config = IntakeConfig::new(
            StoreBackend::Http {
                base_url: format!("http://{addr}"),
                api_key: None,
                timeout: Duration::from_secs(1),
            },
            "patients",
            Default::default(),
        )
        .unwrap();
        let state = AppState::from_config(config)
            .unwrap()
            .with_clock(Clock::Fixed(today()));
        (state, listener)
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
        headers: &[(&str, &str)],
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    async fn create(app: &Router) -> String {
        let (status, body) = send(app, "POST", "/intake", None, &[]).await;
        assert_eq!(status, StatusCode::CREATED);
        body["sessionId"].as_str().unwrap().to_string()
    }

    async fn put_field(
        app: &Router,
        id: &str,
        field: &str,
        value: &str,
    ) -> (StatusCode, serde_json::Value) {
        send(
            app,
            "PUT",
            &format!("/intake/{id}/fields/{field}"),
            Some(serde_json::json!({ "value": value })),
            &[],
        )
        .await
    }

    /// Fills every required field and walks to step 5.
    async fn fill_to_final_step(app: &Router, id: &str) {
        let values = [
            ("fullName", "Asha Rao"),
            ("gender", "female"),
            ("dob", "1990-05-17"),
            ("phone", "9123456789"),
            ("email", "asha@example.in"),
            ("address", "12 MG Road, Indiranagar"),
            ("city", "Bengaluru"),
            ("state", "Karnataka"),
            ("zip", "560038"),
            ("country", "India"),
            ("bloodGroup", "O+"),
            ("emergencyName", "Ravi Rao"),
            ("emergencyRelationship", "Brother"),
            ("emergencyPhone", "8123456789"),
        ];
        for (field, value) in values {
            let (status, _) = put_field(app, id, field, value).await;
            assert_eq!(status, StatusCode::OK, "setting {field}");
        }
        for expected in 2..=5 {
            let (status, body) = send(app, "POST", &format!("/intake/{id}/next"), None, &[]).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["step"], expected);
        }
    }

    #[tokio::test]
    async fn health_reports_alive() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(file_state(&temp_dir));

        let (status, body) = send(&app, "GET", "/health", None, &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn validate_endpoint_applies_field_rules() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(file_state(&temp_dir));

        let (status, body) = send(
            &app,
            "POST",
            "/validate",
            Some(serde_json::json!({ "field": "fullName", "value": "Jo" })),
            &[],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], false);
        assert_eq!(body["message"], "Full name must be at least 4 characters");

        let (_, body) = send(
            &app,
            "POST",
            "/validate",
            Some(serde_json::json!({ "field": "phone", "value": "9123456789" })),
            &[],
        )
        .await;
        assert_eq!(body["valid"], true);
        assert!(body["message"].is_null());

        let (status, _) = send(
            &app,
            "POST",
            "/validate",
            Some(serde_json::json!({ "field": "shoeSize", "value": "9" })),
            &[],
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn next_reports_every_failing_field_on_the_step() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(file_state(&temp_dir));
        let id = create(&app).await;

        put_field(&app, &id, "fullName", "Jo").await;
        let (status, body) = send(&app, "POST", &format!("/intake/{id}/next"), None, &[]).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["step"], 1);
        assert_eq!(
            body["errors"]["fullName"],
            "Full name must be at least 4 characters"
        );
        assert_eq!(body["errors"]["gender"], "Gender is required");
        assert_eq!(body["errors"]["dob"], "Date of birth is required");

        let (_, body) = put_field(&app, &id, "fullName", "J").await;
        assert!(body["errors"].get("fullName").is_none());
        assert!(body["errors"].get("gender").is_some());
    }

    #[tokio::test]
    async fn setting_dob_derives_age() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(file_state(&temp_dir));
        let id = create(&app).await;

        let (_, body) = put_field(&app, &id, "dob", "1990-10-19").await;
        assert_eq!(body["draft"]["age"], "36");
    }

    #[tokio::test]
    async fn bad_field_and_option_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(file_state(&temp_dir));
        let id = create(&app).await;

        let (status, _) = put_field(&app, &id, "shoeSize", "9").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = put_field(&app, &id, "gender", "robot").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(file_state(&temp_dir));

        let missing = ShardableUuid::new().to_string();
        let (status, _) = send(&app, "GET", &format!("/intake/{missing}"), None, &[]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, "GET", "/intake/not-a-uuid", None, &[]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_discards_the_session() {
        let temp_dir = TempDir::new().unwrap();
        let state = file_state(&temp_dir);
        let app = router(state.clone());
        let id = create(&app).await;
        assert_eq!(state.session_count().await, 1);

        let (status, _) = send(&app, "DELETE", &format!("/intake/{id}"), None, &[]).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(state.session_count().await, 0);
    }

    #[tokio::test]
    async fn submit_before_final_step_conflicts() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(file_state(&temp_dir));
        let id = create(&app).await;

        let (status, _) = send(
            &app,
            "POST",
            &format!("/intake/{id}/submit"),
            None,
            &[(USER_HEADER, "user-123")],
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn happy_path_stores_record_and_shows_confirmation() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(file_state(&temp_dir));
        let id = create(&app).await;
        fill_to_final_step(&app, &id).await;

        let (status, body) = send(
            &app,
            "POST",
            &format!("/intake/{id}/submit"),
            None,
            &[(USER_HEADER, "user-123"), (EMAIL_HEADER, "clerk@example.in")],
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["view"], "confirmation");
        assert_eq!(body["submitStatus"], "success");
        assert_eq!(body["draft"]["fullName"], "");
        let document_id = body["documentId"].as_str().unwrap().to_string();

        let stored = FileRecordStore::new(temp_dir.path()).list("patients").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id.as_str(), document_id);
        assert_eq!(stored[0].document.created_by, "user-123");

        let (status, _) = put_field(&app, &id, "fullName", "Someone Else").await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) =
            send(&app, "POST", &format!("/intake/{id}/start-over"), None, &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["view"], "step");
        assert_eq!(body["step"], 1);
        assert_eq!(body["submitStatus"], "idle");
    }

    #[tokio::test]
    async fn submit_without_user_shows_banner_and_keeps_data() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(file_state(&temp_dir));
        let id = create(&app).await;
        fill_to_final_step(&app, &id).await;

        let (status, body) =
            send(&app, "POST", &format!("/intake/{id}/submit"), None, &[]).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["submitStatus"], "error");
        assert_eq!(
            body["banner"],
            "Failed to register patient. Please try again."
        );
        assert_eq!(body["step"], 5);
        assert_eq!(body["draft"]["fullName"], "Asha Rao");
        assert!(FileRecordStore::new(temp_dir.path())
            .list("patients")
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn store_failure_shows_banner_and_stays_on_final_step() {
        let app = router(unreachable_store_state().await);
        let id = create(&app).await;
        fill_to_final_step(&app, &id).await;

        let (status, body) = send(
            &app,
            "POST",
            &format!("/intake/{id}/submit"),
            None,
            &[(USER_HEADER, "user-123")],
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["view"], "step");
        assert_eq!(body["step"], 5);
        assert_eq!(body["submitStatus"], "error");
        assert_eq!(body["draft"]["zip"], "560038");
    }

    #[tokio::test]
    async fn malformed_email_header_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(file_state(&temp_dir));
        let id = create(&app).await;
        fill_to_final_step(&app, &id).await;

        let (status, _) = send(
            &app,
            "POST",
            &format!("/intake/{id}/submit"),
            None,
            &[(USER_HEADER, "user-123"), (EMAIL_HEADER, "not-an-email")],
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn openapi_document_lists_intake_paths() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(file_state(&temp_dir));

        let (status, body) = send(&app, "GET", "/api-docs/openapi.json", None, &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"].get("/intake/{id}/submit").is_some());
        assert!(body["paths"].get("/validate").is_some());
    }

    #[tokio::test]
    async fn dropped_submit_request_still_resolves_the_session() {
        let (state, _listener) = silent_store_state().await;
        let app = router(state);
        let id = create(&app).await;
        fill_to_final_step(&app, &id).await;

        let request = {
            let app = app.clone();
            let uri = format!("/intake/{id}/submit");
            tokio::spawn(async move {
                send(&app, "POST", &uri, None, &[(USER_HEADER, "user-123")]).await
            })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;

        let (_, body) = send(&app, "GET", &format!("/intake/{id}"), None, &[]).await;
        assert_eq!(body["submitStatus"], "submitting");
        request.abort();

        let deadline = Instant::now() + Duration::from_secs(10);
        let body = loop {
            let (_, body) = send(&app, "GET", &format!("/intake/{id}"), None, &[]).await;
            if body["submitStatus"] != "submitting" || Instant::now() > deadline {
                break body;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        };
        assert_eq!(body["submitStatus"], "error");
        assert_eq!(body["step"], 5);
        assert_eq!(body["draft"]["fullName"], "Asha Rao");

        let (status, body) =
            send(&app, "POST", &format!("/intake/{id}/previous"), None, &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["step"], 4);
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted() {
        let temp_dir = TempDir::new().unwrap();
        let state = file_state(&temp_dir).with_session_ttl(Duration::from_millis(50));
        let app = router(state.clone());
        let idle = create(&app).await;
        let active = create(&app).await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        let (status, _) = send(&app, "GET", &format!("/intake/{active}"), None, &[]).await;
        assert_eq!(status, StatusCode::OK);

        assert_eq!(state.evict_idle().await, 1);
        assert_eq!(state.session_count().await, 1);

        let (status, _) = send(&app, "GET", &format!("/intake/{idle}"), None, &[]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "GET", &format!("/intake/{active}"), None, &[]).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn fresh_sessions_survive_a_sweep() {
        let temp_dir = TempDir::new().unwrap();
        let state = file_state(&temp_dir);
        let app = router(state.clone());
        create(&app).await;

        assert_eq!(state.evict_idle().await, 0);
        assert_eq!(state.session_count().await, 1);
    }
}

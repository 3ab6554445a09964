//! REST API: auth, student and teacher routes

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        DefaultBodyLimit, Path, State,
    },
    http::{header, HeaderValue, Method, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use super::cookies::CookiePolicy;
use super::middleware::{require_roles, require_session, ClientIp, RoleGate};
use super::rate_limit::{limit_auth_requests, AuthRateLimiter};
use crate::auth::{
    error::failure_body, AccessGate, AuthError, AuthResponse, AuthService, ChangePasswordRequest,
    CredentialStore, CredentialsRequest, Database, Identity, MessageResponse, Role,
};
use crate::config::{AuthConfig, ConfigError, RateLimitConfig, ServerConfig};
use crate::preferences::{PreferenceError, PreferenceStore, PreferencesInput, StudentPreferences};
use crate::{PortalError, Result};

/// Request bodies larger than this are rejected with 413
pub const MAX_BODY_BYTES: usize = 10 * 1024;

const STUDENT_ONLY: &[Role] = &[Role::Student];
const TEACHER_ONLY: &[Role] = &[Role::Teacher];

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub gate: AccessGate,
    pub preferences: PreferenceStore,
    pub cookies: CookiePolicy,
    pub limiter: AuthRateLimiter,
}

impl AppState {
    pub fn new(db: Database, config: &AuthConfig, rate_limit: RateLimitConfig) -> Self {
        let store = CredentialStore::new(db.clone());
        let auth = AuthService::from_config(store.clone(), config);
        let gate = AccessGate::new(auth.sessions().clone(), store);

        Self {
            auth,
            gate,
            preferences: PreferenceStore::new(db),
            cookies: CookiePolicy {
                ttl: config.cookie_ttl,
                secure: config.secure_cookies,
            },
            limiter: AuthRateLimiter::new(rate_limit),
        }
    }
}

/// Build the full application router
pub fn router(state: AppState, frontend_url: &str) -> Result<Router> {
    let origin = HeaderValue::from_str(frontend_url)
        .map_err(|_| ConfigError::Invalid(format!("invalid FRONTEND_URL: {frontend_url}")))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Ok(Router::new()
        .nest("/api/auth", auth_routes(&state))
        .nest("/api/students", student_routes(&state))
        .nest("/api/teachers", teacher_routes(&state))
        .route("/health", get(health))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(cors)
        .with_state(state))
}

fn auth_routes(state: &AppState) -> Router<AppState> {
    let limited = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route_layer(from_fn_with_state(state.limiter.clone(), limit_auth_requests));

    let authenticated = Router::new()
        .route("/change-password", post(change_password))
        .route("/me", get(me))
        .route_layer(from_fn_with_state(state.clone(), require_session));

    Router::new()
        .merge(limited)
        .merge(authenticated)
        .route("/logout", get(logout))
}

fn student_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/preferences", get(my_preferences).post(save_preferences))
        .route_layer(from_fn_with_state(RoleGate::new(STUDENT_ONLY), require_roles))
        .route_layer(from_fn_with_state(state.clone(), require_session))
}

fn teacher_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/students/{student_id}/preferences", get(student_preferences))
        .route_layer(from_fn_with_state(RoleGate::new(TEACHER_ONLY), require_roles))
        .route_layer(from_fn_with_state(state.clone(), require_session))
}

fn bad_body(rejection: JsonRejection) -> AuthError {
    log::debug!("Rejected auth request body: {}", rejection);
    AuthError::InvalidInput("Invalid request body".to_string())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn not_found() -> Response {
    failure_body(StatusCode::NOT_FOUND, "Route not found".to_string())
}

/// POST /api/auth/register
async fn register(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    body: std::result::Result<Json<CredentialsRequest>, JsonRejection>,
) -> std::result::Result<Response, AuthError> {
    let Json(req) = body.map_err(bad_body)?;
    let session = state
        .auth
        .register(
            req.username.as_deref().unwrap_or_default(),
            req.password.as_deref().unwrap_or_default(),
            &ip,
        )
        .await?;

    let cookie = state.cookies.session(&session.token);
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse::success(session)),
    )
        .into_response())
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    body: std::result::Result<Json<CredentialsRequest>, JsonRejection>,
) -> std::result::Result<Response, AuthError> {
    let Json(req) = body.map_err(bad_body)?;
    let session = state
        .auth
        .login(
            req.username.as_deref().unwrap_or_default(),
            req.password.as_deref().unwrap_or_default(),
            &ip,
        )
        .await?;

    let cookie = state.cookies.session(&session.token);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse::success(session)),
    )
        .into_response())
}

/// GET /api/auth/logout
async fn logout(State(state): State<AppState>) -> Response {
    (
        [(header::SET_COOKIE, state.cookies.logged_out())],
        Json(MessageResponse::success("User logged out successfully")),
    )
        .into_response()
}

/// POST /api/auth/change-password
async fn change_password(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ClientIp(ip): ClientIp,
    body: std::result::Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> std::result::Result<Response, AuthError> {
    let Json(req) = body.map_err(bad_body)?;
    state
        .auth
        .change_password(
            &identity,
            req.current_password.as_deref().unwrap_or_default(),
            req.new_password.as_deref().unwrap_or_default(),
            req.confirm_new_password.as_deref().unwrap_or_default(),
            &ip,
        )
        .await?;

    Ok((
        [(header::SET_COOKIE, state.cookies.logged_out())],
        Json(MessageResponse::success(
            "Password changed successfully. Please log in again with your new password.",
        )),
    )
        .into_response())
}

/// GET /api/auth/me
async fn me(Extension(identity): Extension<Identity>) -> Json<serde_json::Value> {
    Json(json!({ "status": "success", "data": { "user": identity } }))
}

/// GET /api/students/preferences
async fn my_preferences(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> std::result::Result<Json<serde_json::Value>, PreferenceError> {
    let preferences = state.preferences.get(identity.id)?.unwrap_or_default();
    Ok(Json(json!({ "status": "success", "data": preferences })))
}

/// POST /api/students/preferences
async fn save_preferences(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    body: std::result::Result<Json<PreferencesInput>, JsonRejection>,
) -> std::result::Result<Json<serde_json::Value>, PreferenceError> {
    let Json(input) = body.map_err(|e| {
        log::debug!("Rejected preferences body from user {}: {}", identity.id, e);
        PreferenceError::Invalid("Invalid data format for preferences".to_string())
    })?;

    let saved = state.preferences.upsert(identity.id, &input)?;
    log::info!(
        "Preferences saved for student {} (ID: {})",
        identity.username,
        identity.id
    );
    Ok(Json(json!({
        "status": "success",
        "message": "Preferences saved successfully",
        "data": saved,
    })))
}

/// GET /api/teachers/dashboard
async fn dashboard(
    State(state): State<AppState>,
) -> std::result::Result<Json<serde_json::Value>, PreferenceError> {
    let students = state.preferences.roster()?;
    Ok(Json(json!({
        "status": "success",
        "results": students.len(),
        "data": { "students": students },
    })))
}

/// GET /api/teachers/students/{student_id}/preferences
async fn student_preferences(
    State(state): State<AppState>,
    student_id: std::result::Result<Path<i64>, PathRejection>,
) -> std::result::Result<Json<serde_json::Value>, PreferenceError> {
    let Path(student_id) = student_id
        .map_err(|_| PreferenceError::Invalid("Invalid student ID format".to_string()))?;

    match state.preferences.for_student(student_id)? {
        Some(preferences) => Ok(Json(json!({ "status": "success", "data": preferences }))),
        None => Ok(Json(json!({
            "status": "success",
            "message": "No preferences set by this student yet.",
            "data": StudentPreferences::default(),
        }))),
    }
}

/// Owns the listener and the background limiter sweep
pub struct ApiServer {
    config: ServerConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    pub async fn start(&self) -> Result<()> {
        let app = router(self.state.clone(), &self.config.frontend_url)?;
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("invalid listen address: {e}")))?;
        let listener = TcpListener::bind(addr).await?;

        let limiter = self.state.limiter.clone();
        let sweep_every = self.config.auth_rate_limit.window.max(Duration::from_secs(60));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_every);
            loop {
                interval.tick().await;
                limiter.prune();
            }
        });

        log::info!("Server is running on http://{}", addr);
        log::info!("Accepting browser requests from {}", self.config.frontend_url);

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(PortalError::Io)?;

        log::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown signal received");
}


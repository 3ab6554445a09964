//! HTTP middleware: session verification, role gating, client address

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{request::Parts, Extensions, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;
use std::net::SocketAddr;

use super::api::AppState;
use super::cookies::session_token;
use crate::auth::{AccessGate, AuthError, Identity, Role, UnauthenticatedReason};

/// Best-effort client address used in security logs and request limiting
pub fn client_ip(extensions: &Extensions, headers: &HeaderMap) -> String {
    if let Some(ConnectInfo(addr)) = extensions.get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Extractor wrapper around [`client_ip`]
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip(&parts.extensions, &parts.headers)))
    }
}

/// Resolve the session and attach the caller's [`Identity`] to the request
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let origin = client_ip(request.extensions(), request.headers());
    let token = session_token(request.headers());

    let identity = state.gate.authenticate(token.as_deref(), &origin)?;
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

/// Roles admitted past a [`require_roles`] layer
#[derive(Debug, Clone, Copy)]
pub struct RoleGate {
    allowed: &'static [Role],
}

impl RoleGate {
    pub const fn new(allowed: &'static [Role]) -> Self {
        Self { allowed }
    }
}

/// Must sit inside [`require_session`]
pub async fn require_roles(
    State(roles): State<RoleGate>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let origin = client_ip(request.extensions(), request.headers());
    let identity = request
        .extensions()
        .get::<Identity>()
        .ok_or(AuthError::Unauthenticated(UnauthenticatedReason::Missing))?;

    AccessGate::authorize(identity, roles.allowed, &origin)?;
    Ok(next.run(request).await)
}

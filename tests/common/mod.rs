#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use prefs_portal::{
    auth::{Database, HashCost, Role},
    config::{AuthConfig, RateLimitConfig},
    servers::{router, AppState},
};

pub const SECRET: &str = "integration-test-secret-that-is-long-enough";
pub const FRONTEND: &str = "http://localhost:5173";
pub const STRONG_PASSWORD: &str = "Str0ng!Pass";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub fn auth_config() -> AuthConfig {
    let mut config = AuthConfig::new(SECRET).expect("valid secret");
    config.hash_cost = HashCost::minimal();
    config
}

pub fn spawn_app() -> TestApp {
    spawn_app_with_limit(RateLimitConfig {
        max_requests: 1_000,
        window: std::time::Duration::from_secs(900),
    })
}

pub fn spawn_app_with_limit(limit: RateLimitConfig) -> TestApp {
    let db = Database::in_memory().expect("in-memory database");
    let state = AppState::new(db, &auth_config(), limit);
    let router = router(state.clone(), FRONTEND).expect("router");
    TestApp { router, state }
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Reply {
    pub fn message(&self) -> &str {
        self.body["message"].as_str().unwrap_or_default()
    }

    /// `jwt=<value>` pair from the Set-Cookie header, ready to send back
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string)
    }

    pub fn set_cookie(&self) -> &str {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Reply {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible router");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        Reply {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Reply {
        let mut builder = Request::get(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post(&self, uri: &str, body: Value, cookie: Option<&str>) -> Reply {
        let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn register(&self, username: &str, password: &str) -> Reply {
        self.post(
            "/api/auth/register",
            serde_json::json!({ "username": username, "password": password }),
            None,
        )
        .await
    }

    pub async fn login(&self, username: &str, password: &str) -> Reply {
        self.post(
            "/api/auth/login",
            serde_json::json!({ "username": username, "password": password }),
            None,
        )
        .await
    }

    /// Register a student and return its session cookie
    pub async fn student(&self, username: &str) -> String {
        let reply = self.register(username, STRONG_PASSWORD).await;
        assert_eq!(reply.status, StatusCode::CREATED, "{:?}", reply.body);
        reply.session_cookie().expect("session cookie")
    }

    /// Provision a teacher out of band and log it in
    pub async fn teacher(&self, username: &str) -> String {
        self.state
            .auth
            .provision(username, STRONG_PASSWORD, Role::Teacher)
            .await
            .expect("teacher provisioned");
        let reply = self.login(username, STRONG_PASSWORD).await;
        assert_eq!(reply.status, StatusCode::OK, "{:?}", reply.body);
        reply.session_cookie().expect("session cookie")
    }
}

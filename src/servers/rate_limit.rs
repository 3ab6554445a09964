//! Fixed-window request limiter for the register/login endpoints

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;

use super::middleware::client_ip;
use crate::auth::error::failure_body;
use crate::config::RateLimitConfig;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    requests: u32,
}

/// Per-IP request counter. Lives in the HTTP layer; the auth core knows
/// nothing about it.
#[derive(Debug, Clone)]
pub struct AuthRateLimiter {
    windows: Arc<DashMap<String, Window>>,
    config: RateLimitConfig,
}

impl AuthRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            config,
        }
    }

    /// Count a request from `key`; false once the window's budget is spent
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut window = self.windows.entry(key.to_string()).or_insert(Window {
            started: now,
            requests: 0,
        });

        if now.saturating_duration_since(window.started) >= self.config.window {
            window.started = now;
            window.requests = 0;
        }

        if window.requests >= self.config.max_requests {
            return false;
        }
        window.requests += 1;
        true
    }

    /// Drop windows that have fully elapsed
    pub fn prune(&self) {
        let now = Instant::now();
        let window = self.config.window;
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < window);
    }

    pub fn tracked(&self) -> usize {
        self.windows.len()
    }

    pub fn rejection_message(&self) -> String {
        format!(
            "Too many requests from this IP, please try again after {} minutes",
            self.config.window_minutes()
        )
    }
}

pub async fn limit_auth_requests(
    State(limiter): State<AuthRateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(request.extensions(), request.headers());
    if !limiter.check(&ip) {
        log::warn!(
            "SECURITY: Auth request limit exceeded for IP: {} on {}",
            ip,
            request.uri().path()
        );
        return failure_body(StatusCode::TOO_MANY_REQUESTS, limiter.rejection_message());
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn limiter(max: u32, secs: u64) -> AuthRateLimiter {
        AuthRateLimiter::new(RateLimitConfig {
            max_requests: max,
            window: Duration::from_secs(secs),
        })
    }

    #[test]
    fn test_budget_per_key() {
        let limiter = limiter(3, 60);
        let now = Instant::now();
        for _ in 0..3 {
            assert!(limiter.check_at("1.1.1.1", now));
        }
        assert!(!limiter.check_at("1.1.1.1", now));
        // other clients are unaffected
        assert!(limiter.check_at("2.2.2.2", now));
    }

    #[test]
    fn test_window_resets() {
        let limiter = limiter(1, 60);
        let start = Instant::now();
        assert!(limiter.check_at("ip", start));
        assert!(!limiter.check_at("ip", start + Duration::from_secs(59)));
        assert!(limiter.check_at("ip", start + Duration::from_secs(60)));
    }

    #[test]
    fn test_prune_keeps_live_windows() {
        let live = limiter(5, 3600);
        live.check("a");
        live.check("b");
        live.prune();
        assert_eq!(live.tracked(), 2);

        let expired = limiter(5, 0);
        expired.check("a");
        expired.prune();
        assert_eq!(expired.tracked(), 0);
    }

    #[test]
    fn test_rejection_message_follows_window() {
        assert_eq!(
            limiter(10, 900).rejection_message(),
            "Too many requests from this IP, please try again after 15 minutes"
        );
        assert!(limiter(10, 3600)
            .rejection_message()
            .ends_with("after 60 minutes"));
        assert!(limiter(10, 30).rejection_message().ends_with("after 1 minutes"));
    }
}

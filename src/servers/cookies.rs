//! Session cookie formatting and token extraction

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, Utc};

use crate::auth::LOGGED_OUT_SENTINEL;

pub const SESSION_COOKIE: &str = "jwt";

/// How long the logout sentinel lives in the browser
pub const LOGOUT_COOKIE_TTL_SECS: i64 = 10;

/// Attributes applied to every session cookie
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    pub ttl: Duration,
    pub secure: bool,
}

impl CookiePolicy {
    /// `Set-Cookie` value carrying a fresh session token
    pub fn session(&self, token: &str) -> String {
        self.build(token, self.ttl, Utc::now())
    }

    /// `Set-Cookie` value that overwrites the session with the logout sentinel
    pub fn logged_out(&self) -> String {
        self.build(
            LOGGED_OUT_SENTINEL,
            Duration::seconds(LOGOUT_COOKIE_TTL_SECS),
            Utc::now(),
        )
    }

    fn build(&self, value: &str, ttl: Duration, now: DateTime<Utc>) -> String {
        let expires = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut cookie = format!(
            "{SESSION_COOKIE}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}; Expires={}",
            ttl.num_seconds().max(0),
            expires.format("%a, %d %b %Y %H:%M:%S GMT")
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Session token from the `jwt` cookie, falling back to a bearer header
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, SESSION_COOKIE).or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
    })
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
}

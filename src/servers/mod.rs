// HTTP boundary: routing, cookies, request limiting and auth middleware
pub mod api;
pub mod cookies;
pub mod middleware;
pub mod rate_limit;

pub use api::{router, ApiServer, AppState};
pub use cookies::{CookiePolicy, SESSION_COOKIE};
pub use rate_limit::AuthRateLimiter;

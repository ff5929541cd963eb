pub mod auth;
pub mod rate_limit;

pub use auth::{require_auth, AuthUser, Claims};
pub use rate_limit::rate_limit_middleware;

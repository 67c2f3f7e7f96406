//! Access-token issuance and lookup.
//!
//! Tokens are opaque: 32 random bytes, URL-safe base64 on the wire, and
//! only the SHA-256 hex digest at rest.

pub mod queries;
pub mod tokens;

use chrono::Duration;
use thiserror::Error;

/// Errors from token issuance and lookup.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid access token")]
    TokenNotFound,

    #[error("access token expired")]
    TokenExpired,

    #[error("no user found for employee id {0:?}")]
    UnknownEmployeeId(String),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Lifetime of a newly issued access token.
///
/// Extended mode (local development) stretches the 30 minutes by a
/// factor of 100 so sessions survive a work day.
pub fn access_token_lifetime(extended: bool) -> Duration {
    let base = Duration::minutes(30);
    if extended { base * 100 } else { base }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifetime_is_30_minutes() {
        assert_eq!(Duration::minutes(30), access_token_lifetime(false));
    }

    #[test]
    fn extended_lifetime_is_100x() {
        assert_eq!(Duration::minutes(3000), access_token_lifetime(true));
    }
}

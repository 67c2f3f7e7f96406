//! Opaque token generation, hashing, and authenticated lookup.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgConnection;

use super::{AuthError, queries};
use crate::models::User;

/// Raw token entropy in bytes. Encodes to 43 base64 characters.
pub const TOKEN_BYTES: usize = 32;

/// Generates a new random access token (URL-safe base64, unpadded).
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hashes a raw token to its at-rest form (SHA-256, lowercase hex).
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Issues a new access token for the user matching `employee_id`.
///
/// Stores only the hash; returns the raw token exactly once.
pub async fn issue_token(
    conn: &mut PgConnection,
    employee_id: &str,
    lifetime: Duration,
) -> Result<String, AuthError> {
    let user = queries::find_user_by_employee_id(conn, employee_id)
        .await?
        .ok_or_else(|| AuthError::UnknownEmployeeId(employee_id.to_string()))?;

    let token = generate_token();
    let expires_at = Utc::now() + lifetime;
    queries::create_access_token(conn, user.id, &hash_token(&token), expires_at).await?;

    Ok(token)
}

/// Resolves a raw token to its user.
///
/// Fails when the token is unknown, expired (strictly by `expires_at`),
/// or its user row is gone.
pub async fn find_user_by_token(conn: &mut PgConnection, token: &str) -> Result<User, AuthError> {
    let record = queries::find_access_token_by_hash(conn, &hash_token(token))
        .await?
        .ok_or(AuthError::TokenNotFound)?;

    if record.expires_at <= Utc::now() {
        return Err(AuthError::TokenExpired);
    }

    queries::get_user(conn, record.user_id)
        .await?
        .ok_or(AuthError::TokenNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_43_chars() {
        let token = generate_token();
        assert_eq!(43, token.len());
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn generated_tokens_are_unique() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn hash_is_deterministic_hex() {
        let hash = hash_token("abc123");
        assert_eq!(hash, hash_token("abc123"));
        assert_eq!(64, hash.len());
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(
            "6ca13d52ca70c883e0f0bb101e425a89e8624de51db2d2392593af6a84118090",
            hash
        );
    }

    #[test]
    fn hash_does_not_leak_token() {
        let token = generate_token();
        let hash = hash_token(&token);
        assert_ne!(token, hash);
        assert!(!hash.contains(&token));
        assert!(!token.contains(&hash));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An opaque API access token, stored hashed.
///
/// The raw token value never touches the database; only its SHA-256 hex
/// digest is kept. Expiry is enforced at lookup time, not by a sweeper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccessToken {
    pub id: i64,
    pub user_id: i64,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

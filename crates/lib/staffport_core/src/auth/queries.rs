//! Database queries for users and access tokens.
//!
//! Every function takes `&mut PgConnection` so callers decide the
//! execution context; the HTTP layer passes its per-request transaction.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::models::{AccessToken, NewUser, User};

const USER_COLUMNS: &str = "id, employee_id, first_name, last_name, display_name, username, \
     email, active, locked, last_login_at, created_at, updated_at";

/// Provisions a new user.
pub async fn create_user(conn: &mut PgConnection, input: NewUser) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (employee_id, first_name, last_name, display_name, username, email) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
    ))
    .bind(input.employee_id)
    .bind(input.first_name)
    .bind(input.last_name)
    .bind(input.display_name)
    .bind(input.username)
    .bind(input.email)
    .fetch_one(conn)
    .await
}

/// Fetches a user by primary key.
pub async fn get_user(conn: &mut PgConnection, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(conn)
        .await
}

/// Fetches a user by the employee id asserted by the identity provider.
pub async fn find_user_by_employee_id(
    conn: &mut PgConnection,
    employee_id: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE employee_id = $1"
    ))
    .bind(employee_id)
    .fetch_optional(conn)
    .await
}

/// Lists users eligible for notification email (active and not locked).
pub async fn list_active_users(conn: &mut PgConnection) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE active AND NOT locked ORDER BY id"
    ))
    .fetch_all(conn)
    .await
}

/// Stamps the user's last successful login.
pub async fn update_last_login(conn: &mut PgConnection, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET last_login_at = now(), updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Stores a new access token hash for the user.
pub async fn create_access_token(
    conn: &mut PgConnection,
    user_id: i64,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<AccessToken, sqlx::Error> {
    sqlx::query_as::<_, AccessToken>(
        "INSERT INTO access_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, $3) \
         RETURNING id, user_id, token_hash, created_at, expires_at",
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .fetch_one(conn)
    .await
}

/// Looks up an access token by its at-rest hash. Expiry is the caller's
/// concern; revocation is deletion of the row.
pub async fn find_access_token_by_hash(
    conn: &mut PgConnection,
    token_hash: &str,
) -> Result<Option<AccessToken>, sqlx::Error> {
    sqlx::query_as::<_, AccessToken>(
        "SELECT id, user_id, token_hash, created_at, expires_at FROM access_tokens \
         WHERE token_hash = $1",
    )
    .bind(token_hash)
    .fetch_optional(conn)
    .await
}

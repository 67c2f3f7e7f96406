//! Per-user record of transactional email, used to audit delivery and
//! to rate-limit repeats of the same template.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

/// One sent (or at least handed-off) message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EmailLog {
    pub id: i64,
    pub user_id: i64,
    pub template: String,
    pub created_at: DateTime<Utc>,
}

/// Records that `template` was sent to the user. Template names are
/// stored with hyphens regardless of how the caller spells them.
pub async fn create_email_log(
    conn: &mut PgConnection,
    user_id: i64,
    template: &str,
) -> Result<EmailLog, sqlx::Error> {
    sqlx::query_as::<_, EmailLog>(
        "INSERT INTO email_logs (user_id, template) VALUES ($1, $2) \
         RETURNING id, user_id, template, created_at",
    )
    .bind(user_id)
    .bind(template.replace('_', "-"))
    .fetch_one(conn)
    .await
}

/// Whether the user already received `template` within `window`.
pub async fn has_received_recently(
    conn: &mut PgConnection,
    user_id: i64,
    template: &str,
    window: Duration,
) -> Result<bool, sqlx::Error> {
    let since = Utc::now() - window;
    let count: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM email_logs WHERE user_id = $1 AND template = $2 AND created_at > $3",
    )
    .bind(user_id)
    .bind(template.replace('_', "-"))
    .bind(since)
    .fetch_one(conn)
    .await?;
    Ok(count > 0)
}

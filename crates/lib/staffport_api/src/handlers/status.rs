//! Unauthenticated health endpoint.

use axum::Json;
use serde_json::{Value, json};

pub async fn site_status() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

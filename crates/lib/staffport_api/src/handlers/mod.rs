//! Request handlers.

pub mod auth;
pub mod home;
pub mod status;

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::error::{AppError, ErrorKey};

/// A `302 Found` redirect. Axum's own helpers emit 303/307, but the
/// auth flow deliberately uses the classic 302.
pub fn found(location: &str) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, location.to_string())],
    )
        .into_response()
}

/// Fallback for unknown routes.
pub async fn not_found() -> AppError {
    AppError::new(ErrorKey::NotFound, StatusCode::NOT_FOUND, "no such route")
}

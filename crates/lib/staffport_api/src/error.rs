//! Application error types and the central error renderer.
//!
//! Handlers and middleware return [`AppError`]; its `IntoResponse`
//! impl parks the error in the response extensions, and the outermost
//! [`render`] layer turns it into the client-facing shape: JSON for
//! API-style failures, a redirect to the logged-out page for 3xx, and
//! a stripped fallback when even encoding the error fails.

use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::{Serialize, Serializer};
use tracing::{error, warn};

use crate::AppState;
use crate::config::Environment;
use crate::handlers::found;
use crate::middleware::auth::AuthenticatedEmployee;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Stable machine-readable error identifiers.
///
/// The serialized form (`ErrorNotAuthenticated`, ...) is part of the
/// API contract; clients compare keys, not messages or statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKey {
    ClearingSession,
    GettingAuthUrl,
    AuthProvidersCallback,
    NotAuthenticated,
    GeneratingRandomToken,
    CreatingAccessToken,
    StoringAccessToken,
    RenderingTemplate,
    NotFound,
    Internal,
}

impl ErrorKey {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKey::ClearingSession => "ErrorClearingSession",
            ErrorKey::GettingAuthUrl => "ErrorGettingAuthURL",
            ErrorKey::AuthProvidersCallback => "ErrorAuthProvidersCallback",
            ErrorKey::NotAuthenticated => "ErrorNotAuthenticated",
            ErrorKey::GeneratingRandomToken => "ErrorGeneratingRandomToken",
            ErrorKey::CreatingAccessToken => "ErrorCreatingAccessToken",
            ErrorKey::StoringAccessToken => "ErrorStoringAccessToken",
            ErrorKey::RenderingTemplate => "ErrorRenderingTemplate",
            ErrorKey::NotFound => "ErrorNotFound",
            ErrorKey::Internal => "ErrorInternal",
        }
    }
}

impl Serialize for ErrorKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// An application error: key, HTTP status, and debug context.
///
/// Cloneable so it can travel through response extensions to the
/// renderer.
#[derive(Debug, Clone)]
pub struct AppError {
    pub key: ErrorKey,
    pub status: StatusCode,
    /// Internal detail, only ever shown outside production.
    pub debug_msg: String,
    pub extras: BTreeMap<String, String>,
}

impl AppError {
    pub fn new(key: ErrorKey, status: StatusCode, err: impl fmt::Display) -> Self {
        Self {
            key,
            status,
            debug_msg: err.to_string(),
            extras: BTreeMap::new(),
        }
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorKey::Internal, StatusCode::INTERNAL_SERVER_ERROR, err)
    }

    pub fn not_authenticated(err: impl fmt::Display) -> Self {
        Self::new(ErrorKey::NotAuthenticated, StatusCode::UNAUTHORIZED, err)
    }

    /// The user-facing message, derived from the key. Server errors all
    /// read as the internal message regardless of their specific key.
    pub fn message(&self) -> String {
        if self.status.is_server_error() {
            key_to_message(ErrorKey::Internal.as_str())
        } else {
            key_to_message(self.key.as_str())
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.key.as_str(), self.status, self.debug_msg)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = self.status.into_response();
        response.extensions_mut().insert(self);
        response
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    key: ErrorKey,
    status: u16,
    message: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    debug_msg: &'a str,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    extras: &'a BTreeMap<String, String>,
}

/// Last-resort body when the real error cannot be encoded.
const STRIPPED_ERROR: &str = r#"{"key":"ErrorInternal","status":500,"message":"Internal"}"#;

/// Outermost middleware: renders any [`AppError`] left in the response
/// extensions by an inner layer or handler.
pub async fn render(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let uri = request.uri().to_string();
    // Proxied deployments put the caller in CF-Connecting-IP; direct
    // ones fall back to the socket address.
    let client_ip = request
        .headers()
        .get("cf-connecting-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip().to_string())
        })
        .unwrap_or_else(|| "-".to_string());

    let response = next.run(request).await;

    let Some(err) = response.extensions().get::<AppError>() else {
        return response;
    };
    let mut err = err.clone();

    if state.config.environment == Environment::Production {
        err.debug_msg.clear();
        err.extras.clear();
    } else {
        err.extras.insert("method".to_string(), method);
        err.extras.insert("uri".to_string(), uri);
        err.extras.insert("clientIp".to_string(), client_ip);
        if let Some(AuthenticatedEmployee(masked)) =
            response.extensions().get::<AuthenticatedEmployee>()
        {
            err.extras.insert("employeeId".to_string(), masked.clone());
        }
    }

    if err.status == StatusCode::UNAUTHORIZED || err.status == StatusCode::BAD_REQUEST {
        warn!(key = err.key.as_str(), status = err.status.as_u16(), debug = %err.debug_msg, "request failed");
    } else {
        error!(key = err.key.as_str(), status = err.status.as_u16(), debug = %err.debug_msg, "request failed");
    }

    let message = err.message();

    // Browser-flow failures land on the logged-out page with a readable
    // message; everything else is a JSON body.
    if err.status.is_redirection() {
        let url = format!(
            "{}/logged-out?appError={}",
            state.config.app_url,
            urlencoding::encode(&message)
        );
        return found(&url);
    }

    let body = ErrorBody {
        key: err.key,
        status: err.status.as_u16(),
        message: &message,
        debug_msg: &err.debug_msg,
        extras: &err.extras,
    };
    match serde_json::to_vec(&body) {
        Ok(bytes) => (
            err.status,
            [(header::CONTENT_TYPE, "application/json")],
            bytes,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode error response");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "application/json")],
                STRIPPED_ERROR,
            )
                .into_response()
        }
    }
}

/// Derives a readable message from an error key: drop the `Error`
/// prefix, split the camel-case words, keep initialisms together, and
/// capitalize the first word.
pub fn key_to_message(key: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            words.push(ch.to_string());
        } else if let Some(last) = words.last_mut() {
            last.push(ch);
        }
    }
    if words.is_empty() {
        return key.to_string();
    }
    if words.len() > 1 && words[0] == "Error" {
        words.remove(0);
    }

    // Runs of single uppercase letters are an initialism ("URL").
    let mut merged: Vec<String> = Vec::new();
    let mut i = 0;
    while i < words.len() {
        if words[i].len() > 1 {
            merged.push(words[i].to_lowercase());
            i += 1;
            continue;
        }
        let mut combined = words[i].clone();
        i += 1;
        while i < words.len() && words[i].len() == 1 {
            combined.push_str(&words[i]);
            i += 1;
        }
        merged.push(combined.to_lowercase());
    }

    let mut message = merged.join(" ");
    if let Some(first) = message.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readable_messages_from_keys() {
        assert_eq!("Not authenticated", key_to_message("ErrorNotAuthenticated"));
        assert_eq!("Getting auth url", key_to_message("ErrorGettingAuthURL"));
        assert_eq!(
            "Auth providers callback",
            key_to_message("ErrorAuthProvidersCallback")
        );
        assert_eq!("Internal", key_to_message("ErrorInternal"));
        assert_eq!("Error", key_to_message("Error"));
        assert_eq!("no uppercase", key_to_message("no uppercase"));
    }

    #[test]
    fn server_errors_read_as_internal() {
        let err = AppError::new(
            ErrorKey::AuthProvidersCallback,
            StatusCode::INTERNAL_SERVER_ERROR,
            "idp exploded",
        );
        assert_eq!("Internal", err.message());
        assert_eq!("ErrorAuthProvidersCallback", err.key.as_str());

        let err = AppError::not_authenticated("nope");
        assert_eq!("Not authenticated", err.message());
    }

    #[test]
    fn error_body_shape() {
        let err = AppError::not_authenticated("no access token provided");
        let body = ErrorBody {
            key: err.key,
            status: err.status.as_u16(),
            message: &err.message(),
            debug_msg: &err.debug_msg,
            extras: &err.extras,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!("ErrorNotAuthenticated", json["key"]);
        assert_eq!(401, json["status"]);
        assert_eq!("Not authenticated", json["message"]);
        assert_eq!("no access token provided", json["debug_msg"]);
        assert!(json.get("extras").is_none());
    }

    #[test]
    fn into_response_keeps_the_error_available() {
        let response = AppError::not_authenticated("x").into_response();
        assert_eq!(StatusCode::UNAUTHORIZED, response.status());
        let parked = response.extensions().get::<AppError>().unwrap();
        assert_eq!(ErrorKey::NotAuthenticated, parked.key);
    }
}

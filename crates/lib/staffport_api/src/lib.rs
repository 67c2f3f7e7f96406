//! # staffport_api
//!
//! HTTP layer for Staffport: router, middleware, session handling, the
//! SAML auth flow, and server-rendered pages.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod saml;
pub mod session;

use std::sync::Arc;

use axum::Router;
use axum::extract::FromRef;
use axum::routing::{get, post, put};
use axum_extra::extract::cookie::Key;
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::handlers::{auth, home, status};
use crate::saml::SamlProvider;
use staffport_core::email::Sender;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool. Handlers normally use the
    /// per-request transaction instead of touching this directly.
    pub pool: PgPool,
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// SAML identity provider, absent when metadata was not configured.
    pub saml: Option<Arc<SamlProvider>>,
    /// Outbound email backend.
    pub mailer: Arc<dyn Sender>,
    /// Signing key for the session cookie.
    pub cookie_key: Key,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Key {
        state.cookie_key.clone()
    }
}

/// Run embedded database migrations.
///
/// Delegates to `staffport_core::migrate::migrate()` which owns the
/// migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    staffport_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
///
/// Layer order (outermost first): trace, error rendering, per-request
/// transaction, then authentication, so the auth lookup runs inside
/// the transaction and every error passes the renderer on the way out.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth/login", get(auth::login))
        .route("/auth/callback", post(auth::callback))
        .route("/auth/logout", get(auth::logout))
        .route("/auth/logout-callback", get(auth::logout_callback))
        .route("/", get(home::home))
        .route("/card", put(home::card))
        .route("/site/status", get(status::site_status))
        .fallback(handlers::not_found)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::txn::transaction,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            error::render,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Core domain logic for Staffport.
//!
//! Holds the user/access-token model, opaque token issuance and lookup,
//! the email subsystem (composition, masking, delivery backends, audit
//! log), database migrations, and a local-PostgreSQL test harness.

pub mod auth;
pub mod db;
pub mod email;
pub mod migrate;
pub mod models;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

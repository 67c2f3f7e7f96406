//! Request middleware: authentication and the per-request transaction.

pub mod auth;
pub mod txn;

//! Outbound email: composition, MIME encoding, delivery backends, and
//! the per-user audit log.
//!
//! Backends implement [`Sender`] and are selected at startup. Real
//! backends honor a sandbox address that redirects all mail in
//! non-production environments.

pub mod compose;
pub mod fake;
pub mod log;
pub mod mailgun;
pub mod mask;
pub mod mime;
pub mod ses;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from email composition and delivery.
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("unknown email template {0:?}")]
    UnknownTemplate(String),

    #[error("error rendering email template: {0}")]
    Render(#[from] askama::Error),

    #[error("invalid email address {0:?}")]
    Address(String),

    #[error("error encoding MIME message: {0}")]
    Mime(String),

    #[error("error sending message: {0}")]
    Send(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("all {0} messages in batch failed")]
    BatchFailed(usize),
}

/// A display name and email address pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Address {
    pub name: String,
    pub email: String,
}

impl Address {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.email)
        } else {
            write!(f, "{} <{}>", self.name, self.email)
        }
    }
}

/// A composed message ready for MIME encoding and delivery.
///
/// `inline_images` maps content ids to PNG bytes; only images actually
/// referenced by the HTML body (`cid:` URLs) are attached.
#[derive(Debug, Clone)]
pub struct Email {
    pub from: Address,
    pub to: Address,
    pub subject: String,
    pub body_html: String,
    pub inline_images: BTreeMap<String, Vec<u8>>,
}

/// A delivery backend.
#[async_trait]
pub trait Sender: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), EmailError>;
}

/// Sends a batch of messages, logging individual failures.
///
/// Returns the number delivered. The batch as a whole fails only when
/// every message in it failed.
pub async fn send_batch(sender: &dyn Sender, emails: &[Email]) -> Result<usize, EmailError> {
    if emails.is_empty() {
        return Ok(0);
    }

    let mut sent = 0;
    for email in emails {
        match sender.send(email).await {
            Ok(()) => sent += 1,
            Err(e) => tracing::error!(
                to = %mask::mask_email(&email.to.email),
                error = %e,
                "failed to send message"
            ),
        }
    }

    if sent == 0 {
        return Err(EmailError::BatchFailed(emails.len()));
    }
    Ok(sent)
}

/// Sends one message and records it in the email log. A logging failure
/// after successful delivery is reported but not fatal.
pub async fn send_with_log(
    conn: &mut sqlx::PgConnection,
    sender: &dyn Sender,
    user_id: i64,
    template: &str,
    email: &Email,
) -> Result<(), EmailError> {
    sender.send(email).await?;
    if let Err(e) = log::create_email_log(conn, user_id, template).await {
        tracing::error!(user_id, template, error = %e, "failed to record email log entry");
    }
    Ok(())
}

/// Applies the sandbox redirect: all mail goes to the sandbox address
/// when one is configured.
fn delivery_address(email: &Email, sandbox_email: Option<&str>) -> String {
    match sandbox_email {
        Some(sandbox) if !sandbox.is_empty() => sandbox.to_string(),
        _ => email.to.email.clone(),
    }
}

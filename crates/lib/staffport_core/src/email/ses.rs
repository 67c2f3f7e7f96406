//! Amazon SES delivery backend.
//!
//! Sends the locally encoded MIME message through the SES v2 raw email
//! API. Credentials and region come from the default AWS provider
//! chain.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sesv2::Client;
use aws_sdk_sesv2::primitives::Blob;
use aws_sdk_sesv2::types::{Destination, EmailContent, RawMessage};

use super::{Email, EmailError, Sender, delivery_address, mime};

pub struct SesSender {
    client: Client,
    sandbox_email: Option<String>,
}

impl SesSender {
    /// Builds a sender from the ambient AWS configuration.
    pub async fn from_env(sandbox_email: Option<String>) -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self {
            client: Client::new(&config),
            sandbox_email,
        }
    }
}

#[async_trait]
impl Sender for SesSender {
    async fn send(&self, email: &Email) -> Result<(), EmailError> {
        let to = delivery_address(email, self.sandbox_email.as_deref());
        let raw = mime::encode(email)?;

        let message = RawMessage::builder()
            .data(Blob::new(raw))
            .build()
            .map_err(|e| EmailError::Send(e.to_string()))?;
        let content = EmailContent::builder().raw(message).build();
        let destination = Destination::builder().to_addresses(to).build();

        self.client
            .send_email()
            .from_email_address(email.from.email.clone())
            .destination(destination)
            .content(content)
            .send()
            .await
            .map_err(|e| EmailError::Send(e.to_string()))?;
        Ok(())
    }
}

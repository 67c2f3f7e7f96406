//! Mailgun delivery backend.
//!
//! Posts the fully encoded message to the `messages.mime` endpoint so
//! the MIME layout built locally is preserved verbatim.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use super::{Email, EmailError, Sender, delivery_address, mime};

const DEFAULT_BASE_URL: &str = "https://api.mailgun.net/v3";

pub struct MailgunSender {
    domain: String,
    api_key: String,
    sandbox_email: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl MailgunSender {
    pub fn new(domain: String, api_key: String, sandbox_email: Option<String>) -> Self {
        Self {
            domain,
            api_key,
            sandbox_email,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }
}

#[async_trait]
impl Sender for MailgunSender {
    async fn send(&self, email: &Email) -> Result<(), EmailError> {
        let to = delivery_address(email, self.sandbox_email.as_deref());
        let raw = mime::encode(email)?;

        let form = Form::new()
            .text("to", to)
            .part("message", Part::bytes(raw).file_name("message.mime"));

        let url = format!("{}/{}/messages.mime", self.base_url, self.domain);
        let response = self
            .client
            .post(&url)
            .basic_auth("api", Some(&self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| EmailError::Send(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmailError::Send(format!("mailgun returned {status}: {body}")));
        }
        Ok(())
    }
}

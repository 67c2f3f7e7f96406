//! In-memory delivery backend for development and tests.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{Email, EmailError, Sender, mime};

/// A message captured by [`FakeSender`].
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub raw: Vec<u8>,
}

/// Captures messages instead of delivering them. With an output
/// directory set, each message is also written as an `.eml` file so it
/// can be opened in a mail client.
#[derive(Debug, Default)]
pub struct FakeSender {
    outbox: Mutex<Vec<SentEmail>>,
    output_dir: Option<PathBuf>,
}

impl FakeSender {
    pub fn new(output_dir: Option<PathBuf>) -> Self {
        Self {
            outbox: Mutex::new(Vec::new()),
            output_dir,
        }
    }

    /// Returns a copy of everything sent so far.
    pub async fn sent(&self) -> Vec<SentEmail> {
        self.outbox.lock().await.clone()
    }
}

#[async_trait]
impl Sender for FakeSender {
    async fn send(&self, email: &Email) -> Result<(), EmailError> {
        let raw = mime::encode(email)?;

        if let Some(dir) = &self.output_dir {
            std::fs::create_dir_all(dir)?;
            let name = format!("{}.eml", Utc::now().format("%Y%m%d%H%M%S%.6f"));
            std::fs::write(dir.join(name), &raw)?;
        }

        self.outbox.lock().await.push(SentEmail {
            to: email.to.email.clone(),
            subject: email.subject.clone(),
            raw,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::email::Address;

    fn email() -> Email {
        Email {
            from: Address::new("Staffport", "no-reply@example.org"),
            to: Address::new("John Doe", "jdoe@example.org"),
            subject: "Hello".to_string(),
            body_html: "<p>hi</p>".to_string(),
            inline_images: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn captures_sent_messages() {
        let sender = FakeSender::new(None);
        sender.send(&email()).await.unwrap();

        let sent = sender.sent().await;
        assert_eq!(1, sent.len());
        assert_eq!("jdoe@example.org", sent[0].to);
        assert_eq!("Hello", sent[0].subject);
        assert!(!sent[0].raw.is_empty());
    }

    #[tokio::test]
    async fn writes_eml_files() {
        let dir = tempfile::tempdir().unwrap();
        let sender = FakeSender::new(Some(dir.path().to_path_buf()));
        sender.send(&email()).await.unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(1, files.len());
        let name = files[0].as_ref().unwrap().file_name();
        assert!(name.to_string_lossy().ends_with(".eml"));
    }
}

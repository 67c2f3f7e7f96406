//! MIME encoding of composed messages.
//!
//! Layout: `multipart/alternative` holding a plain-text rendering of
//! the HTML body, then `multipart/related` with the HTML and any inline
//! images it references by `cid:` URL. Unreferenced images are dropped.

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, Message, MultiPart, SinglePart};

use super::{Address, Email, EmailError};

/// Width used when deriving the plain-text alternative from the HTML.
const TEXT_WRAP_COLUMNS: usize = 78;

/// Encodes a composed message to RFC 5322 bytes.
pub fn encode(email: &Email) -> Result<Vec<u8>, EmailError> {
    let text_body = html2text::from_read(email.body_html.as_bytes(), TEXT_WRAP_COLUMNS);

    let mut related = MultiPart::related().singlepart(SinglePart::html(email.body_html.clone()));
    for (cid, bytes) in &email.inline_images {
        if !email.body_html.contains(&format!("cid:{cid}")) {
            continue;
        }
        let content_type =
            ContentType::parse("image/png").map_err(|e| EmailError::Mime(e.to_string()))?;
        related = related.singlepart(Attachment::new_inline(cid.clone()).body(bytes.clone(), content_type));
    }

    let message = Message::builder()
        .from(parse_mailbox(&email.from)?)
        .to(parse_mailbox(&email.to)?)
        .subject(email.subject.clone())
        .multipart(
            MultiPart::alternative()
                .singlepart(SinglePart::plain(text_body))
                .multipart(related),
        )
        .map_err(|e| EmailError::Mime(e.to_string()))?;

    Ok(message.formatted())
}

fn parse_mailbox(address: &Address) -> Result<Mailbox, EmailError> {
    address
        .to_string()
        .parse()
        .map_err(|_| EmailError::Address(address.email.clone()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::email::compose::LOGO_PNG;

    fn email(body_html: &str, images: &[&str]) -> Email {
        let mut inline_images = BTreeMap::new();
        for cid in images {
            inline_images.insert(cid.to_string(), LOGO_PNG.to_vec());
        }
        Email {
            from: Address::new("Staffport", "no-reply@example.org"),
            to: Address::new("John Doe", "jdoe@example.org"),
            subject: "Hello".to_string(),
            body_html: body_html.to_string(),
            inline_images,
        }
    }

    #[test]
    fn encodes_alternative_with_related_html() {
        let raw = encode(&email(
            r#"<p>Hi there</p><img src="cid:logo">"#,
            &["logo"],
        ))
        .unwrap();
        let text = String::from_utf8_lossy(&raw);

        assert!(text.contains("multipart/alternative"));
        assert!(text.contains("multipart/related"));
        assert!(text.contains("text/plain"));
        assert!(text.contains("text/html"));
        assert!(text.contains("image/png"));
        assert!(text.contains("Hi there"));
        assert!(text.contains("jdoe@example.org"));
    }

    #[test]
    fn drops_unreferenced_images() {
        let raw = encode(&email("<p>No images here</p>", &["logo", "ghost"])).unwrap();
        let text = String::from_utf8_lossy(&raw);
        assert!(!text.contains("image/png"));
    }

    #[test]
    fn rejects_invalid_recipient() {
        let mut bad = email("<p>hi</p>", &[]);
        bad.to = Address::new("", "not an address");
        let err = encode(&bad).unwrap_err();
        assert!(matches!(err, EmailError::Address(_)));
    }
}

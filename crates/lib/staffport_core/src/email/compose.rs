//! Template-driven message composition.

use std::collections::BTreeMap;

use askama::Template;

use super::{Address, Email, EmailError};

/// Template name for the account welcome message.
pub const WELCOME_TEMPLATE: &str = "welcome";

/// Inline logo referenced by the HTML body as `cid:logo`.
pub const LOGO_PNG: &[u8] = include_bytes!("../../assets/logo.png");

/// Branding and personalization fields available to email templates.
#[derive(Debug, Clone)]
pub struct TemplateFields {
    pub display_name: String,
    pub username: String,
    pub app_name: String,
    pub app_url: String,
    pub brand_color: String,
    pub help_center_url: String,
    pub support_email: String,
    pub support_name: String,
    /// Trusted HTML fragment appended as the signature.
    pub signature_html: String,
}

#[derive(Template)]
#[template(path = "email/welcome.html")]
struct WelcomeBody<'a> {
    fields: &'a TemplateFields,
}

#[derive(Template)]
#[template(
    source = "Important information about your {{ app_name }} account",
    ext = "txt"
)]
struct WelcomeSubject<'a> {
    app_name: &'a str,
}

/// Renders the named template into a deliverable [`Email`].
pub fn compose(
    template: &str,
    from: Address,
    to: Address,
    fields: &TemplateFields,
) -> Result<Email, EmailError> {
    match template {
        WELCOME_TEMPLATE => {
            let subject = WelcomeSubject {
                app_name: &fields.app_name,
            }
            .render()?;
            let body_html = WelcomeBody { fields }.render()?;

            let mut inline_images = BTreeMap::new();
            inline_images.insert("logo".to_string(), LOGO_PNG.to_vec());

            Ok(Email {
                from,
                to,
                subject,
                body_html,
                inline_images,
            })
        }
        other => Err(EmailError::UnknownTemplate(other.to_string())),
    }
}

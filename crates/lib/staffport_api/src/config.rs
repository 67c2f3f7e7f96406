//! Application configuration.

use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};

/// Deployment environment, from `APP_ENV`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value {
            "dev" | "development" => Environment::Development,
            "test" => Environment::Test,
            _ => Environment::Production,
        }
    }
}

/// Configuration for the application.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub environment: Environment,
    /// Product name shown in pages and email.
    pub app_name: String,
    /// Canonical base URL, no trailing slash.
    pub app_url: String,
    /// Secret the session cookie is signed with.
    pub session_secret: String,
    /// Pre-shared bearer keys for non-interactive API clients.
    pub api_access_keys: Vec<String>,
    /// Local development runs without TLS; relaxes cookie attributes only.
    pub disable_tls: bool,

    pub email_service: String,
    pub email_from_address: String,
    pub email_signature: String,
    pub support_name: String,
    pub support_email: String,
    pub help_center_url: String,
    pub brand_color: String,
    /// When set, all outbound mail is redirected here.
    pub sandbox_email: Option<String>,
    pub mailgun_domain: String,
    pub mailgun_api_key: String,

    pub saml_sp_entity_id: String,
    pub saml_acs_url: String,
    /// IdP metadata location; SAML login is disabled when unset.
    pub saml_idp_metadata_url: Option<String>,
}

impl AppConfig {
    /// Reads configuration from environment variables with development
    /// defaults.
    ///
    /// | Variable                | Default                          |
    /// |-------------------------|----------------------------------|
    /// | `APP_ENV`               | `development`                    |
    /// | `APP_NAME`              | `Staffport`                      |
    /// | `APP_URL`               | `http://localhost:8100`          |
    /// | `SESSION_SECRET`        | fixed dev value                  |
    /// | `API_ACCESS_KEYS`       | empty (comma separated)          |
    /// | `DISABLE_TLS`           | `false`                          |
    /// | `EMAIL_SERVICE`         | `fake` (`fake`\|`mailgun`\|`ses`)|
    /// | `SAML_SP_ENTITY_ID`     | `APP_URL`                        |
    /// | `SAML_ACS_URL`          | `APP_URL` + `/auth/callback`     |
    /// | `SAML_IDP_METADATA_URL` | unset (SAML disabled)            |
    pub fn from_env() -> Self {
        let app_url = env_or("APP_URL", "http://localhost:8100");

        Self {
            environment: Environment::parse(&env_or("APP_ENV", "development")),
            app_name: env_or("APP_NAME", "Staffport"),
            session_secret: env_or(
                "SESSION_SECRET",
                "staffport-dev-session-secret-change-in-production",
            ),
            api_access_keys: env_or("API_ACCESS_KEYS", "")
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect(),
            disable_tls: env_or("DISABLE_TLS", "false") == "true",

            email_service: env_or("EMAIL_SERVICE", "fake"),
            email_from_address: env_or("EMAIL_FROM_ADDRESS", "no-reply@staffport.example.org"),
            email_signature: env_or("EMAIL_SIGNATURE", "The Staffport team"),
            support_name: env_or("SUPPORT_NAME", "Staffport Support"),
            support_email: env_or("SUPPORT_EMAIL", "support@staffport.example.org"),
            help_center_url: env_or("HELP_CENTER_URL", "https://help.staffport.example.org"),
            brand_color: env_or("BRAND_COLOR", "#0058a3"),
            sandbox_email: std::env::var("SANDBOX_EMAIL").ok().filter(|v| !v.is_empty()),
            mailgun_domain: env_or("MAILGUN_DOMAIN", ""),
            mailgun_api_key: env_or("MAILGUN_API_KEY", ""),

            saml_sp_entity_id: env_or("SAML_SP_ENTITY_ID", &app_url),
            saml_acs_url: env_or("SAML_ACS_URL", &format!("{app_url}/auth/callback")),
            saml_idp_metadata_url: std::env::var("SAML_IDP_METADATA_URL")
                .ok()
                .filter(|v| !v.is_empty()),
            app_url,
        }
    }

    /// Whether session cookies should carry `Secure; SameSite=None`.
    pub fn secure_cookies(&self) -> bool {
        !self.disable_tls
    }

    /// Access tokens get the extended lifetime outside production.
    pub fn extended_token_lifetime(&self) -> bool {
        self.environment == Environment::Development
    }

    /// Derives the cookie signing key from the session secret.
    ///
    /// SHA-512 stretches the secret to the 64 bytes the key requires,
    /// so operators can configure secrets of any length.
    pub fn cookie_key(&self) -> Key {
        let digest = Sha512::digest(self.session_secret.as_bytes());
        Key::from(digest.as_slice())
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        environment: Environment::Test,
        app_name: "Staffport".to_string(),
        app_url: "http://localhost:8100".to_string(),
        session_secret: "test-session-secret".to_string(),
        api_access_keys: vec!["test-api-key".to_string()],
        disable_tls: true,
        email_service: "fake".to_string(),
        email_from_address: "no-reply@example.org".to_string(),
        email_signature: "The Staffport team".to_string(),
        support_name: "Support".to_string(),
        support_email: "support@example.org".to_string(),
        help_center_url: "https://help.example.org".to_string(),
        brand_color: "#0058a3".to_string(),
        sandbox_email: None,
        mailgun_domain: String::new(),
        mailgun_api_key: String::new(),
        saml_sp_entity_id: "http://localhost:8100".to_string(),
        saml_acs_url: "http://localhost:8100/auth/callback".to_string(),
        saml_idp_metadata_url: None,
    }
}

//! The session cookie.
//!
//! One signed cookie holds a small JSON document with at most two
//! fields: the raw access token and a post-login return destination.
//! Anything unreadable (missing, tampered, stale key) degrades to an
//! empty session.

use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use serde::{Deserialize, Serialize};
use time::Duration;

pub const SESSION_COOKIE: &str = "staffport_session";

const SESSION_MAX_AGE: Duration = Duration::days(7);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_to: Option<String>,
}

impl Session {
    /// Reads the session from the jar, treating any unreadable cookie
    /// as an empty session.
    pub fn from_jar(jar: &SignedCookieJar) -> Self {
        jar.get(SESSION_COOKIE)
            .and_then(|cookie| serde_json::from_str(cookie.value()).ok())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.return_to.is_none()
    }

    /// Writes the session into the jar.
    ///
    /// Without TLS the `Secure; SameSite=None` pair is omitted, since
    /// browsers refuse `SameSite=None` on insecure cookies.
    pub fn save(
        &self,
        jar: SignedCookieJar,
        secure: bool,
    ) -> Result<SignedCookieJar, serde_json::Error> {
        let value = serde_json::to_string(self)?;
        let mut builder = Cookie::build((SESSION_COOKIE, value))
            .path("/")
            .http_only(true)
            .max_age(SESSION_MAX_AGE);
        if secure {
            builder = builder.secure(true).same_site(SameSite::None);
        }
        Ok(jar.add(builder.build()))
    }

    /// Expires the session cookie.
    pub fn clear(jar: SignedCookieJar) -> SignedCookieJar {
        jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build())
    }
}

#[cfg(test)]
mod tests {
    use axum_extra::extract::cookie::Key;

    use super::*;

    fn jar() -> SignedCookieJar {
        SignedCookieJar::new(Key::from(&[7u8; 64]))
    }

    #[test]
    fn round_trips_through_the_jar() {
        let session = Session {
            access_token: Some("token-value".to_string()),
            return_to: Some("/somewhere".to_string()),
        };
        let jar = session.save(jar(), false).unwrap();
        assert_eq!(session, Session::from_jar(&jar));
    }

    #[test]
    fn missing_cookie_is_an_empty_session() {
        let session = Session::from_jar(&jar());
        assert!(session.is_empty());
        assert_eq!(None, session.access_token);
    }

    #[test]
    fn clear_leaves_no_keys_behind() {
        let session = Session {
            access_token: Some("token-value".to_string()),
            return_to: Some("/somewhere".to_string()),
        };
        let jar = session.save(jar(), false).unwrap();
        let jar = Session::clear(jar);

        let session = Session::from_jar(&jar);
        assert!(session.is_empty());
        assert_eq!(None, session.access_token);
        assert_eq!(None, session.return_to);
    }

    #[test]
    fn empty_fields_are_not_serialized() {
        let json = serde_json::to_string(&Session::default()).unwrap();
        assert_eq!("{}", json);
    }
}

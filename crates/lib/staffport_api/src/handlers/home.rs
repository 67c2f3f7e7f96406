//! The profile page and its toggle-card fragment.

use askama::Template;
use axum::extract::{Extension, Form, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::AppState;
use crate::error::{AppError, AppResult, ErrorKey};
use crate::handlers::found;
use crate::middleware::auth::{CurrentUser, TokenAuth};

#[derive(Template)]
#[template(path = "home.html")]
struct HomePage {
    app_name: String,
    display_name: String,
    username: String,
    email: String,
    last_login: String,
    help_center_url: String,
    enabled: bool,
}

#[derive(Template)]
#[template(path = "card.html")]
struct CardFragment {
    enabled: bool,
}

/// `GET /`: the signed-in profile page. Anonymous visitors are sent to
/// the login flow rather than shown an error; pre-shared-key clients
/// have no session user to render and get a 401 instead of a redirect.
pub async fn home(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    token_auth: Option<Extension<TokenAuth>>,
) -> AppResult<Response> {
    let Some(Extension(CurrentUser(user))) = user else {
        if token_auth.is_some() {
            return Err(AppError::not_authenticated(
                "pre-shared key requests carry no user profile",
            ));
        }
        return Ok(found("/auth/login"));
    };

    let page = HomePage {
        app_name: state.config.app_name.clone(),
        display_name: user.name(),
        username: user.username.clone(),
        email: user.email.clone(),
        last_login: format_optional_date(user.last_login_at),
        help_center_url: state.config.help_center_url.clone(),
        enabled: false,
    };
    let html = page.render().map_err(|e| {
        AppError::new(
            ErrorKey::RenderingTemplate,
            StatusCode::INTERNAL_SERVER_ERROR,
            e,
        )
    })?;
    Ok(Html(html).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CardForm {
    #[serde(default)]
    enabled: String,
}

/// `PUT /card`: flip the toggle state the client submitted and return
/// the refreshed fragment. The state lives in the page, not on the
/// server, so concurrent users cannot flip each other's cards.
pub async fn card(Form(form): Form<CardForm>) -> AppResult<Response> {
    let fragment = CardFragment {
        enabled: !submitted_enabled(&form),
    };
    let html = fragment.render().map_err(|e| {
        AppError::new(
            ErrorKey::RenderingTemplate,
            StatusCode::INTERNAL_SERVER_ERROR,
            e,
        )
    })?;
    Ok(Html(html).into_response())
}

fn submitted_enabled(form: &CardForm) -> bool {
    form.enabled == "true"
}

fn format_optional_date(date: Option<DateTime<Utc>>) -> String {
    match date {
        Some(date) => format_date(date),
        None => "-".to_string(),
    }
}

/// Long-form date, e.g. `Monday, January 1, 2024`.
fn format_date(date: DateTime<Utc>) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn formats_dates_long_form() {
        let date = Utc.with_ymd_and_hms(2024, 1, 1, 1, 1, 1).unwrap();
        assert_eq!("Monday, January 1, 2024", format_date(date));
        assert_eq!("Monday, January 1, 2024", format_optional_date(Some(date)));
        assert_eq!("-", format_optional_date(None));
    }

    #[test]
    fn card_fragment_flips_submitted_state() {
        assert!(submitted_enabled(&CardForm {
            enabled: "true".to_string()
        }));
        assert!(!submitted_enabled(&CardForm {
            enabled: "false".to_string()
        }));
        assert!(!submitted_enabled(&CardForm {
            enabled: String::new()
        }));

        let html = CardFragment { enabled: true }.render().unwrap();
        assert!(html.contains("enabled"));
        assert!(html.contains(r#"value="true""#));

        let html = CardFragment { enabled: false }.render().unwrap();
        assert!(html.contains(r#"value="false""#));
    }
}

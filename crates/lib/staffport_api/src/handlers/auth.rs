//! The SAML login/logout flow.
//!
//! Every entry point begins by discarding whatever session the browser
//! presented; a login attempt never extends an existing session.

use axum::extract::{Extension, Form, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum_extra::extract::cookie::SignedCookieJar;
use serde::Deserialize;
use sqlx::PgConnection;
use tracing::{error, info};

use crate::AppState;
use crate::error::{AppError, AppResult, ErrorKey};
use crate::handlers::found;
use crate::middleware::txn::RequestTx;
use crate::session::Session;
use staffport_core::auth::{self, tokens};
use staffport_core::email::compose::{self, TemplateFields};
use staffport_core::email::mask::{mask_email, mask_string};
use staffport_core::email::{self, Address};
use staffport_core::models::User;

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    #[serde(rename = "return-to")]
    return_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackForm {
    #[serde(rename = "SAMLResponse")]
    saml_response: Option<String>,
}

/// `GET /auth/login`: capture the optional return-to destination in a
/// fresh session and send the browser to the IdP.
pub async fn login(
    State(state): State<AppState>,
    Query(params): Query<LoginParams>,
    jar: SignedCookieJar,
) -> AppResult<(SignedCookieJar, Response)> {
    let mut jar = Session::clear(jar);

    let return_to = params.return_to.unwrap_or_default();
    if !return_to.is_empty() {
        let session = Session {
            access_token: None,
            return_to: Some(return_to),
        };
        jar = session
            .save(jar, state.config.secure_cookies())
            .map_err(AppError::internal)?;
    }

    let saml = state.saml.as_ref().ok_or_else(|| {
        AppError::new(
            ErrorKey::GettingAuthUrl,
            StatusCode::INTERNAL_SERVER_ERROR,
            "SAML is not configured",
        )
    })?;
    let url = saml.build_auth_url("").map_err(|e| {
        AppError::new(ErrorKey::GettingAuthUrl, StatusCode::INTERNAL_SERVER_ERROR, e)
    })?;

    Ok((jar, found(&url)))
}

/// `POST /auth/callback`: validate the IdP's response, issue an access
/// token into a fresh session, and land on the profile page.
pub async fn callback(
    State(state): State<AppState>,
    Extension(slot): Extension<RequestTx>,
    jar: SignedCookieJar,
    Form(form): Form<CallbackForm>,
) -> AppResult<(SignedCookieJar, Response)> {
    // The stored return-to belongs to this login attempt; read it
    // before the session is discarded.
    let return_to = Session::from_jar(&jar).return_to.unwrap_or_default();
    let jar = Session::clear(jar);

    let saml = state.saml.as_ref().ok_or_else(|| {
        AppError::new(
            ErrorKey::AuthProvidersCallback,
            StatusCode::INTERNAL_SERVER_ERROR,
            "SAML is not configured",
        )
    })?;
    let employee_id = saml
        .employee_id_from_response(form.saml_response.as_deref())
        .map_err(|e| {
            AppError::new(
                ErrorKey::AuthProvidersCallback,
                StatusCode::INTERNAL_SERVER_ERROR,
                e,
            )
        })?;

    let (token, user) = {
        let mut guard = slot.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("request transaction already taken"))?;

        let lifetime = auth::access_token_lifetime(state.config.extended_token_lifetime());
        let token = tokens::issue_token(&mut **conn, &employee_id, lifetime)
            .await
            .map_err(issue_error)?;
        let user = tokens::find_user_by_token(&mut **conn, &token)
            .await
            .map_err(AppError::not_authenticated)?;

        let first_login = user.last_login_at.is_none();
        auth::queries::update_last_login(&mut **conn, user.id)
            .await
            .map_err(AppError::internal)?;
        if first_login {
            send_welcome_email(&state, &mut **conn, &user).await;
        }

        (token, user)
    };

    let session = Session {
        access_token: Some(token),
        return_to: None,
    };
    let jar = session
        .save(jar, state.config.secure_cookies())
        .map_err(|e| {
            AppError::new(
                ErrorKey::StoringAccessToken,
                StatusCode::INTERNAL_SERVER_ERROR,
                e,
            )
        })?;

    info!(employee_id = %mask_string(&user.employee_id), "login");
    Ok((
        jar,
        found(&login_success_url(&state.config.app_url, &return_to)),
    ))
}

/// `GET /auth/logout`: discard the session and send the browser to the
/// IdP's single-logout endpoint. No endpoint means a hard failure; the
/// session is still gone.
pub async fn logout(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> AppResult<(SignedCookieJar, Response)> {
    let jar = Session::clear(jar);

    let saml = state
        .saml
        .as_ref()
        .ok_or_else(|| AppError::internal("SAML is not configured"))?;
    let slo_url = saml
        .slo_url()
        .ok_or_else(|| AppError::internal("IdP advertises no single-logout endpoint"))?;

    let separator = if slo_url.contains('?') { '&' } else { '?' };
    let url = format!(
        "{}{}ReturnTo={}",
        slo_url,
        separator,
        urlencoding::encode(&state.config.app_url)
    );
    Ok((jar, found(&url)))
}

/// `GET /auth/logout-callback`: the IdP sends the browser back here
/// after single logout; clear the session again and restart at login.
pub async fn logout_callback(jar: SignedCookieJar) -> (SignedCookieJar, Response) {
    let jar = Session::clear(jar);
    (jar, found("/auth/login"))
}

fn issue_error(err: auth::AuthError) -> AppError {
    match &err {
        auth::AuthError::UnknownEmployeeId(_)
        | auth::AuthError::TokenNotFound
        | auth::AuthError::TokenExpired => AppError::not_authenticated(err),
        auth::AuthError::Db(_) => AppError::new(
            ErrorKey::CreatingAccessToken,
            StatusCode::INTERNAL_SERVER_ERROR,
            err,
        ),
    }
}

/// Welcome mail goes out on the first successful login. Failures are
/// logged and never fail the login itself.
async fn send_welcome_email(state: &AppState, conn: &mut PgConnection, user: &User) {
    match email::log::has_received_recently(
        conn,
        user.id,
        compose::WELCOME_TEMPLATE,
        chrono::Duration::days(1),
    )
    .await
    {
        Ok(true) => return,
        Ok(false) => {}
        Err(e) => {
            error!(error = %e, "failed to check the email log");
            return;
        }
    }

    let config = &state.config;
    let fields = TemplateFields {
        display_name: user.name(),
        username: user.username.clone(),
        app_name: config.app_name.clone(),
        app_url: config.app_url.clone(),
        brand_color: config.brand_color.clone(),
        help_center_url: config.help_center_url.clone(),
        support_email: config.support_email.clone(),
        support_name: config.support_name.clone(),
        signature_html: config.email_signature.clone(),
    };
    let message = match compose::compose(
        compose::WELCOME_TEMPLATE,
        Address::new(config.app_name.as_str(), config.email_from_address.as_str()),
        Address::new(user.name(), user.email.as_str()),
        &fields,
    ) {
        Ok(message) => message,
        Err(e) => {
            error!(error = %e, "failed to compose welcome email");
            return;
        }
    };

    if let Err(e) = email::send_with_log(
        conn,
        state.mailer.as_ref(),
        user.id,
        compose::WELCOME_TEMPLATE,
        &message,
    )
    .await
    {
        error!(to = %mask_email(&user.email), error = %e, "failed to send welcome email");
    }
}

fn login_success_url(app_url: &str, return_to: &str) -> String {
    if return_to.is_empty() || return_to == app_url {
        return app_url.to_string();
    }
    format!("{}?return-to={}", app_url, urlencoding::encode(return_to))
}

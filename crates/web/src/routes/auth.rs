//! Sign-in route handlers.
//!
//! The identity provider hosts the sign-in form. We only:
//! - Redirect to it with a CSRF `state` stored in the session
//! - Verify the session token it hands back and remember the user
//! - Forget the user on sign-out

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use rand::distr::{Alphanumeric, SampleString};
use serde::Deserialize;
use tower_sessions::Session;

use quill_core::Username;

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::identity::IdentityError;
use crate::middleware::{OptionalAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

/// Length of the CSRF `state` parameter.
const STATE_LENGTH: usize = 32;

/// Query parameters on the sign-in callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Session token issued by the identity provider.
    pub session_token: Option<String>,
    /// Echo of the `state` we sent.
    pub state: Option<String>,
}

/// Shown when the sign-in round trip cannot be completed.
#[derive(Template, WebTemplate)]
#[template(path = "auth/sign_in_error.html")]
pub struct SignInErrorTemplate {
    pub message: &'static str,
}

fn sign_in_failed(message: &'static str) -> Response {
    (StatusCode::BAD_REQUEST, SignInErrorTemplate { message }).into_response()
}

/// Generate a random alphanumeric string for the `state` parameter.
fn generate_state() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), STATE_LENGTH)
}

/// Redirect to the hosted sign-in page.
///
/// # Route
///
/// `GET /sign-in`
#[tracing::instrument(skip_all)]
pub async fn sign_in(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(current): OptionalAuth,
) -> Result<Response, AppError> {
    if current.is_some() {
        return Ok(Redirect::to("/profile").into_response());
    }

    let csrf_state = generate_state();
    session
        .insert(session_keys::SIGN_IN_STATE, &csrf_state)
        .await?;

    let redirect_url = format!("{}/auth/callback", state.config().base_url);
    let url = state.identity().sign_in_url(&redirect_url, &csrf_state)?;

    Ok(Redirect::to(url.as_str()).into_response())
}

/// Complete sign-in after the identity provider redirects back.
///
/// # Route
///
/// `GET /auth/callback`
#[tracing::instrument(skip_all)]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    let stored_state: Option<String> = session.remove(session_keys::SIGN_IN_STATE).await?;

    let (Some(returned_state), Some(stored_state)) = (query.state, stored_state) else {
        tracing::warn!("Sign-in callback without a pending state");
        return Ok(sign_in_failed("Your sign-in attempt expired. Please try again."));
    };
    if returned_state != stored_state {
        tracing::warn!("Sign-in state mismatch");
        return Ok(sign_in_failed("Your sign-in attempt expired. Please try again."));
    }

    let Some(token) = query.session_token.filter(|t| !t.is_empty()) else {
        tracing::warn!("Sign-in callback missing session token");
        return Ok(sign_in_failed("Sign-in did not complete. Please try again."));
    };

    let verified = match state.identity().verify_session(&token).await {
        Ok(verified) => verified,
        Err(IdentityError::InvalidSession) => {
            tracing::warn!("Identity provider rejected session token");
            return Ok(sign_in_failed("Sign-in did not complete. Please try again."));
        }
        Err(e) => return Err(e.into()),
    };

    // Provider usernames follow their own rules; only use one that fits ours.
    let preferred = verified
        .username
        .as_deref()
        .and_then(|name| name.parse::<Username>().ok());

    let user = state
        .users()
        .upsert_external(&verified.user_id, preferred.as_ref())
        .await?;

    // Fresh session id on privilege change
    session.cycle_id().await?;
    set_current_user(
        &session,
        &CurrentUser {
            external_id: verified.user_id.clone(),
        },
    )
    .await?;
    set_sentry_user(&verified.user_id, Some(&user.username));

    tracing::info!(user_id = %user.id, "User signed in");
    Ok(Redirect::to("/profile").into_response())
}

/// Sign out and return to the sign-in page.
///
/// # Route
///
/// `POST /sign-out`
#[tracing::instrument(skip_all)]
pub async fn sign_out(session: Session) -> Result<Redirect, AppError> {
    clear_current_user(&session).await?;
    session.flush().await?;
    clear_sentry_user();

    Ok(Redirect::to("/sign-in"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_state() {
        let a = generate_state();
        let b = generate_state();
        assert_eq!(a.len(), STATE_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_sign_in_failed_is_bad_request() {
        let response = sign_in_failed("nope");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

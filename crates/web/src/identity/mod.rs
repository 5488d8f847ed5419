//! Identity provider REST client.
//!
//! The identity provider owns sign-in, credentials and avatars. This client
//! covers the two server-side calls the site needs:
//!
//! - `GET  /v1/users/{id}` - account details (display image) for a profile
//! - `POST /v1/sessions/verify` - exchange a sign-in session token for a user id
//!
//! All calls authenticate with the secret key as a bearer token.
//!
//! # Example
//!
//! ```rust,ignore
//! use quill_web::identity::IdentityClient;
//!
//! let client = IdentityClient::new(&config.identity)?;
//! let account = client.get_user(&external_id).await?;
//! ```

mod types;

pub use types::VerifiedSession;

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use quill_core::ExternalId;

use crate::config::IdentityConfig;
use crate::models::ExternalAccount;
use crate::services::profile::AccountService;

use types::{ApiErrorBody, VerifySessionRequest};

/// Request timeout for identity provider calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur when talking to the identity provider.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with an unexpected status.
    #[error("identity API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body, if any.
        message: String,
    },

    /// The session token was rejected.
    #[error("invalid or expired session token")]
    InvalidSession,

    /// A configured URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Client for the identity provider REST API.
#[derive(Clone)]
pub struct IdentityClient {
    inner: Arc<IdentityClientInner>,
}

struct IdentityClientInner {
    client: reqwest::Client,
    api_url: String,
    secret_key: SecretString,
    sign_in_url: String,
}

impl IdentityClient {
    /// Create a new identity provider client.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Http` if the HTTP client cannot be built.
    pub fn new(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            inner: Arc::new(IdentityClientInner {
                client,
                api_url: config.api_url.clone(),
                secret_key: config.secret_key.clone(),
                sign_in_url: config.sign_in_url.clone(),
            }),
        })
    }

    /// Fetch account details for a user.
    ///
    /// Returns `Ok(None)` if the provider has no such user.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Http` on transport or decoding failures and
    /// `IdentityError::Api` for non-404 error statuses.
    #[tracing::instrument(skip(self))]
    pub async fn get_user(
        &self,
        id: &ExternalId,
    ) -> Result<Option<ExternalAccount>, IdentityError> {
        let url = format!("{}/v1/users/{}", self.inner.api_url, id.as_str());

        let response = self
            .inner
            .client
            .get(&url)
            .bearer_auth(self.inner.secret_key.expose_secret())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("Identity provider has no such user");
            return Ok(None);
        }

        let response = error_for_status(response).await?;
        Ok(Some(response.json::<ExternalAccount>().await?))
    }

    /// Verify a sign-in session token and return the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidSession` if the provider rejects the
    /// token, and `IdentityError::Http`/`IdentityError::Api` otherwise.
    #[tracing::instrument(skip_all)]
    pub async fn verify_session(&self, token: &str) -> Result<VerifiedSession, IdentityError> {
        let url = format!("{}/v1/sessions/verify", self.inner.api_url);

        let response = self
            .inner
            .client
            .post(&url)
            .bearer_auth(self.inner.secret_key.expose_secret())
            .json(&VerifySessionRequest { token })
            .send()
            .await?;

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND | StatusCode::GONE
        ) {
            return Err(IdentityError::InvalidSession);
        }

        let response = error_for_status(response).await?;
        let session = response.json::<VerifiedSession>().await?;

        if !session.is_active() {
            return Err(IdentityError::InvalidSession);
        }
        Ok(session)
    }

    /// Build the hosted sign-in URL the browser is redirected to.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidUrl` if the configured sign-in URL is invalid.
    pub fn sign_in_url(&self, redirect_url: &str, state: &str) -> Result<Url, IdentityError> {
        let mut url = Url::parse(&self.inner.sign_in_url)?;
        url.query_pairs_mut()
            .append_pair("redirect_url", redirect_url)
            .append_pair("state", state);
        Ok(url)
    }
}

impl AccountService for IdentityClient {
    async fn lookup_external_details(
        &self,
        identity: &ExternalId,
    ) -> Result<Option<ExternalAccount>, IdentityError> {
        self.get_user(identity).await
    }
}

/// Turn a non-success response into `IdentityError::Api`.
async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, IdentityError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(ApiErrorBody::into_message)
        .unwrap_or(body);

    Err(IdentityError::Api {
        status: status.as_u16(),
        message,
    })
}

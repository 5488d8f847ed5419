//! Wire types for the identity provider REST API.

use serde::{Deserialize, Serialize};

use quill_core::ExternalId;

/// Body of `POST /v1/sessions/verify`.
#[derive(Debug, Serialize)]
pub(super) struct VerifySessionRequest<'a> {
    pub token: &'a str,
}

/// A verified sign-in session.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifiedSession {
    /// Session id assigned by the provider.
    pub id: String,
    /// The signed-in user.
    pub user_id: ExternalId,
    /// Session status (`active`, `ended`, `expired`, ...).
    pub status: String,
    /// Username the user picked at sign-up, if any.
    #[serde(default)]
    pub username: Option<String>,
}

impl VerifiedSession {
    /// Whether the session is still usable.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// Error envelope returned by the provider on failures.
#[derive(Debug, Deserialize)]
pub(super) struct ApiErrorBody {
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl ApiErrorBody {
    pub(super) fn into_message(self) -> String {
        if self.errors.is_empty() {
            return "(no error details provided)".to_string();
        }
        self.errors
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_verified_session_deserializes() {
        let json = r#"{"id":"sess_1","user_id":"user_2abc","status":"active"}"#;
        let session: VerifiedSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.user_id.as_str(), "user_2abc");
        assert!(session.is_active());
        assert!(session.username.is_none());
    }

    #[test]
    fn test_inactive_session() {
        let json = r#"{"id":"sess_1","user_id":"user_2abc","status":"expired"}"#;
        let session: VerifiedSession = serde_json::from_str(json).unwrap();
        assert!(!session.is_active());
    }

    #[test]
    fn test_error_body_messages_joined() {
        let json = r#"{"errors":[{"message":"bad key"},{"message":"try again"}]}"#;
        let body: ApiErrorBody = serde_json::from_str(json).unwrap();
        assert_eq!(body.into_message(), "bad key; try again");
    }

    #[test]
    fn test_error_body_empty() {
        let body: ApiErrorBody = serde_json::from_str("{}").unwrap();
        assert_eq!(body.into_message(), "(no error details provided)");
    }
}

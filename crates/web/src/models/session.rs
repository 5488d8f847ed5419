//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use quill_core::ExternalId;

/// Session-stored caller identity.
///
/// Only the identity provider's id is kept; everything else is looked up per
/// request so profile edits show up immediately.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentUser {
    /// Identity provider user id.
    pub external_id: ExternalId,
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current signed-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the sign-in `state` parameter (CSRF protection).
    pub const SIGN_IN_STATE: &str = "sign_in_state";
}

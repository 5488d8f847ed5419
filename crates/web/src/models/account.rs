//! Identity provider account types.

use serde::Deserialize;

use quill_core::ExternalId;

/// Account details held by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExternalAccount {
    /// Identity provider user id.
    pub id: ExternalId,
    /// Avatar URL rendered on the profile page.
    pub image_url: String,
    /// Username chosen at sign-up, if the provider collects one.
    #[serde(default)]
    pub username: Option<String>,
    /// Given name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(default)]
    pub last_name: Option<String>,
}

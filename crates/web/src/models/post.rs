//! Post domain types.

use chrono::{DateTime, Utc};

use quill_core::{PostId, UserId};

/// A published blog post as listed on profile pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    /// Internal database id.
    pub id: PostId,
    /// Author's internal user id.
    pub author_id: UserId,
    /// Post title.
    pub title: String,
    /// Short summary shown on cards.
    pub excerpt: Option<String>,
    /// Cover image URL.
    pub cover_image_url: Option<String>,
    /// Publication timestamp.
    pub published_at: DateTime<Utc>,
}

impl PostRecord {
    /// Whether this post was written by `user_id`.
    #[must_use]
    pub fn is_authored_by(&self, user_id: UserId) -> bool {
        self.author_id == user_id
    }
}

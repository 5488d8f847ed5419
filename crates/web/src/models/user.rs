//! User domain types.

use quill_core::{ExternalId, UserId};

/// A local user record.
///
/// Mirrors an identity provider account; the provider owns credentials and
/// avatars, this record owns the public profile and the follow graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Internal database id.
    pub id: UserId,
    /// Identity provider id (unique).
    pub external_id: ExternalId,
    /// Public username.
    pub username: String,
    /// Optional short biography.
    pub bio: Option<String>,
    /// Users following this user.
    pub followers: Vec<UserId>,
    /// Users this user follows.
    pub following: Vec<UserId>,
}

impl UserRecord {
    /// Whether `user_id` follows this user.
    #[must_use]
    pub fn is_followed_by(&self, user_id: UserId) -> bool {
        self.followers.contains(&user_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_is_followed_by() {
        let user = UserRecord {
            id: UserId::new(1),
            external_id: ExternalId::parse("u1").unwrap(),
            username: "ada".to_string(),
            bio: None,
            followers: vec![UserId::new(2), UserId::new(5)],
            following: vec![],
        };

        assert!(user.is_followed_by(UserId::new(5)));
        assert!(!user.is_followed_by(UserId::new(3)));
    }
}

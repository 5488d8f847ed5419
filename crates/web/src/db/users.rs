//! User repository for database operations.
//!
//! Profiles are keyed by the identity provider's id; the follow graph is
//! loaded alongside each user so a profile page needs a single query.

use sqlx::{FromRow, PgPool};

use quill_core::{ExternalId, UserId, Username};

use super::{RepositoryError, conflict_on_unique};
use crate::models::UserRecord;
use crate::services::profile::UserDirectory;

/// Columns selected for every user query, including the follow graph.
const USER_COLUMNS: &str = r"
    u.id, u.external_id, u.username, u.bio,
    ARRAY(SELECT f.follower_id FROM quill.follow f
          WHERE f.followee_id = u.id ORDER BY f.created_at, f.follower_id) AS followers,
    ARRAY(SELECT f.followee_id FROM quill.follow f
          WHERE f.follower_id = u.id ORDER BY f.created_at, f.followee_id) AS following
";

#[derive(Debug, FromRow)]
struct UserRow {
    id: i32,
    external_id: String,
    username: String,
    bio: Option<String>,
    followers: Vec<i32>,
    following: Vec<i32>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let external_id = ExternalId::parse(&row.external_id).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid external id in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            external_id,
            username: row.username,
            bio: row.bio,
            followers: row.followers.into_iter().map(UserId::new).collect(),
            following: row.following.into_iter().map(UserId::new).collect(),
        })
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their identity provider id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored external id is invalid.
    pub async fn get_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<UserRecord>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM quill.user u WHERE u.external_id = $1");
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(external_id.as_str())
            .fetch_optional(self.pool)
            .await?;

        row.map(UserRecord::try_from).transpose()
    }

    /// Ensure a local user exists for an identity provider account.
    ///
    /// Tries `preferred_username` first and falls back to a name derived from
    /// the external id if that username is taken. Existing users are returned
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if neither username is available.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn upsert_external(
        &self,
        external_id: &ExternalId,
        preferred_username: Option<&Username>,
    ) -> Result<UserRecord, RepositoryError> {
        if let Some(existing) = self.get_by_external_id(external_id).await? {
            return Ok(existing);
        }

        let fallback = fallback_username(external_id);
        let candidates = preferred_username
            .map(Username::as_str)
            .into_iter()
            .chain(std::iter::once(fallback.as_str()));

        for username in candidates {
            // DO NOTHING covers both a concurrent sign-in for the same account
            // and a taken username; the re-read below tells them apart.
            sqlx::query(
                r"
                INSERT INTO quill.user (external_id, username)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(external_id.as_str())
            .bind(username)
            .execute(self.pool)
            .await?;

            if let Some(user) = self.get_by_external_id(external_id).await? {
                tracing::info!(user_id = %user.id, username = %user.username, "Local user ready");
                return Ok(user);
            }
        }

        Err(RepositoryError::Conflict(format!(
            "no available username for {external_id}"
        )))
    }

    /// Update a user's username and bio.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the username is taken.
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn update_profile(
        &self,
        id: UserId,
        username: &Username,
        bio: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE quill.user
            SET username = $2, bio = $3, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id.as_i32())
        .bind(username.as_str())
        .bind(bio)
        .execute(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "username"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Record that `follower` follows `followee`.
    ///
    /// Returns `true` if a new edge was created, `false` if it already existed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn follow(&self, follower: UserId, followee: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO quill.follow (follower_id, followee_id)
            VALUES ($1, $2)
            ON CONFLICT (follower_id, followee_id) DO NOTHING
            ",
        )
        .bind(follower.as_i32())
        .bind(followee.as_i32())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove the follow edge from `follower` to `followee`.
    ///
    /// Returns `true` if an edge was removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unfollow(
        &self,
        follower: UserId,
        followee: UserId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM quill.follow
            WHERE follower_id = $1 AND followee_id = $2
            ",
        )
        .bind(follower.as_i32())
        .bind(followee.as_i32())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl UserDirectory for UserRepository<'_> {
    async fn lookup_by_identity(
        &self,
        identity: &ExternalId,
    ) -> Result<Option<UserRecord>, RepositoryError> {
        self.get_by_external_id(identity).await
    }
}

/// Derive a valid username from an external id, e.g. `user_2abcXYZ` -> `user_2abcxyz`.
fn fallback_username(external_id: &ExternalId) -> String {
    let sanitized: String = external_id
        .as_str()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    let tail_start = sanitized.len().saturating_sub(Username::MAX_LENGTH - 5);
    let tail = sanitized.get(tail_start..).unwrap_or_default();
    let tail = tail.strip_prefix("user_").unwrap_or(tail);
    format!("user_{tail}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_username_is_valid() {
        let long = "Q".repeat(64);
        for raw in ["user_2abcXYZ", "a", "x-y-z", long.as_str()] {
            let id = ExternalId::parse(raw).unwrap();
            let name = fallback_username(&id);
            assert!(Username::parse(&name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn test_fallback_username_does_not_double_prefix() {
        let id = ExternalId::parse("user_2abcXYZ").unwrap();
        assert_eq!(fallback_username(&id), "user_2abcxyz");
    }

    #[test]
    fn test_fallback_username_keeps_tail_of_long_ids() {
        let id = ExternalId::parse(&format!("{}end", "a".repeat(40))).unwrap();
        let name = fallback_username(&id);
        assert!(name.ends_with("end"));
        assert!(name.len() <= Username::MAX_LENGTH);
    }

    /// Connect to a migrated database for the ignored tests below.
    async fn test_pool() -> PgPool {
        dotenvy::dotenv().ok();
        let url = std::env::var("QUILL_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .expect("QUILL_DATABASE_URL must be set");
        PgPool::connect(&url).await.expect("Failed to connect")
    }

    fn unique_external_id() -> ExternalId {
        ExternalId::parse(&format!("user_test_{}", uuid::Uuid::new_v4().simple())).unwrap()
    }

    #[tokio::test]
    #[ignore = "requires a migrated database (QUILL_DATABASE_URL)"]
    async fn test_upsert_external_is_idempotent() {
        let pool = test_pool().await;
        let users = UserRepository::new(&pool);
        let external_id = unique_external_id();

        let first = users.upsert_external(&external_id, None).await.unwrap();
        let second = users.upsert_external(&external_id, None).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.username, fallback_username(&external_id));
        assert!(first.followers.is_empty());
    }

    #[tokio::test]
    #[ignore = "requires a migrated database (QUILL_DATABASE_URL)"]
    async fn test_follow_graph_round_trip() {
        let pool = test_pool().await;
        let users = UserRepository::new(&pool);
        let a = users.upsert_external(&unique_external_id(), None).await.unwrap();
        let b = users.upsert_external(&unique_external_id(), None).await.unwrap();

        assert!(users.follow(a.id, b.id).await.unwrap());
        assert!(!users.follow(a.id, b.id).await.unwrap());

        let (a_id, b_id) = (a.external_id.clone(), b.external_id.clone());
        let a = users.get_by_external_id(&a_id).await.unwrap().unwrap();
        let b = users.get_by_external_id(&b_id).await.unwrap().unwrap();
        assert_eq!(b.followers, vec![a.id]);
        assert_eq!(a.following, vec![b.id]);
        assert!(b.is_followed_by(a.id));

        assert!(users.unfollow(a.id, b.id).await.unwrap());
        assert!(!users.unfollow(a.id, b.id).await.unwrap());

        let b = users.get_by_external_id(&b_id).await.unwrap().unwrap();
        assert!(b.followers.is_empty());
    }

    #[tokio::test]
    #[ignore = "requires a migrated database (QUILL_DATABASE_URL)"]
    async fn test_update_profile_rejects_taken_username() {
        let pool = test_pool().await;
        let users = UserRepository::new(&pool);
        let a = users.upsert_external(&unique_external_id(), None).await.unwrap();
        let b = users.upsert_external(&unique_external_id(), None).await.unwrap();

        let taken = Username::parse(&a.username).unwrap();
        let result = users.update_profile(b.id, &taken, Some("hi")).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));

        let mine = Username::parse(&b.username).unwrap();
        users.update_profile(b.id, &mine, None).await.unwrap();
    }
}

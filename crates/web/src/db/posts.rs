//! Post repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use quill_core::{PostId, UserId};

use super::RepositoryError;
use crate::models::PostRecord;
use crate::services::profile::PostStore;

#[derive(Debug, FromRow)]
struct PostRow {
    id: i32,
    author_id: i32,
    title: String,
    excerpt: Option<String>,
    cover_image_url: Option<String>,
    published_at: DateTime<Utc>,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: PostId::new(row.id),
            author_id: UserId::new(row.author_id),
            title: row.title,
            excerpt: row.excerpt,
            cover_image_url: row.cover_image_url,
            published_at: row.published_at,
        }
    }
}

/// Repository for post database operations.
pub struct PostRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PostRepository<'a> {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List every published post, newest first.
    ///
    /// Drafts (`published_at IS NULL`) are excluded.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_published(&self) -> Result<Vec<PostRecord>, RepositoryError> {
        let rows: Vec<PostRow> = sqlx::query_as(
            r"
            SELECT id, author_id, title, excerpt, cover_image_url, published_at
            FROM quill.post
            WHERE published_at IS NOT NULL
            ORDER BY published_at DESC, id DESC
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }
}

impl PostStore for PostRepository<'_> {
    async fn list_all(&self) -> Result<Vec<PostRecord>, RepositoryError> {
        self.list_published().await
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_row_maps_to_card_fields() {
        let published_at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).single().unwrap_or_default();
        let record = PostRecord::from(PostRow {
            id: 7,
            author_id: 3,
            title: "Notes on Note G".to_string(),
            excerpt: Some("Bernoulli numbers".to_string()),
            cover_image_url: None,
            published_at,
        });

        assert_eq!(record.id, PostId::new(7));
        assert!(record.is_authored_by(UserId::new(3)));
        assert_eq!(record.title, "Notes on Note G");
        assert_eq!(record.excerpt.as_deref(), Some("Bernoulli numbers"));
        assert_eq!(record.published_at, published_at);
    }
}

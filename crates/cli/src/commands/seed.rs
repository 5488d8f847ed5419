//! Seed the database with demo profiles, follows and posts.
//!
//! Demo users have external ids prefixed with `user_demo_`, so a local
//! identity provider sandbox can sign in as them. Seeding is idempotent:
//! users are upserted by external id and posts by slug.

use chrono::{Duration, Utc};
use sqlx::{Postgres, Transaction};
use tracing::info;

use quill_core::{ExternalId, UserId, Username};

use super::{CommandError, connect};

/// Prefix shared by every seeded external id.
const DEMO_PREFIX: &str = "user_demo_";

struct DemoUser {
    key: &'static str,
    username: &'static str,
    bio: Option<&'static str>,
}

struct DemoPost {
    author: &'static str,
    title: &'static str,
    slug: &'static str,
    excerpt: &'static str,
    /// Days before now; `None` seeds a draft.
    published_days_ago: Option<i64>,
}

const USERS: &[DemoUser] = &[
    DemoUser {
        key: "ada",
        username: "ada",
        bio: Some("Notes on engines, analytical and otherwise."),
    },
    DemoUser {
        key: "grace",
        username: "grace_h",
        bio: Some("Compilers, debugging, and the occasional moth."),
    },
    DemoUser {
        key: "linus",
        username: "linus",
        bio: None,
    },
];

/// (follower, followee)
const FOLLOWS: &[(&str, &str)] = &[("ada", "grace"), ("grace", "ada"), ("linus", "ada")];

const POSTS: &[DemoPost] = &[
    DemoPost {
        author: "ada",
        title: "On the Analytical Engine",
        slug: "on-the-analytical-engine",
        excerpt: "Why a machine that weaves algebra is more than a calculator.",
        published_days_ago: Some(30),
    },
    DemoPost {
        author: "grace",
        title: "Finding the First Bug",
        slug: "finding-the-first-bug",
        excerpt: "A relay, a moth, and a logbook entry.",
        published_days_ago: Some(12),
    },
    DemoPost {
        author: "ada",
        title: "Notes on Note G",
        slug: "notes-on-note-g",
        excerpt: "Computing Bernoulli numbers step by step.",
        published_days_ago: Some(3),
    },
    DemoPost {
        author: "grace",
        title: "Draft: Nanoseconds",
        slug: "draft-nanoseconds",
        excerpt: "A length of wire for every nanosecond.",
        published_days_ago: None,
    },
];

fn external_id(key: &str) -> Result<ExternalId, CommandError> {
    ExternalId::parse(&format!("{DEMO_PREFIX}{key}"))
        .map_err(|e| CommandError::InvalidSeed(format!("external id for {key}: {e}")))
}

fn username(user: &DemoUser) -> Result<Username, CommandError> {
    user.username
        .parse()
        .map_err(|e| CommandError::InvalidSeed(format!("username {}: {e}", user.username)))
}

fn user_id(ids: &[(&'static str, UserId)], key: &str) -> Result<UserId, CommandError> {
    ids.iter()
        .find(|(k, _)| *k == key)
        .map(|(_, id)| *id)
        .ok_or_else(|| CommandError::InvalidSeed(format!("unknown demo user {key}")))
}

/// Insert demo data.
///
/// # Errors
///
/// Returns an error if the database is unreachable or an insert fails.
pub async fn run(reset: bool) -> Result<(), CommandError> {
    let pool = connect().await?;
    let mut tx = pool.begin().await?;

    if reset {
        let deleted = sqlx::query("DELETE FROM quill.user WHERE starts_with(external_id, $1)")
            .bind(DEMO_PREFIX)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        info!(deleted, "Removed existing demo users");
    }

    let mut ids = Vec::with_capacity(USERS.len());
    for user in USERS {
        let id = upsert_user(&mut tx, user).await?;
        ids.push((user.key, id));
    }
    info!(users = ids.len(), "Demo users ready");

    for (follower, followee) in FOLLOWS {
        sqlx::query(
            r"
            INSERT INTO quill.follow (follower_id, followee_id)
            VALUES ($1, $2)
            ON CONFLICT (follower_id, followee_id) DO NOTHING
            ",
        )
        .bind(user_id(&ids, follower)?.as_i32())
        .bind(user_id(&ids, followee)?.as_i32())
        .execute(&mut *tx)
        .await?;
    }
    info!(follows = FOLLOWS.len(), "Demo follows ready");

    let now = Utc::now();
    let mut inserted = 0_u64;
    for post in POSTS {
        inserted += sqlx::query(
            r"
            INSERT INTO quill.post (author_id, title, slug, excerpt, published_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (slug) DO NOTHING
            ",
        )
        .bind(user_id(&ids, post.author)?.as_i32())
        .bind(post.title)
        .bind(post.slug)
        .bind(post.excerpt)
        .bind(post.published_days_ago.map(|days| now - Duration::days(days)))
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }
    info!(inserted, total = POSTS.len(), "Demo posts ready");

    tx.commit().await?;
    info!("Seeding complete!");
    Ok(())
}

async fn upsert_user(
    tx: &mut Transaction<'_, Postgres>,
    user: &DemoUser,
) -> Result<UserId, CommandError> {
    let external_id = external_id(user.key)?;
    let username = username(user)?;

    let id: i32 = sqlx::query_scalar(
        r"
        INSERT INTO quill.user (external_id, username, bio)
        VALUES ($1, $2, $3)
        ON CONFLICT (external_id)
        DO UPDATE SET username = EXCLUDED.username, bio = EXCLUDED.bio, updated_at = NOW()
        RETURNING id
        ",
    )
    .bind(external_id.as_str())
    .bind(username.as_str())
    .bind(user.bio)
    .fetch_one(&mut **tx)
    .await?;

    Ok(UserId::new(id))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_demo_users_are_valid() {
        for user in USERS {
            assert!(external_id(user.key).is_ok(), "{}", user.key);
            assert!(username(user).is_ok(), "{}", user.username);
        }
    }

    #[test]
    fn test_demo_follows_reference_known_users() {
        let keys: HashSet<_> = USERS.iter().map(|u| u.key).collect();
        for (follower, followee) in FOLLOWS {
            assert!(keys.contains(follower));
            assert!(keys.contains(followee));
            assert_ne!(follower, followee);
        }
    }

    #[test]
    fn test_demo_posts_have_unique_slugs_and_known_authors() {
        let keys: HashSet<_> = USERS.iter().map(|u| u.key).collect();
        let slugs: HashSet<_> = POSTS.iter().map(|p| p.slug).collect();
        assert_eq!(slugs.len(), POSTS.len());
        assert!(POSTS.iter().all(|p| keys.contains(p.author)));
    }

    #[test]
    fn test_user_id_lookup() {
        let ids = [("ada", UserId::new(7))];
        assert_eq!(user_id(&ids, "ada").unwrap(), UserId::new(7));
        assert!(matches!(
            user_id(&ids, "nobody"),
            Err(CommandError::InvalidSeed(_))
        ));
    }
}

//! Profile page resolution.
//!
//! [`ProfileResolver`] turns "who is asking" and "which profile" into either a
//! [`ResolvedProfileView`], a not-found outcome, or an error. It performs no
//! writes and keeps no state between calls.
//!
//! The three data sources are traits so handlers can pass the Postgres
//! repositories and the identity client while tests pass in-memory fakes:
//!
//! - [`UserDirectory`] - local user records by external id
//! - [`AccountService`] - identity provider account details (display image)
//! - [`PostStore`] - every published post, in display order

use std::future::Future;

use thiserror::Error;

use quill_core::{ExternalId, UserId};

use crate::db::RepositoryError;
use crate::identity::IdentityError;
use crate::models::{ExternalAccount, PostRecord, UserRecord};

/// Looks up local user records.
pub trait UserDirectory: Sync {
    /// Find the user mapped to `identity`, if any.
    fn lookup_by_identity(
        &self,
        identity: &ExternalId,
    ) -> impl Future<Output = Result<Option<UserRecord>, RepositoryError>> + Send;
}

/// Looks up identity provider account details.
pub trait AccountService: Sync {
    /// Find the provider account for `identity`, if any.
    fn lookup_external_details(
        &self,
        identity: &ExternalId,
    ) -> impl Future<Output = Result<Option<ExternalAccount>, IdentityError>> + Send;
}

/// Yields the full post collection.
pub trait PostStore: Sync {
    /// All posts in display order.
    fn list_all(&self) -> impl Future<Output = Result<Vec<PostRecord>, RepositoryError>> + Send;
}

/// A collaborator failed while resolving a profile.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// User lookup failed.
    #[error("user directory: {0}")]
    Directory(#[source] RepositoryError),

    /// Identity provider lookup failed.
    #[error("account service: {0}")]
    Accounts(#[source] IdentityError),

    /// Post listing failed.
    #[error("post store: {0}")]
    Posts(#[source] RepositoryError),
}

/// Reasons a profile could not be resolved.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// No signed-in caller; the request should be sent to sign-in.
    #[error("not signed in")]
    Unauthenticated,

    /// One of the lookups failed.
    #[error("upstream failure: {0}")]
    Upstream(#[from] UpstreamError),
}

/// Everything the profile template needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProfileView {
    /// Identity of the caller.
    pub viewer_identity: ExternalId,
    /// The caller's own record, if they have one.
    pub viewer: Option<UserRecord>,
    /// The profile being viewed.
    pub target_user: UserRecord,
    /// Avatar URL from the identity provider.
    pub target_display_image: String,
    /// Caller is looking at their own profile.
    pub is_own_profile: bool,
    /// Caller already follows the target.
    pub viewer_follows_target: bool,
    /// Posts written by the target, in store order.
    pub visible_posts: Vec<PostRecord>,
}

impl ResolvedProfileView {
    /// Whether to offer a follow/unfollow action.
    #[must_use]
    pub const fn can_follow(&self) -> bool {
        !self.is_own_profile && self.viewer.is_some()
    }
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileResolution {
    /// The profile exists.
    Found(Box<ResolvedProfileView>),
    /// The target has no local record or no provider account.
    NotFound,
}

/// Assembles profile views from the three data sources.
pub struct ProfileResolver<'a, D, A, P> {
    directory: &'a D,
    accounts: &'a A,
    posts: &'a P,
}

impl<'a, D, A, P> ProfileResolver<'a, D, A, P>
where
    D: UserDirectory,
    A: AccountService,
    P: PostStore,
{
    /// Create a resolver over borrowed collaborators.
    #[must_use]
    pub const fn new(directory: &'a D, accounts: &'a A, posts: &'a P) -> Self {
        Self {
            directory,
            accounts,
            posts,
        }
    }

    /// Resolve the profile page for `requested`, defaulting to the caller's own.
    ///
    /// The four lookups run concurrently; the first failure aborts the rest.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::Unauthenticated` if `viewer` is `None` (checked
    /// before any lookup) and `ProfileError::Upstream` if any lookup fails.
    #[tracing::instrument(skip(self), fields(profile = tracing::field::Empty))]
    pub async fn resolve(
        &self,
        viewer: Option<&ExternalId>,
        requested: Option<&ExternalId>,
    ) -> Result<ProfileResolution, ProfileError> {
        let viewer = viewer.ok_or(ProfileError::Unauthenticated)?;
        let target = requested.unwrap_or(viewer);
        tracing::Span::current().record("profile", target.as_str());

        let (viewer_user, target_user, account, posts) = tokio::try_join!(
            async {
                self.directory
                    .lookup_by_identity(viewer)
                    .await
                    .map_err(UpstreamError::Directory)
            },
            async {
                self.directory
                    .lookup_by_identity(target)
                    .await
                    .map_err(UpstreamError::Directory)
            },
            async {
                self.accounts
                    .lookup_external_details(target)
                    .await
                    .map_err(UpstreamError::Accounts)
            },
            async { self.posts.list_all().await.map_err(UpstreamError::Posts) },
        )?;

        let (Some(target_user), Some(account)) = (target_user, account) else {
            tracing::debug!("Profile not found");
            return Ok(ProfileResolution::NotFound);
        };

        let is_own_profile = *viewer == target_user.external_id;
        let viewer_follows_target = viewer_user
            .as_ref()
            .is_some_and(|v| target_user.is_followed_by(v.id));
        let visible_posts = posts_by_author(posts, target_user.id);

        Ok(ProfileResolution::Found(Box::new(ResolvedProfileView {
            viewer_identity: viewer.clone(),
            viewer: viewer_user,
            target_user,
            target_display_image: account.image_url,
            is_own_profile,
            viewer_follows_target,
            visible_posts,
        })))
    }
}

/// Keep only posts written by `author`, preserving order.
#[must_use]
pub fn posts_by_author(posts: Vec<PostRecord>, author: UserId) -> Vec<PostRecord> {
    posts
        .into_iter()
        .filter(|post| post.is_authored_by(author))
        .collect()
}

#[cfg(test)]
pub(crate) mod fakes {
    //! In-memory collaborators for resolver and route tests.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{TimeZone, Utc};

    use quill_core::{ExternalId, PostId, UserId};

    use super::{AccountService, PostStore, UserDirectory};
    use crate::db::RepositoryError;
    use crate::identity::IdentityError;
    use crate::models::{ExternalAccount, PostRecord, UserRecord};

    pub fn ext(id: &str) -> ExternalId {
        ExternalId::parse(id).unwrap_or_else(|e| panic!("bad test id {id}: {e}"))
    }

    pub fn user(id: i32, external: &str, username: &str) -> UserRecord {
        UserRecord {
            id: UserId::new(id),
            external_id: ext(external),
            username: username.to_string(),
            bio: None,
            followers: Vec::new(),
            following: Vec::new(),
        }
    }

    pub fn account(external: &str) -> ExternalAccount {
        ExternalAccount {
            id: ext(external),
            image_url: format!("https://img.example/{external}.png"),
            username: None,
            first_name: None,
            last_name: None,
        }
    }

    pub fn post(id: i32, author: &UserRecord) -> PostRecord {
        PostRecord {
            id: PostId::new(id),
            author_id: author.id,
            title: format!("Post {id}"),
            excerpt: None,
            cover_image_url: None,
            published_at: Utc
                .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_default()
                + chrono::Duration::hours(i64::from(id)),
        }
    }

    /// Users, accounts and posts with optional injected failures.
    #[derive(Default)]
    pub struct FakeWorld {
        pub users: HashMap<ExternalId, UserRecord>,
        pub accounts: HashMap<ExternalId, ExternalAccount>,
        pub posts: Vec<PostRecord>,
        pub fail_directory: bool,
        pub fail_accounts: bool,
        pub fail_posts: bool,
        pub calls: AtomicUsize,
    }

    impl FakeWorld {
        /// Add a user with a matching provider account.
        pub fn with_user(mut self, record: UserRecord) -> Self {
            let id = record.external_id.clone();
            self.accounts.insert(id.clone(), account(id.as_str()));
            self.users.insert(id, record);
            self
        }

        pub fn with_posts(mut self, posts: Vec<PostRecord>) -> Self {
            self.posts = posts;
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl UserDirectory for FakeWorld {
        async fn lookup_by_identity(
            &self,
            identity: &ExternalId,
        ) -> Result<Option<UserRecord>, RepositoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_directory {
                return Err(RepositoryError::DataCorruption("directory down".to_string()));
            }
            Ok(self.users.get(identity).cloned())
        }
    }

    impl AccountService for FakeWorld {
        async fn lookup_external_details(
            &self,
            identity: &ExternalId,
        ) -> Result<Option<ExternalAccount>, IdentityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_accounts {
                return Err(IdentityError::Api {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            Ok(self.accounts.get(identity).cloned())
        }
    }

    impl PostStore for FakeWorld {
        async fn list_all(&self) -> Result<Vec<PostRecord>, RepositoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_posts {
                return Err(RepositoryError::DataCorruption("posts down".to_string()));
            }
            Ok(self.posts.clone())
        }
    }
}

//! Profile route handlers.
//!
//! Viewing goes through [`ProfileResolver`]; editing and following write
//! straight to the user repository.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use quill_core::{ExternalId, Username};

use crate::db::RepositoryError;
use crate::error::AppError;
use crate::middleware::{OptionalAuth, RequireAuth, auth::SIGN_IN_PATH};
use crate::models::{CurrentUser, PostRecord, UserRecord};
use crate::services::profile::{
    ProfileError, ProfileResolution, ProfileResolver, ResolvedProfileView,
};
use crate::state::AppState;

/// Longest bio accepted, in characters.
pub const BIO_MAX_LENGTH: usize = 160;

// =============================================================================
// View Types
// =============================================================================

/// Profile header data for templates.
#[derive(Debug, Clone)]
pub struct ProfileView {
    pub external_id: String,
    pub username: String,
    pub bio: Option<String>,
    pub image_url: String,
    pub follower_count: usize,
    pub following_count: usize,
}

/// Post card data for templates.
#[derive(Debug, Clone)]
pub struct PostCardView {
    pub title: String,
    pub excerpt: Option<String>,
    pub cover_image_url: Option<String>,
    pub published_on: String,
}

impl From<PostRecord> for PostCardView {
    fn from(post: PostRecord) -> Self {
        Self {
            published_on: post.published_at.format("%B %-d, %Y").to_string(),
            title: post.title,
            excerpt: post.excerpt,
            cover_image_url: post.cover_image_url,
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Profile page template.
#[derive(Template, WebTemplate)]
#[template(path = "profile/show.html")]
pub struct ProfileTemplate {
    pub profile: ProfileView,
    pub posts: Vec<PostCardView>,
    pub is_own_profile: bool,
    pub can_follow: bool,
    pub viewer_follows: bool,
}

impl From<ResolvedProfileView> for ProfileTemplate {
    fn from(view: ResolvedProfileView) -> Self {
        let can_follow = view.can_follow();
        let ResolvedProfileView {
            target_user,
            target_display_image,
            is_own_profile,
            viewer_follows_target,
            visible_posts,
            ..
        } = view;

        Self {
            profile: ProfileView {
                external_id: target_user.external_id.to_string(),
                follower_count: target_user.followers.len(),
                following_count: target_user.following.len(),
                username: target_user.username,
                bio: target_user.bio,
                image_url: target_display_image,
            },
            posts: visible_posts.into_iter().map(PostCardView::from).collect(),
            is_own_profile,
            can_follow,
            viewer_follows: viewer_follows_target,
        }
    }
}

/// Profile not found page template.
#[derive(Template, WebTemplate)]
#[template(path = "profile/not_found.html")]
pub struct NotFoundTemplate;

/// Edit profile page template.
#[derive(Template, WebTemplate)]
#[template(path = "profile/edit.html")]
pub struct EditProfileTemplate {
    pub username: String,
    pub bio: String,
    pub error: Option<String>,
    pub bio_max_length: usize,
}

impl EditProfileTemplate {
    fn new(username: String, bio: String, error: Option<String>) -> Self {
        Self {
            username,
            bio,
            error,
            bio_max_length: BIO_MAX_LENGTH,
        }
    }
}

// =============================================================================
// Form Types
// =============================================================================

/// Edit profile form data.
#[derive(Debug, Deserialize)]
pub struct EditProfileForm {
    pub username: String,
    #[serde(default)]
    pub bio: String,
}

/// A validated profile edit.
#[derive(Debug, PartialEq, Eq)]
pub struct ProfileEdit {
    pub username: Username,
    pub bio: Option<String>,
}

impl EditProfileForm {
    /// Validate the form, returning a user-facing message on failure.
    ///
    /// # Errors
    ///
    /// Returns the message to show next to the form.
    pub fn validate(&self) -> Result<ProfileEdit, String> {
        let username = self
            .username
            .parse::<Username>()
            .map_err(|e| format!("Invalid username: {e}"))?;

        let bio = self.bio.trim();
        if bio.chars().count() > BIO_MAX_LENGTH {
            return Err(format!("Bio must be at most {BIO_MAX_LENGTH} characters"));
        }

        Ok(ProfileEdit {
            username,
            bio: (!bio.is_empty()).then(|| bio.to_string()),
        })
    }
}

// =============================================================================
// Profile Routes
// =============================================================================

/// Which profile a request asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RequestedProfile {
    Own,
    Id(ExternalId),
    /// The path segment can never name a user.
    Malformed,
}

impl RequestedProfile {
    fn from_path(segment: &str) -> Self {
        segment.parse().map_or(Self::Malformed, Self::Id)
    }
}

async fn resolve(
    state: &AppState,
    viewer: Option<&CurrentUser>,
    requested: &RequestedProfile,
) -> Result<ProfileResolution, ProfileError> {
    let viewer = viewer.map(|user| &user.external_id);
    let requested = match requested {
        RequestedProfile::Own => None,
        RequestedProfile::Id(id) => Some(id),
        RequestedProfile::Malformed => {
            // Same precedence as a well-formed id with no record
            return viewer
                .map(|_| ProfileResolution::NotFound)
                .ok_or(ProfileError::Unauthenticated);
        }
    };

    let users = state.users();
    let posts = state.posts();
    ProfileResolver::new(&users, state.identity(), &posts)
        .resolve(viewer, requested)
        .await
}

/// Map a resolution outcome to a response.
fn respond(outcome: Result<ProfileResolution, ProfileError>) -> Result<Response, AppError> {
    match outcome {
        Ok(ProfileResolution::Found(view)) => Ok(ProfileTemplate::from(*view).into_response()),
        Ok(ProfileResolution::NotFound) => {
            Ok((StatusCode::NOT_FOUND, NotFoundTemplate).into_response())
        }
        Err(ProfileError::Unauthenticated) => Ok(Redirect::to(SIGN_IN_PATH).into_response()),
        Err(ProfileError::Upstream(e)) => Err(AppError::Upstream(e)),
    }
}

/// Display the caller's own profile.
///
/// # Route
///
/// `GET /profile`
#[tracing::instrument(skip_all)]
pub async fn show_own(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
) -> Result<Response, AppError> {
    respond(resolve(&state, user.as_ref(), &RequestedProfile::Own).await)
}

/// Display a profile by identity provider id.
///
/// # Route
///
/// `GET /profile/{profile}`
#[tracing::instrument(skip(state, user))]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path(profile): Path<String>,
) -> Result<Response, AppError> {
    let requested = RequestedProfile::from_path(&profile);
    respond(resolve(&state, user.as_ref(), &requested).await)
}

// =============================================================================
// Edit Routes
// =============================================================================

async fn own_record(state: &AppState, user: &CurrentUser) -> Result<UserRecord, AppError> {
    state
        .users()
        .get_by_external_id(&user.external_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("no local profile for this account".to_string()))
}

/// Display the edit profile form.
///
/// # Route
///
/// `GET /profile/edit`
#[tracing::instrument(skip_all)]
pub async fn edit_page(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<EditProfileTemplate, AppError> {
    let record = own_record(&state, &user).await?;

    Ok(EditProfileTemplate::new(
        record.username,
        record.bio.unwrap_or_default(),
        None,
    ))
}

/// Save profile edits.
///
/// Invalid input and taken usernames re-render the form with the submitted
/// values and an error.
///
/// # Route
///
/// `POST /profile/edit`
#[tracing::instrument(skip_all)]
pub async fn save_edit(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<EditProfileForm>,
) -> Result<Response, AppError> {
    let edit = match form.validate() {
        Ok(edit) => edit,
        Err(message) => {
            let page = EditProfileTemplate::new(form.username, form.bio, Some(message));
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
        }
    };

    let record = own_record(&state, &user).await?;

    match state
        .users()
        .update_profile(record.id, &edit.username, edit.bio.as_deref())
        .await
    {
        Ok(()) => {
            tracing::info!(user_id = %record.id, "Profile updated");
            Ok(Redirect::to("/profile").into_response())
        }
        Err(RepositoryError::Conflict(_)) => {
            let page = EditProfileTemplate::new(
                form.username,
                form.bio,
                Some("That username is already taken".to_string()),
            );
            Ok((StatusCode::CONFLICT, page).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

// =============================================================================
// Follow Routes
// =============================================================================

/// Load both ends of a follow edge, rejecting self-follows.
async fn follow_pair(
    state: &AppState,
    user: &CurrentUser,
    profile: &str,
) -> Result<(UserRecord, UserRecord), AppError> {
    let not_found = || AppError::NotFound(format!("profile {profile}"));

    let RequestedProfile::Id(target_id) = RequestedProfile::from_path(profile) else {
        return Err(not_found());
    };
    if target_id == user.external_id {
        return Err(AppError::BadRequest("you cannot follow yourself".to_string()));
    }

    let viewer = own_record(state, user).await?;
    let target = state
        .users()
        .get_by_external_id(&target_id)
        .await?
        .ok_or_else(not_found)?;

    Ok((viewer, target))
}

fn back_to(target: &UserRecord) -> Redirect {
    Redirect::to(&format!("/profile/{}", target.external_id))
}

/// Follow a user. Following twice is a no-op.
///
/// # Route
///
/// `POST /profile/{profile}/follow`
#[tracing::instrument(skip(state, user))]
pub async fn follow(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(profile): Path<String>,
) -> Result<Redirect, AppError> {
    let (viewer, target) = follow_pair(&state, &user, &profile).await?;

    if state.users().follow(viewer.id, target.id).await? {
        tracing::info!(follower = %viewer.id, followee = %target.id, "Followed");
    }
    Ok(back_to(&target))
}

/// Unfollow a user. Unfollowing someone you don't follow is a no-op.
///
/// # Route
///
/// `POST /profile/{profile}/unfollow`
#[tracing::instrument(skip(state, user))]
pub async fn unfollow(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(profile): Path<String>,
) -> Result<Redirect, AppError> {
    let (viewer, target) = follow_pair(&state, &user, &profile).await?;

    if state.users().unfollow(viewer.id, target.id).await? {
        tracing::info!(follower = %viewer.id, followee = %target.id, "Unfollowed");
    }
    Ok(back_to(&target))
}

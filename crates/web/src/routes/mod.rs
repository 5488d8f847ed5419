//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                            - Redirect to own profile
//! GET  /health                      - Liveness
//! GET  /health/ready                - Readiness (database)
//!
//! # Profiles
//! GET  /profile                     - Own profile
//! GET  /profile/edit                - Edit form (requires auth)
//! POST /profile/edit                - Save edits (requires auth)
//! GET  /profile/{profile}           - Profile by identity provider id
//! POST /profile/{profile}/follow    - Follow (requires auth)
//! POST /profile/{profile}/unfollow  - Unfollow (requires auth)
//!
//! # Sign-in
//! GET  /sign-in                     - Redirect to hosted sign-in
//! GET  /auth/callback               - Complete sign-in
//! POST /sign-out                    - Sign out
//! ```

pub mod auth;
pub mod health;
pub mod profile;

use axum::{
    Router,
    response::Redirect,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the profile routes router.
pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(profile::show_own))
        .route("/edit", get(profile::edit_page).post(profile::save_edit))
        .route("/{profile}", get(profile::show))
        .route("/{profile}/follow", post(profile::follow))
        .route("/{profile}/unfollow", post(profile::unfollow))
}

/// Create all routes for the site.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { Redirect::to("/profile") }))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/profile", profile_routes())
        .route("/sign-in", get(auth::sign_in))
        .route("/auth/callback", get(auth::callback))
        .route("/sign-out", post(auth::sign_out))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn test_health() {
        let app = routes().with_state(AppState::for_tests());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_root_redirects_to_profile() {
        let app = routes().with_state(AppState::for_tests());
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/profile");
    }
}

//! Business logic services for the web crate.
//!
//! # Services
//!
//! - `profile` - Assemble the profile page view from the user directory,
//!   the identity provider and the post store

pub mod profile;

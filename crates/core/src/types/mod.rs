//! Core types for Quill.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod external_id;
pub mod id;
pub mod username;

pub use external_id::{ExternalId, ExternalIdError};
pub use id::*;
pub use username::{Username, UsernameError};

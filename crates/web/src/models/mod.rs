//! Domain models for the web crate.
//!
//! These are read models assembled by the repositories and the identity
//! client; route handlers turn them into template views.

pub mod account;
pub mod post;
pub mod session;
pub mod user;

pub use account::ExternalAccount;
pub use post::PostRecord;
pub use session::{CurrentUser, keys as session_keys};
pub use user::UserRecord;

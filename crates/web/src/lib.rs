//! Quill web library.
//!
//! Server-rendered profile pages for a blog site. The binary in `main.rs`
//! wires these modules into an axum server; the library split keeps the
//! handlers and the profile resolver testable.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

//! Study service integration
//!
//! Provides the HTTP client for generation, verification, history and
//! speech synthesis, plus identity token storage.

pub mod auth;
pub mod client;
pub mod models;

// Re-export commonly used types
pub use auth::{Credentials, Identity};
pub use client::ApiClient;

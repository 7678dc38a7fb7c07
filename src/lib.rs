//! Studyset - generate and work through study sets
//!
//! A source text or document is sent to a generation service that returns
//! ten multiple-choice questions, ten flashcards and a summary. Answers are
//! checked by a remote verifier, the summary can be narrated, and finished
//! sessions are kept in a remote history.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod history;
pub mod narration;
pub mod session;

pub use app::App;
pub use config::Config;
pub use error::SessionError;
pub use session::StudySession;

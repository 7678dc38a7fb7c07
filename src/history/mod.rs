//! Saved study sessions
//!
//! Entries are created only by an explicit save, never edited, and
//! removed one at a time or all at once.

pub mod model;
pub mod store;

pub use model::{HistoryDraft, HistoryEntry};
pub use store::HistoryStore;

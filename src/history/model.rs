//! History entry types

use serde::{Deserialize, Serialize};

use crate::session::model::{Flashcard, Mcq};

/// A saved study session, as returned by the history service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryEntry {
    pub id: String,
    pub source_type: String,
    pub source_preview: String,
    pub had_mcqs: bool,
    pub had_flashcards: bool,
    pub mcq_total: u32,
    pub mcq_correct: u32,
    pub mcqs: Vec<Mcq>,
    pub flashcards: Vec<Flashcard>,
    pub summary: String,
    /// ISO-8601 timestamp set by the service
    pub created_at: String,
    pub created_at_epoch: i64,
}

impl HistoryEntry {
    /// One-line description for listings
    pub fn headline(&self) -> String {
        let source = if self.source_type.is_empty() { "source" } else { &self.source_type };
        format!("Source: {} | MCQ Score: {}/{}", source, self.mcq_correct, self.mcq_total)
    }

    /// Preview text, or a placeholder
    pub fn preview(&self) -> &str {
        if self.source_preview.is_empty() { "(no preview)" } else { &self.source_preview }
    }
}

/// Snapshot sent when the user saves a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDraft {
    pub source_type: String,
    pub source_preview: String,
    pub had_mcqs: bool,
    pub had_flashcards: bool,
    pub mcq_total: u32,
    pub mcq_correct: u32,
    pub mcqs: Vec<Mcq>,
    pub flashcards: Vec<Flashcard>,
    pub summary: String,
}

//! Wire types for the study service

use serde::{Deserialize, Serialize};

use crate::history::HistoryEntry;
use crate::session::model::{Flashcard, Mcq};

/// Body of `POST /api/generate/study-set`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateResponse {
    pub mcqs: Option<Vec<Mcq>>,
    pub flashcards: Option<Vec<Flashcard>>,
    pub summary: Option<String>,
    #[serde(rename = "mcqSetId")]
    pub mcq_set_id: Option<String>,
    pub error: Option<String>,
}

/// Body sent to `POST /api/verify/mcq`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest<'a> {
    pub mcq_set_id: &'a str,
    pub question_index: usize,
    pub selected_answer: &'a str,
}

/// Verifier answer for one question
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyResponse {
    pub is_correct: Option<bool>,
    pub correct_answer: Option<String>,
    /// `-1` when the service could not resolve the position
    pub correct_index: Option<i64>,
    pub correct_option: Option<String>,
    pub explanation: Option<String>,
    pub error: Option<String>,
}

/// Body of `GET /api/history`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryListResponse {
    #[serde(default)]
    pub items: Vec<HistoryEntry>,
    /// Storage-side problem reported alongside an empty list
    pub message: Option<String>,
}

/// Body of `POST /api/history/session`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreResponse {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub stored: bool,
    pub error: Option<String>,
}

/// Body of `DELETE /api/history/{id}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteResponse {
    #[serde(default)]
    pub deleted: bool,
    pub message: Option<String>,
}

/// Body of `POST /api/history/clear`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClearResponse {
    #[serde(default)]
    pub cleared: u64,
    pub message: Option<String>,
}

/// Body sent to `POST /api/tts`
#[derive(Debug, Clone, Serialize)]
pub struct SpeechRequest<'a> {
    pub text: &'a str,
}

/// Error body any route may return
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    pub error: Option<String>,
    pub message: Option<String>,
}

impl ErrorBody {
    /// Best message carried by the body, if any
    pub fn into_message(self) -> Option<String> {
        self.error.or(self.message).filter(|m| !m.trim().is_empty())
    }
}

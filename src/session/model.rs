//! Study set data model

use serde::{Deserialize, Serialize};

use crate::api::models::GenerateResponse;
use crate::error::GenerationError;

use super::grading::is_correct_option;

/// Number of MCQs and flashcards every study set must carry
pub const STUDY_SET_SIZE: usize = 10;

/// A multiple-choice question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mcq {
    pub question: String,
    /// Label-prefixed options, e.g. "A) Mitochondria"
    #[serde(default)]
    pub options: Vec<String>,
    /// Advisory only; correctness always comes from the verifier
    #[serde(default)]
    pub answer: String,
}

/// A two-sided flashcard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
}

/// The generated bundle for one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudySet {
    /// Opaque verifier session id; `None` when the service did not issue one
    pub mcq_set_id: Option<String>,
    pub mcqs: Vec<Mcq>,
    pub flashcards: Vec<Flashcard>,
    pub summary: String,
}

impl StudySet {
    /// Validate a generation response, adopting it only when complete
    pub fn from_response(response: GenerateResponse) -> Result<Self, GenerationError> {
        if let Some(error) = response.error {
            return Err(GenerationError::Remote(error));
        }

        let (Some(mcqs), Some(flashcards)) = (response.mcqs, response.flashcards) else {
            return Err(GenerationError::InvalidShape);
        };
        if mcqs.len() != STUDY_SET_SIZE || flashcards.len() != STUDY_SET_SIZE {
            tracing::warn!(
                mcqs = mcqs.len(),
                flashcards = flashcards.len(),
                "Rejecting study set with wrong item counts"
            );
            return Err(GenerationError::InvalidShape);
        }

        Ok(Self {
            mcq_set_id: response.mcq_set_id.filter(|id| !id.trim().is_empty()),
            mcqs,
            flashcards,
            summary: response.summary.unwrap_or_default().trim().to_string(),
        })
    }
}

/// Server-confirmed result for one answered question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub selected_answer: String,
    pub is_correct: bool,
    pub correct_answer: String,
    pub correct_index: Option<usize>,
    pub correct_option: String,
    pub explanation: String,
}

impl Verdict {
    /// Whether the option at `index` is the correct one, for rendering
    pub fn marks_option_correct(&self, index: usize, option: &str) -> bool {
        match self.correct_index {
            Some(correct) => correct == index,
            None => is_correct_option(option, &self.correct_answer),
        }
    }
}

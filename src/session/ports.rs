//! Remote services consumed by a study session
//!
//! [`crate::api::ApiClient`] implements all of them over HTTP. Tests use
//! in-memory fakes.

use std::future::Future;

use crate::api::models::{GenerateResponse, VerifyResponse};
use crate::error::{AudioError, GenerationError, PersistenceError, VerificationError};
use crate::history::{HistoryDraft, HistoryEntry};

use super::source::Source;

/// Produces study material from a source
pub trait Generator: Send + Sync {
    /// Submit a source. Server-reported errors may come back either as
    /// `Err(Remote)` or inside the response's `error` field.
    fn generate(
        &self,
        source: &Source,
    ) -> impl Future<Output = Result<GenerateResponse, GenerationError>> + Send;
}

/// Checks one answer against the server-held answer key
pub trait Verifier: Send + Sync {
    fn verify(
        &self,
        mcq_set_id: &str,
        question_index: usize,
        selected_answer: &str,
    ) -> impl Future<Output = Result<VerifyResponse, VerificationError>> + Send;
}

/// Remote list of saved sessions
pub trait HistoryService: Send + Sync {
    fn list(
        &self,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<HistoryEntry>, PersistenceError>> + Send;

    /// Returns `Ok` only when the service confirmed `stored`
    fn create(
        &self,
        draft: &HistoryDraft,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    /// Returns `Ok` only when the service confirmed `deleted`
    fn delete_one(&self, id: &str) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    fn clear_all(&self) -> impl Future<Output = Result<(), PersistenceError>> + Send;
}

/// Turns text into playable audio bytes
pub trait Synthesizer: Send + Sync {
    fn synthesize(&self, text: &str) -> impl Future<Output = Result<Vec<u8>, AudioError>> + Send;
}

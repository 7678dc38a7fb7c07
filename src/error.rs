//! Error taxonomy for study sessions
//!
//! Every remote failure is converted into one of these families at the
//! component boundary. None of them is fatal: each leaves the session in
//! the stable state it had before the failing operation.

use thiserror::Error;

/// User-correctable problems detected locally, before any network call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InputError {
    /// Neither text nor a file is staged
    #[error("Enter text or upload a file first")]
    NoSource,

    /// "Regenerate" was requested before any successful generation
    #[error("No previous source found. Generate once first")]
    NoRetainedSource,

    /// A generation is already in flight
    #[error("A study set is already being generated")]
    Busy,

    /// The action needs a generated study set
    #[error("No study set yet. Generate one first")]
    NoResults,

    /// Narration was requested for an empty summary
    #[error("Summary is empty")]
    EmptySummary,

    /// Question index outside the current study set
    #[error("Question index {0} is out of range")]
    NoSuchQuestion(usize),

    /// Uploaded file has no content
    #[error("Uploaded file is empty")]
    EmptyFile,

    /// Answers cannot change while the session is being saved
    #[error("Saving to history. Try again once it finishes")]
    Saving,

    /// The session cannot be saved while answers are being checked
    #[error("Answers are still being checked. Save again once they finish")]
    AnswersPending,
}

/// Failures of the generation service
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    /// The response did not carry exactly 10 MCQs and 10 flashcards
    #[error("invalid result shape")]
    InvalidShape,

    /// The service reported an error
    #[error("remote failure: {0}")]
    Remote(String),

    /// The request never produced a response
    #[error("transport failure")]
    Transport,
}

/// Failures of answer verification
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerificationError {
    /// No `mcqSetId` is known for this session
    #[error("MCQ session missing. Please generate study set again")]
    MissingSession,

    /// The verifier rejected the request or returned an unusable body
    #[error("{0}")]
    Remote(String),

    /// The request never produced a response
    #[error("transport failure")]
    Transport,
}

/// Failures of the history service
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PersistenceError {
    /// The service answered but did not confirm the write
    #[error("{0}")]
    NotStored(String),

    /// The request never produced a response
    #[error("transport failure")]
    Transport,
}

/// Failures of either narration channel
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AudioError {
    /// No speech engine exists on this platform
    #[error("Text-to-speech is not available: {0}")]
    Unavailable(String),

    /// Audio synthesis failed
    #[error("{0}")]
    Remote(String),
}

/// Failures of the local identity store
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Failed to access system keyring
    #[error("Failed to access keyring: {0}")]
    Keyring(String),

    /// Token does not look like an identity token
    #[error("Invalid identity token format")]
    InvalidToken,
}

/// Any failure surfaced by a [`crate::session::StudySession`] operation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("Failed to generate study set: {0}")]
    Generation(#[from] GenerationError),

    #[error("Failed to verify answer: {0}")]
    Verification(#[from] VerificationError),

    #[error("Failed to update history: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Audio failed: {0}")]
    Audio(#[from] AudioError),
}

impl SessionError {
    /// Check if this is a notice the user can act on rather than a failure
    pub fn is_user_correctable(&self) -> bool {
        matches!(self, SessionError::Input(_))
    }

    /// Check if retrying the same action may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::Generation(GenerationError::Transport | GenerationError::Remote(_))
                | SessionError::Verification(
                    VerificationError::Transport | VerificationError::Remote(_)
                )
                | SessionError::Persistence(_)
                | SessionError::Audio(AudioError::Remote(_))
        )
    }
}

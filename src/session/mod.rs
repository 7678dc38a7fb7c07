//! Study sessions
//!
//! Source selection, the generated study set, answer verification and
//! the session lifecycle.

pub mod grading;
pub mod lifecycle;
pub mod model;
pub mod ports;
pub mod source;
pub mod state;

pub use lifecycle::{AnswerOutcome, StudySession};
pub use model::{Flashcard, Mcq, StudySet, Verdict};
pub use source::{InputMode, Source, SourceFile, SourceSelector};
pub use state::{Completion, Phase, Progress, SessionState};

//! Session state machine
//!
//! All transitions here are synchronous and deterministic. Async work is
//! split into a `begin_*` step that hands out a ticket stamped with the
//! current epoch and a `finish_*` step that applies the result only if the
//! epoch is unchanged. Every reset and every adopted study set advances
//! the epoch, so completions that raced with them are discarded.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{
    GenerationError, InputError, PersistenceError, SessionError, VerificationError,
};
use crate::history::HistoryDraft;

use super::model::{Mcq, StudySet, Verdict};
use super::source::{Source, SourceSelector};

/// Coarse lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No study set
    Empty,
    /// A generation request is in flight (a previous set may still be shown)
    Generating,
    /// A study set is available for answering
    Active,
}

/// Outcome of applying an async completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion<T> {
    /// The result was applied to the current session
    Applied(T),
    /// The session moved on while the request was in flight
    Stale,
}

/// Proof that a generation was started
#[derive(Debug, Clone)]
pub struct GenerationTicket {
    epoch: u64,
    source: Source,
}

impl GenerationTicket {
    /// Source being submitted
    pub fn source(&self) -> &Source {
        &self.source
    }
}

/// Proof that a verification was started for one question
#[derive(Debug, Clone)]
pub struct VerificationTicket {
    epoch: u64,
    index: usize,
    mcq_set_id: String,
    selected: String,
    mcq: Mcq,
}

impl VerificationTicket {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn mcq_set_id(&self) -> &str {
        &self.mcq_set_id
    }

    pub fn selected(&self) -> &str {
        &self.selected
    }

    pub fn mcq(&self) -> &Mcq {
        &self.mcq
    }
}

/// Proof that a save was started, carrying the snapshot to store
#[derive(Debug, Clone)]
pub struct SaveTicket {
    epoch: u64,
    draft: HistoryDraft,
}

impl SaveTicket {
    pub fn draft(&self) -> &HistoryDraft {
        &self.draft
    }
}

/// What to do with an answer the user just picked
#[derive(Debug, Clone)]
pub enum AnswerDecision {
    /// Issue the verification described by the ticket
    Verify(VerificationTicket),
    /// The question already has a verdict
    AlreadyAnswered,
    /// A verification for this question is in flight
    InFlight,
}

/// Derived score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub answered: usize,
    pub correct: usize,
    pub total: usize,
}

impl Progress {
    /// Every question has a verdict
    pub fn all_answered(&self) -> bool {
        self.total > 0 && self.answered == self.total
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.all_answered() {
            write!(f, "Final Score: {}/{}", self.correct, self.total)
        } else {
            write!(f, "Progress: {} correct out of {} answered", self.correct, self.answered)
        }
    }
}

/// Full state of one study session
#[derive(Debug, Default)]
pub struct SessionState {
    epoch: u64,
    selector: SourceSelector,
    study_set: Option<StudySet>,
    verdicts: BTreeMap<usize, Verdict>,
    pending: BTreeSet<usize>,
    retained: Option<Source>,
    generating: bool,
    /// Epoch in which a save was started; older values have expired
    saving: Option<u64>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current epoch
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn phase(&self) -> Phase {
        if self.generating {
            Phase::Generating
        } else if self.study_set.is_some() {
            Phase::Active
        } else {
            Phase::Empty
        }
    }

    pub fn selector(&self) -> &SourceSelector {
        &self.selector
    }

    pub fn selector_mut(&mut self) -> &mut SourceSelector {
        &mut self.selector
    }

    pub fn study_set(&self) -> Option<&StudySet> {
        self.study_set.as_ref()
    }

    /// Source of the current study set, kept for regeneration
    pub fn retained_source(&self) -> Option<&Source> {
        self.retained.as_ref()
    }

    pub fn verdict(&self, index: usize) -> Option<&Verdict> {
        self.verdicts.get(&index)
    }

    pub fn verdicts(&self) -> &BTreeMap<usize, Verdict> {
        &self.verdicts
    }

    pub fn is_pending(&self, index: usize) -> bool {
        self.pending.contains(&index)
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    /// A save of the current results is in flight
    pub fn is_saving(&self) -> bool {
        self.saving == Some(self.epoch)
    }

    /// Start generating from the staged input
    pub fn begin_generation(&mut self) -> Result<GenerationTicket, InputError> {
        if self.generating {
            return Err(InputError::Busy);
        }
        let source = self.selector.current().ok_or(InputError::NoSource)?;
        Ok(self.start_generation(source))
    }

    /// Start generating again from the retained source
    pub fn begin_regeneration(&mut self) -> Result<GenerationTicket, InputError> {
        if self.generating {
            return Err(InputError::Busy);
        }
        let source = self.retained.clone().ok_or(InputError::NoRetainedSource)?;
        Ok(self.start_generation(source))
    }

    fn start_generation(&mut self, source: Source) -> GenerationTicket {
        self.generating = true;
        tracing::debug!(epoch = self.epoch, kind = source.kind(), "Generation started");
        GenerationTicket { epoch: self.epoch, source }
    }

    /// Apply a generation result
    ///
    /// On success the set replaces any previous one and all verdicts and
    /// pending flags are dropped. On failure the prior state is untouched.
    pub fn finish_generation(
        &mut self,
        ticket: GenerationTicket,
        result: Result<StudySet, GenerationError>,
    ) -> Result<Completion<()>, GenerationError> {
        if ticket.epoch != self.epoch {
            tracing::debug!(
                ticket = ticket.epoch,
                current = self.epoch,
                "Discarding stale generation result"
            );
            return Ok(Completion::Stale);
        }
        self.generating = false;

        let study_set = result?;
        self.epoch += 1;
        self.verdicts.clear();
        self.pending.clear();
        self.study_set = Some(study_set);
        self.retained = Some(ticket.source);
        Ok(Completion::Applied(()))
    }

    /// Decide whether an answer for `index` should be verified
    ///
    /// Marks the question pending when a verification is to be issued.
    pub fn begin_answer(
        &mut self,
        index: usize,
        selected: &str,
    ) -> Result<AnswerDecision, SessionError> {
        let study_set = self.study_set.as_ref().ok_or(InputError::NoResults)?;
        let mcq = study_set.mcqs.get(index).ok_or(InputError::NoSuchQuestion(index))?;

        if self.verdicts.contains_key(&index) {
            return Ok(AnswerDecision::AlreadyAnswered);
        }
        if self.pending.contains(&index) {
            return Ok(AnswerDecision::InFlight);
        }
        // The snapshot being saved must match what is shown
        if self.is_saving() {
            return Err(InputError::Saving.into());
        }
        let mcq_set_id =
            study_set.mcq_set_id.clone().ok_or(VerificationError::MissingSession)?;

        let ticket = VerificationTicket {
            epoch: self.epoch,
            index,
            mcq_set_id,
            selected: selected.to_string(),
            mcq: mcq.clone(),
        };
        self.pending.insert(index);
        Ok(AnswerDecision::Verify(ticket))
    }

    /// Apply a verification result, clearing the pending flag either way
    pub fn finish_answer(
        &mut self,
        ticket: VerificationTicket,
        result: Result<Verdict, VerificationError>,
    ) -> Result<Completion<Verdict>, VerificationError> {
        if ticket.epoch != self.epoch {
            tracing::debug!(index = ticket.index, "Discarding stale verification result");
            return Ok(Completion::Stale);
        }
        self.pending.remove(&ticket.index);

        let verdict = result?;
        let stored = self.verdicts.entry(ticket.index).or_insert(verdict);
        Ok(Completion::Applied(stored.clone()))
    }

    /// Derived score over the stored verdicts
    pub fn progress(&self) -> Progress {
        Progress {
            answered: self.verdicts.len(),
            correct: self.verdicts.values().filter(|v| v.is_correct).count(),
            total: self.study_set.as_ref().map_or(0, |s| s.mcqs.len()),
        }
    }

    /// Start saving the current results
    ///
    /// Refused while answers are being checked, so no verdict can land
    /// between the snapshot and the reset that follows a confirmed save.
    pub fn begin_save(&mut self) -> Result<SaveTicket, InputError> {
        let draft = self.history_draft()?;
        if self.is_saving() {
            return Err(InputError::Saving);
        }
        if !self.pending.is_empty() {
            return Err(InputError::AnswersPending);
        }
        self.saving = Some(self.epoch);
        Ok(SaveTicket { epoch: self.epoch, draft })
    }

    /// Apply the outcome of a save: reset on confirmation, keep everything
    /// on failure
    ///
    /// A save that succeeds after the session moved on leaves the newer
    /// session alone and reports `Stale`.
    pub fn finish_save(
        &mut self,
        ticket: SaveTicket,
        result: Result<(), PersistenceError>,
    ) -> Result<Completion<()>, PersistenceError> {
        let current = ticket.epoch == self.epoch;
        if current {
            self.saving = None;
        }
        result?;

        if !current {
            tracing::debug!("Session changed while saving; leaving it in place");
            return Ok(Completion::Stale);
        }
        self.reset();
        Ok(Completion::Applied(()))
    }

    /// Snapshot of the current results for saving
    fn history_draft(&self) -> Result<HistoryDraft, InputError> {
        let study_set = self.study_set.as_ref().ok_or(InputError::NoResults)?;
        let source = self.retained.clone().or_else(|| self.selector.current());
        let progress = self.progress();

        Ok(HistoryDraft {
            source_type: source.as_ref().map_or("text", Source::kind).to_string(),
            source_preview: source.as_ref().map(Source::preview).unwrap_or_default(),
            had_mcqs: !study_set.mcqs.is_empty(),
            had_flashcards: !study_set.flashcards.is_empty(),
            mcq_total: progress.total as u32,
            mcq_correct: progress.correct as u32,
            mcqs: study_set.mcqs.clone(),
            flashcards: study_set.flashcards.clone(),
            summary: study_set.summary.clone(),
        })
    }

    /// Drop everything and return to `Empty`
    pub fn reset(&mut self) {
        let epoch = self.epoch + 1;
        *self = Self { epoch, ..Self::default() };
        tracing::debug!(epoch, "Session reset");
    }
}

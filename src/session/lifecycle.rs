//! Study session orchestration
//!
//! [`StudySession`] drives the [`SessionState`] machine against the remote
//! ports. Methods take `&self` so several requests (one verification per
//! question, generation, history, audio) can be in flight at once. The
//! state lock is never held across an await.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::SessionError;
use crate::history::HistoryStore;
use crate::narration::{NarrationController, SpeechEngine, SpeechToggle};

use super::grading::resolve_verdict;
use super::model::{StudySet, Verdict};
use super::ports::{Generator, HistoryService, Synthesizer, Verifier};
use super::source::SourceFile;
use super::state::{
    AnswerDecision, Completion, GenerationTicket, Phase, Progress, SessionState,
};

/// Result of answering a question
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// The verifier's verdict was stored
    Recorded(Verdict),
    /// The question was answered before; nothing was sent
    AlreadyAnswered,
    /// A verification for this question is still running; nothing was sent
    InFlight,
    /// The session was reset or replaced while verifying
    Discarded,
}

/// One user's study session
pub struct StudySession<B> {
    backend: Arc<B>,
    state: Mutex<SessionState>,
    history: HistoryStore<B>,
    narration: NarrationController,
}

impl<B> StudySession<B>
where
    B: Generator + Verifier + HistoryService + Synthesizer,
{
    pub fn new(backend: Arc<B>, speech: Arc<dyn SpeechEngine>, history_limit: u32) -> Self {
        Self {
            history: HistoryStore::new(Arc::clone(&backend), history_limit),
            narration: NarrationController::new(speech),
            state: Mutex::new(SessionState::new()),
            backend,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read the current state
    pub fn inspect<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        f(&self.lock())
    }

    pub fn history(&self) -> &HistoryStore<B> {
        &self.history
    }

    pub fn narration(&self) -> &NarrationController {
        &self.narration
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase()
    }

    pub fn progress(&self) -> Progress {
        self.lock().progress()
    }

    pub fn study_set(&self) -> Option<StudySet> {
        self.lock().study_set().cloned()
    }

    pub fn verdict(&self, index: usize) -> Option<Verdict> {
        self.lock().verdict(index).cloned()
    }

    /// Stage typed text
    pub fn set_text(&self, value: impl Into<String>) {
        self.lock().selector_mut().set_text(value);
    }

    /// Stage or clear an uploaded file
    pub fn set_file(&self, file: Option<SourceFile>) {
        self.lock().selector_mut().set_file(file);
    }

    /// Drop whatever text or file is staged
    pub fn clear_input(&self) {
        self.lock().selector_mut().clear();
    }

    /// Generate a study set from the staged input
    pub async fn generate(&self) -> Result<Completion<()>, SessionError> {
        let ticket = self.lock().begin_generation()?;
        self.run_generation(ticket).await
    }

    /// Generate a fresh study set from the source of the current one
    pub async fn regenerate(&self) -> Result<Completion<()>, SessionError> {
        let ticket = self.lock().begin_regeneration()?;
        self.run_generation(ticket).await
    }

    async fn run_generation(
        &self,
        ticket: GenerationTicket,
    ) -> Result<Completion<()>, SessionError> {
        let result = match self.backend.generate(ticket.source()).await {
            Ok(response) => StudySet::from_response(response),
            Err(e) => Err(e),
        };

        let completion = self.lock().finish_generation(ticket, result);
        let completion =
            completion.inspect_err(|e| tracing::warn!("Generation failed: {}", e))?;

        if completion == Completion::Applied(()) {
            tracing::info!("Study set generated: 10 MCQs + 10 flashcards");
            // Audio belonged to the previous summary
            self.narration.release_audio();
            if self.history.refresh().await.is_err() {
                tracing::debug!("History refresh after generation failed");
            }
        }
        Ok(completion)
    }

    /// Answer question `index` with the chosen option
    ///
    /// At most one verification per question is ever in flight, and a
    /// question with a verdict is never sent again.
    pub async fn answer(&self, index: usize, selected: &str) -> Result<AnswerOutcome, SessionError> {
        let decision = self.lock().begin_answer(index, selected)?;
        let ticket = match decision {
            AnswerDecision::Verify(ticket) => ticket,
            AnswerDecision::AlreadyAnswered => return Ok(AnswerOutcome::AlreadyAnswered),
            AnswerDecision::InFlight => return Ok(AnswerOutcome::InFlight),
        };

        let result = match self
            .backend
            .verify(ticket.mcq_set_id(), ticket.index(), ticket.selected())
            .await
        {
            Ok(response) => resolve_verdict(ticket.mcq(), ticket.selected(), response),
            Err(e) => Err(e),
        };

        let completion = self.lock().finish_answer(ticket, result);
        match completion {
            Ok(Completion::Applied(verdict)) => Ok(AnswerOutcome::Recorded(verdict)),
            Ok(Completion::Stale) => Ok(AnswerOutcome::Discarded),
            Err(e) => {
                tracing::warn!(index, "Verification failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Drop all results and input without saving
    pub fn discard(&self) {
        self.narration.reset();
        self.lock().reset();
    }

    /// Save the results to history, then start over
    ///
    /// Nothing is cleared unless the service confirms the write, and no
    /// answer can be recorded while the save is in flight. Returns `Stale`
    /// when the save succeeded but the session had already moved on
    /// (reset or replaced) and was left as is.
    pub async fn save_and_start_new(&self) -> Result<Completion<()>, SessionError> {
        let ticket = self.lock().begin_save()?;
        let result = self.history.create(ticket.draft()).await;

        let completion = self.lock().finish_save(ticket, result)?;
        if completion == Completion::Stale {
            return Ok(completion);
        }

        self.narration.reset();
        if self.history.refresh().await.is_err() {
            tracing::debug!("History refresh after save failed");
        }
        Ok(Completion::Applied(()))
    }

    fn summary(&self) -> String {
        self.lock().study_set().map(|s| s.summary.clone()).unwrap_or_default()
    }

    /// Toggle live speech of the summary
    pub fn speak_summary(&self) -> Result<SpeechToggle, SessionError> {
        self.narration.speak(&self.summary())
    }

    /// Synthesize the summary into a playable file
    pub async fn generate_audio(&self) -> Result<Completion<PathBuf>, SessionError> {
        let summary = self.summary();
        self.narration.generate_audio(self.backend.as_ref(), &summary).await
    }

    /// The user switched away
    pub fn on_focus_lost(&self) {
        self.narration.on_focus_lost();
    }

    /// The view is no longer visible
    pub fn on_hidden(&self) {
        self.narration.on_hidden();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;
    use tokio::sync::Notify;

    use crate::api::models::{GenerateResponse, VerifyResponse};
    use crate::error::{
        AudioError, GenerationError, InputError, PersistenceError, VerificationError,
    };
    use crate::history::store::fakes::MemoryHistory;
    use crate::history::{HistoryDraft, HistoryEntry};
    use crate::narration::NoSpeech;
    use crate::session::model::fixtures::response;
    use crate::session::source::Source;

    #[derive(Default)]
    struct FakeBackend {
        generated: Mutex<VecDeque<Result<GenerateResponse, GenerationError>>>,
        generate_gate: Option<Arc<Notify>>,
        verify_gate: Option<Arc<Notify>>,
        save_gate: Option<Arc<Notify>>,
        verify_error: Mutex<Option<VerificationError>>,
        verify_calls: AtomicUsize,
        sources: Mutex<Vec<Source>>,
        history: MemoryHistory,
    }

    impl FakeBackend {
        fn with_sets(ids: &[&str]) -> Self {
            let generated = ids.iter().map(|id| Ok(response(10, 10, id))).collect();
            Self { generated: Mutex::new(generated), ..Default::default() }
        }

        fn push(&self, result: Result<GenerateResponse, GenerationError>) {
            self.generated.lock().unwrap().push_back(result);
        }
    }

    impl Generator for FakeBackend {
        async fn generate(&self, source: &Source) -> Result<GenerateResponse, GenerationError> {
            self.sources.lock().unwrap().push(source.clone());
            if let Some(gate) = &self.generate_gate {
                gate.notified().await;
            }
            self.generated.lock().unwrap().pop_front().unwrap_or(Err(GenerationError::Transport))
        }
    }

    impl Verifier for FakeBackend {
        async fn verify(
            &self,
            mcq_set_id: &str,
            question_index: usize,
            selected_answer: &str,
        ) -> Result<VerifyResponse, VerificationError> {
            assert_eq!(mcq_set_id, "abc123");
            self.verify_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.verify_gate {
                gate.notified().await;
            } else {
                tokio::task::yield_now().await;
            }
            if let Some(err) = self.verify_error.lock().unwrap().clone() {
                return Err(err);
            }
            let correct = selected_answer.starts_with("C)");
            Ok(VerifyResponse {
                is_correct: Some(correct),
                correct_answer: Some("C) Chloroplast".into()),
                correct_index: Some(2),
                correct_option: Some("C) Chloroplast".into()),
                explanation: Some(format!("Checked question {question_index}.")),
                error: None,
            })
        }
    }

    impl HistoryService for FakeBackend {
        async fn list(&self, limit: u32) -> Result<Vec<HistoryEntry>, PersistenceError> {
            self.history.list(limit).await
        }

        async fn create(&self, draft: &HistoryDraft) -> Result<(), PersistenceError> {
            if let Some(gate) = &self.save_gate {
                gate.notified().await;
            }
            self.history.create(draft).await
        }

        async fn delete_one(&self, id: &str) -> Result<(), PersistenceError> {
            self.history.delete_one(id).await
        }

        async fn clear_all(&self) -> Result<(), PersistenceError> {
            self.history.clear_all().await
        }
    }

    impl Synthesizer for FakeBackend {
        async fn synthesize(&self, _text: &str) -> Result<Vec<u8>, AudioError> {
            Ok(b"ID3".to_vec())
        }
    }

    fn session(backend: FakeBackend) -> (Arc<FakeBackend>, StudySession<FakeBackend>) {
        let backend = Arc::new(backend);
        let session = StudySession::new(backend.clone(), Arc::new(NoSpeech), 25);
        (backend, session)
    }

    async fn active(backend: FakeBackend) -> (Arc<FakeBackend>, StudySession<FakeBackend>) {
        let (backend, session) = session(backend);
        session.set_text("Photosynthesis converts light to energy");
        assert_eq!(session.generate().await.unwrap(), Completion::Applied(()));
        (backend, session)
    }

    #[tokio::test]
    async fn generate_without_source_is_a_notice() {
        let (backend, session) = session(FakeBackend::with_sets(&["abc123"]));
        let err = session.generate().await.unwrap_err();
        assert_eq!(err, SessionError::Input(InputError::NoSource));
        assert!(err.is_user_correctable());
        assert!(backend.sources.lock().unwrap().is_empty());
        assert_eq!(session.phase(), Phase::Empty);
    }

    #[tokio::test]
    async fn generate_activates_session() {
        let (_, session) = active(FakeBackend::with_sets(&["abc123"])).await;
        assert_eq!(session.phase(), Phase::Active);
        let progress = session.progress();
        assert_eq!(progress.answered, 0);
        assert!(!progress.all_answered());
        assert_eq!(session.study_set().unwrap().mcq_set_id.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn short_result_is_rejected_wholesale() {
        let (backend, session) = session(FakeBackend::default());
        backend.push(Ok(response(9, 10, "abc123")));
        session.set_text("Photosynthesis");

        let err = session.generate().await.unwrap_err();
        assert_eq!(err, SessionError::Generation(GenerationError::InvalidShape));
        assert_eq!(session.phase(), Phase::Empty);
        assert!(session.inspect(|s| s.selector().can_generate()));
    }

    #[tokio::test]
    async fn verdict_is_recorded_once() {
        let (backend, session) = active(FakeBackend::with_sets(&["abc123"])).await;

        let outcome = session.answer(3, "B) Mitochondria").await.unwrap();
        let AnswerOutcome::Recorded(verdict) = outcome else {
            panic!("expected a verdict, got {outcome:?}");
        };
        assert!(!verdict.is_correct);
        assert_eq!(verdict.correct_index, Some(2));

        assert_eq!(
            session.answer(3, "C) Chloroplast").await.unwrap(),
            AnswerOutcome::AlreadyAnswered
        );
        assert_eq!(backend.verify_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.verdict(3).unwrap().selected_answer, "B) Mitochondria");
    }

    #[tokio::test]
    async fn rapid_repeat_sends_one_request() {
        let (backend, session) = active(FakeBackend::with_sets(&["abc123"])).await;

        let (first, second) =
            tokio::join!(session.answer(0, "C) Chloroplast"), session.answer(0, "A) Nucleus"));
        assert!(matches!(first.unwrap(), AnswerOutcome::Recorded(_)));
        assert_eq!(second.unwrap(), AnswerOutcome::InFlight);
        assert_eq!(backend.verify_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_questions_verify_concurrently() {
        let (backend, session) = active(FakeBackend::with_sets(&["abc123"])).await;

        let (a, b, c) = tokio::join!(
            session.answer(0, "C) Chloroplast"),
            session.answer(1, "A) Nucleus"),
            session.answer(2, "C) Chloroplast"),
        );
        for outcome in [a, b, c] {
            assert!(matches!(outcome.unwrap(), AnswerOutcome::Recorded(_)));
        }
        assert_eq!(backend.verify_calls.load(Ordering::SeqCst), 3);
        assert_eq!(session.progress(), Progress { answered: 3, correct: 2, total: 10 });
    }

    #[tokio::test]
    async fn failed_verification_can_be_retried() {
        let (backend, session) = active(FakeBackend::with_sets(&["abc123"])).await;
        *backend.verify_error.lock().unwrap() =
            Some(VerificationError::Remote("MCQ session expired".into()));

        let err = session.answer(1, "A) Nucleus").await.unwrap_err();
        assert_eq!(
            err,
            SessionError::Verification(VerificationError::Remote("MCQ session expired".into()))
        );
        assert!(!session.inspect(|s| s.is_pending(1)));

        *backend.verify_error.lock().unwrap() = None;
        assert!(matches!(
            session.answer(1, "A) Nucleus").await.unwrap(),
            AnswerOutcome::Recorded(_)
        ));
    }

    #[tokio::test]
    async fn verification_after_discard_is_dropped() {
        let gate = Arc::new(Notify::new());
        let backend =
            FakeBackend { verify_gate: Some(gate.clone()), ..FakeBackend::with_sets(&["abc123"]) };
        let (_, session) = active(backend).await;

        let (outcome, ()) = tokio::join!(session.answer(3, "C) Chloroplast"), async {
            tokio::task::yield_now().await;
            session.discard();
            gate.notify_one();
        });

        assert_eq!(outcome.unwrap(), AnswerOutcome::Discarded);
        assert_eq!(session.phase(), Phase::Empty);
        assert!(session.verdict(3).is_none());
    }

    #[tokio::test]
    async fn generation_after_discard_is_dropped() {
        let gate = Arc::new(Notify::new());
        let backend = FakeBackend {
            generate_gate: Some(gate.clone()),
            ..FakeBackend::with_sets(&["abc123"])
        };
        let (_, session) = session(backend);
        session.set_text("Photosynthesis");

        let (result, ()) = tokio::join!(session.generate(), async {
            tokio::task::yield_now().await;
            assert_eq!(session.phase(), Phase::Generating);
            session.discard();
            gate.notify_one();
        });

        assert_eq!(result.unwrap(), Completion::Stale);
        assert_eq!(session.phase(), Phase::Empty);
        assert!(session.study_set().is_none());
    }

    #[tokio::test]
    async fn regenerate_uses_retained_source() {
        let (backend, session) = active(FakeBackend::with_sets(&["abc123", "abc123"])).await;
        session.answer(0, "C) Chloroplast").await.unwrap();
        session.set_text("something else typed later");

        assert_eq!(session.regenerate().await.unwrap(), Completion::Applied(()));
        let sources = backend.sources.lock().unwrap().clone();
        assert_eq!(sources[0], sources[1]);
        assert_eq!(session.progress().answered, 0);
    }

    #[tokio::test]
    async fn failed_regenerate_keeps_results() {
        let (_, session) = active(FakeBackend::with_sets(&["abc123"])).await;
        session.answer(0, "C) Chloroplast").await.unwrap();

        let err = session.regenerate().await.unwrap_err();
        assert_eq!(err, SessionError::Generation(GenerationError::Transport));
        assert_eq!(session.phase(), Phase::Active);
        assert_eq!(session.progress().answered, 1);
    }

    #[tokio::test]
    async fn regenerate_without_source_is_a_notice() {
        let (_, session) = session(FakeBackend::default());
        assert_eq!(
            session.regenerate().await.unwrap_err(),
            SessionError::Input(InputError::NoRetainedSource)
        );
    }

    #[tokio::test]
    async fn discard_clears_everything() {
        let (backend, session) = active(FakeBackend::with_sets(&["abc123"])).await;
        session.answer(0, "C) Chloroplast").await.unwrap();
        session.generate_audio().await.unwrap();

        session.discard();
        assert_eq!(session.phase(), Phase::Empty);
        assert_eq!(session.progress(), Progress::default());
        assert!(!session.inspect(|s| s.selector().can_generate()));
        assert!(session.narration().status().audio_path.is_none());
        assert!(backend.history.drafts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_clears_only_after_confirmation() {
        let (backend, session) = active(FakeBackend::with_sets(&["abc123"])).await;
        session.answer(2, "C) Chloroplast").await.unwrap();
        *backend.history.refuse_store.lock().unwrap() = true;

        let err = session.save_and_start_new().await.unwrap_err();
        assert!(matches!(err, SessionError::Persistence(PersistenceError::NotStored(_))));
        assert_eq!(session.phase(), Phase::Active);
        assert_eq!(session.progress().answered, 1);
        assert!(session.inspect(|s| s.retained_source().is_some()));

        *backend.history.refuse_store.lock().unwrap() = false;
        assert_eq!(session.save_and_start_new().await.unwrap(), Completion::Applied(()));
        assert_eq!(session.phase(), Phase::Empty);

        let drafts = backend.history.drafts.lock().unwrap().clone();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].mcq_correct, 1);
        assert_eq!(drafts[0].source_preview, "Photosynthesis converts light to energy");
        assert_eq!(session.history().items().len(), 1);
    }

    #[tokio::test]
    async fn answers_wait_for_a_save_in_flight() {
        let gate = Arc::new(Notify::new());
        let backend =
            FakeBackend { save_gate: Some(gate.clone()), ..FakeBackend::with_sets(&["abc123"]) };
        let (backend, session) = active(backend).await;
        session.answer(0, "C) Chloroplast").await.unwrap();

        let (saved, ()) = tokio::join!(session.save_and_start_new(), async {
            tokio::task::yield_now().await;
            assert_eq!(
                session.answer(5, "C) Chloroplast").await.unwrap_err(),
                SessionError::Input(InputError::Saving)
            );
            gate.notify_one();
        });

        assert_eq!(saved.unwrap(), Completion::Applied(()));
        assert_eq!(backend.verify_calls.load(Ordering::SeqCst), 1);
        let drafts = backend.history.drafts.lock().unwrap().clone();
        assert_eq!(drafts[0].mcq_correct, 1);
    }

    #[tokio::test]
    async fn save_waits_for_answers_being_checked() {
        let gate = Arc::new(Notify::new());
        let backend =
            FakeBackend { verify_gate: Some(gate.clone()), ..FakeBackend::with_sets(&["abc123"]) };
        let (backend, session) = active(backend).await;

        let (outcome, ()) = tokio::join!(session.answer(2, "C) Chloroplast"), async {
            tokio::task::yield_now().await;
            assert_eq!(
                session.save_and_start_new().await.unwrap_err(),
                SessionError::Input(InputError::AnswersPending)
            );
            gate.notify_one();
        });

        assert!(matches!(outcome.unwrap(), AnswerOutcome::Recorded(_)));
        assert_eq!(session.save_and_start_new().await.unwrap(), Completion::Applied(()));
        assert_eq!(backend.history.drafts.lock().unwrap()[0].mcq_correct, 1);
    }

    #[tokio::test]
    async fn save_without_results_is_a_notice() {
        let (_, session) = session(FakeBackend::default());
        assert_eq!(
            session.save_and_start_new().await.unwrap_err(),
            SessionError::Input(InputError::NoResults)
        );
    }

    #[tokio::test]
    async fn audio_is_released_by_new_study_set() {
        let (_, session) = active(FakeBackend::with_sets(&["abc123", "abc123"])).await;
        let Completion::Applied(path) = session.generate_audio().await.unwrap() else {
            panic!("audio was discarded");
        };
        assert!(path.exists());

        session.regenerate().await.unwrap();
        assert!(!path.exists());
        assert!(session.narration().status().audio_path.is_none());
    }

    #[tokio::test]
    async fn speaking_without_engine_is_reported() {
        let (_, session) = active(FakeBackend::with_sets(&["abc123"])).await;
        assert!(matches!(
            session.speak_summary(),
            Err(SessionError::Audio(AudioError::Unavailable(_)))
        ));
        session.on_focus_lost();
        assert!(!session.narration().status().speaking);
    }
}

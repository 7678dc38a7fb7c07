//! Summary narration
//!
//! Two independent channels: live speech through a [`SpeechEngine`], and
//! generated audio files from a [`Synthesizer`]. Only one utterance is
//! ever active and at most one audio file is held.

pub mod audio;
pub mod speech;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use audio::AudioHandle;
pub use speech::{CommandSpeech, NoSpeech, OnUtteranceEnd, SpeechEngine, UtteranceEnd};

use crate::error::{AudioError, InputError, SessionError};
use crate::session::ports::Synthesizer;
use crate::session::state::Completion;

/// Result of toggling live speech
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechToggle {
    Started,
    Stopped,
}

/// Observable narration state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NarrationStatus {
    pub speaking: bool,
    pub audio_path: Option<PathBuf>,
    pub audio_loading: bool,
}

#[derive(Debug, Default)]
struct NarrationState {
    speaking: bool,
    /// Id of the latest utterance; completions for older ones are ignored
    utterance: u64,
    audio: Option<AudioHandle>,
    /// Synthesis requests in flight for the current audio epoch
    audio_loads: usize,
    /// Advanced whenever the audio slot is cleared
    audio_epoch: u64,
}

impl NarrationState {
    fn release_audio(&mut self) {
        if let Some(old) = self.audio.take() {
            let path = old.path().to_path_buf();
            if let Err(e) = old.release() {
                tracing::warn!("Failed to remove audio file {:?}: {}", path, e);
            }
        }
    }
}

/// Owns the speech engine and the audio slot
pub struct NarrationController {
    engine: Arc<dyn SpeechEngine>,
    state: Arc<Mutex<NarrationState>>,
}

impl NarrationController {
    pub fn new(engine: Arc<dyn SpeechEngine>) -> Self {
        Self { engine, state: Arc::default() }
    }

    fn lock(&self) -> MutexGuard<'_, NarrationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> NarrationStatus {
        let state = self.lock();
        NarrationStatus {
            speaking: state.speaking,
            audio_path: state.audio.as_ref().map(|a| a.path().to_path_buf()),
            audio_loading: state.audio_loads > 0,
        }
    }

    /// Toggle live speech of `text`
    pub fn speak(&self, text: &str) -> Result<SpeechToggle, SessionError> {
        if text.trim().is_empty() {
            return Err(InputError::EmptySummary.into());
        }

        let mut state = self.lock();
        if state.speaking {
            self.engine.cancel();
            state.speaking = false;
            return Ok(SpeechToggle::Stopped);
        }

        state.utterance += 1;
        let id = state.utterance;
        let shared = Arc::clone(&self.state);
        let on_end: OnUtteranceEnd = Box::new(move |end| {
            let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
            if state.utterance == id {
                state.speaking = false;
            }
            if let UtteranceEnd::Failed(reason) = end {
                tracing::warn!("Speech ended with an error: {}", reason);
            }
        });

        self.engine.speak(text, on_end)?;
        state.speaking = true;
        Ok(SpeechToggle::Started)
    }

    /// Stop live speech immediately
    pub fn cancel_speech(&self) {
        let mut state = self.lock();
        self.engine.cancel();
        state.speaking = false;
    }

    /// The window lost focus
    pub fn on_focus_lost(&self) {
        self.cancel_speech();
    }

    /// The page became hidden
    pub fn on_hidden(&self) {
        self.cancel_speech();
    }

    /// Synthesize `text` into a playable file, replacing any previous one
    ///
    /// On failure any existing file is kept.
    pub async fn generate_audio<S: Synthesizer>(
        &self,
        synthesizer: &S,
        text: &str,
    ) -> Result<Completion<PathBuf>, SessionError> {
        if text.trim().is_empty() {
            return Err(InputError::EmptySummary.into());
        }

        let epoch = {
            let mut state = self.lock();
            state.audio_loads += 1;
            state.audio_epoch
        };

        let handle = match synthesizer.synthesize(text).await {
            Ok(bytes) => AudioHandle::from_bytes(&bytes)
                .map_err(|e| AudioError::Remote(format!("Failed to store audio: {e}"))),
            Err(e) => Err(e),
        };

        let mut state = self.lock();
        if state.audio_epoch != epoch {
            tracing::debug!("Discarding audio generated for a cleared session");
            return Ok(Completion::Stale);
        }
        state.audio_loads = state.audio_loads.saturating_sub(1);

        let handle = handle.inspect_err(|e| tracing::warn!("Audio generation failed: {}", e))?;
        let path = handle.path().to_path_buf();
        state.release_audio();
        state.audio = Some(handle);
        Ok(Completion::Applied(path))
    }

    /// Release the held audio file, if any
    pub fn release_audio(&self) {
        let mut state = self.lock();
        state.audio_epoch += 1;
        state.audio_loads = 0;
        state.release_audio();
    }

    /// Stop speech and drop audio, as part of a session reset
    pub fn reset(&self) {
        self.cancel_speech();
        self.release_audio();
    }
}

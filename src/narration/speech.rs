//! Live speech engines

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use crate::error::AudioError;

/// Programs tried, in order, when no speech command is configured
const CANDIDATES: &[&str] = &["espeak-ng", "espeak", "say"];

/// How an utterance ended on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceEnd {
    Finished,
    Failed(String),
}

/// Callback fired when an utterance ends without being cancelled
pub type OnUtteranceEnd = Box<dyn FnOnce(UtteranceEnd) + Send + 'static>;

/// A local text-to-speech capability
pub trait SpeechEngine: Send + Sync {
    /// Start speaking `text`, superseding anything already playing.
    /// `on_end` must never be invoked from within this call.
    fn speak(&self, text: &str, on_end: OnUtteranceEnd) -> Result<(), AudioError>;

    /// Stop the current utterance, if any
    fn cancel(&self);
}

/// Stand-in for platforms without speech
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSpeech;

impl SpeechEngine for NoSpeech {
    fn speak(&self, _text: &str, _on_end: OnUtteranceEnd) -> Result<(), AudioError> {
        Err(AudioError::Unavailable("no speech engine found".to_string()))
    }

    fn cancel(&self) {}
}

/// Speaks by running an external program such as `espeak`
///
/// The text is written to the program's stdin, never passed as an
/// argument, so summaries starting with `-` are not read as options.
#[derive(Debug)]
pub struct CommandSpeech {
    program: String,
    args: Vec<String>,
    current: Mutex<Option<CancellationToken>>,
}

impl CommandSpeech {
    /// Create an engine from a command line such as `espeak-ng` or
    /// `festival --tts`
    ///
    /// A bare known program gets the flags that make it read stdin.
    pub fn new(command: impl Into<String>) -> Self {
        let command = command.into();
        let mut words = command.split_whitespace().map(str::to_string);
        let program = words.next().unwrap_or_default();
        let mut args: Vec<String> = words.collect();
        if args.is_empty() {
            args = stdin_args(&program).iter().map(|a| a.to_string()).collect();
        }
        Self { program, args, current: Mutex::new(None) }
    }

    /// Find the first known speech program on `PATH`
    pub fn detect() -> Option<Self> {
        let path = std::env::var_os("PATH")?;
        let dirs: Vec<PathBuf> = std::env::split_paths(&path).collect();
        CANDIDATES
            .iter()
            .find(|name| dirs.iter().any(|dir| dir.join(name).is_file()))
            .map(|name| Self::new(*name))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// Flags that make a known speech program read its text from stdin
fn stdin_args(program: &str) -> &'static [&'static str] {
    let name = Path::new(program).file_name().and_then(|n| n.to_str()).unwrap_or(program);
    match name {
        "espeak" | "espeak-ng" => &["--stdin"],
        "say" => &["-f", "-"],
        _ => &[],
    }
}

async fn stop(child: &mut Child) {
    if let Err(e) = child.kill().await {
        tracing::debug!("Failed to stop speech process: {}", e);
    }
}

impl SpeechEngine for CommandSpeech {
    fn speak(&self, text: &str, on_end: OnUtteranceEnd) -> Result<(), AudioError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| AudioError::Unavailable("no async runtime".to_string()))?;

        self.cancel();

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AudioError::Unavailable(format!("{}: {}", self.program, e)))?;
        let stdin = child.stdin.take();
        let text = text.to_string();

        let token = CancellationToken::new();
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());

        runtime.spawn(async move {
            if let Some(mut stdin) = stdin {
                tokio::select! {
                    _ = token.cancelled() => {
                        stop(&mut child).await;
                        return;
                    }
                    written = stdin.write_all(text.as_bytes()) => {
                        // A program may exit without reading everything
                        if let Err(e) = written {
                            tracing::debug!("Speech process closed its input: {}", e);
                        }
                    }
                }
                // Closing stdin marks the end of the text
                drop(stdin);
            }

            tokio::select! {
                _ = token.cancelled() => stop(&mut child).await,
                status = child.wait() => {
                    let end = match status {
                        Ok(status) if status.success() => UtteranceEnd::Finished,
                        Ok(status) => UtteranceEnd::Failed(format!("speech exited with {status}")),
                        Err(e) => UtteranceEnd::Failed(e.to_string()),
                    };
                    on_end(end);
                }
            }
        });

        Ok(())
    }

    fn cancel(&self) {
        if let Some(token) = self.current.lock().unwrap_or_else(PoisonError::into_inner).take() {
            token.cancel();
        }
    }
}

//! Input source selection
//!
//! Typed text and an uploaded file are mutually exclusive: staging one
//! clears the other.

use std::path::Path;

use anyhow::{Context, Result};

/// Maximum characters of text kept as a history preview
pub const PREVIEW_CHARS: usize = 300;

/// An uploaded document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Original file name, sent along with the payload
    pub filename: String,
    /// Raw file bytes
    pub payload: Vec<u8>,
}

impl SourceFile {
    /// Create a file source from a name and its bytes
    pub fn new(filename: impl Into<String>, payload: Vec<u8>) -> Self {
        Self { filename: filename.into(), payload }
    }

    /// Read a file from disk
    pub async fn read(path: &Path) -> Result<Self> {
        let payload = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {:?}", path))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "uploaded.file".to_string());
        Ok(Self { filename, payload })
    }
}

/// Material submitted to the generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Typed or pasted text
    Text(String),
    /// An uploaded document
    File(SourceFile),
}

impl Source {
    /// Short type tag used in history entries
    pub fn kind(&self) -> &'static str {
        match self {
            Source::Text(_) => "text",
            Source::File(_) => "file",
        }
    }

    /// Preview for history: leading text, or the file name
    pub fn preview(&self) -> String {
        match self {
            Source::Text(text) => text.chars().take(PREVIEW_CHARS).collect(),
            Source::File(file) => file.filename.clone(),
        }
    }
}

/// Which input is currently active
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputMode {
    #[default]
    None,
    Text,
    File,
}

/// Arbitrates between the text box and the file picker
#[derive(Debug, Clone, Default)]
pub struct SourceSelector {
    mode: InputMode,
    text: String,
    file: Option<SourceFile>,
}

impl SourceSelector {
    /// Create an empty selector
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the staged text
    pub fn set_text(&mut self, value: impl Into<String>) {
        let value = value.into();
        if !value.trim().is_empty() {
            self.mode = InputMode::Text;
            self.text = value;
            self.file = None;
            return;
        }

        // Blank text never displaces a staged file
        if self.file.is_some() {
            return;
        }
        self.text = value;
        self.mode = InputMode::None;
    }

    /// Stage or clear the uploaded file
    pub fn set_file(&mut self, file: Option<SourceFile>) {
        match file {
            Some(file) => {
                self.mode = InputMode::File;
                self.file = Some(file);
                self.text.clear();
            }
            None => {
                self.file = None;
                if !self.has_text() {
                    self.mode = InputMode::None;
                }
            }
        }
    }

    /// Current input mode
    pub fn mode(&self) -> InputMode {
        self.mode
    }

    /// Staged text (may be blank)
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Staged file, if any
    pub fn file(&self) -> Option<&SourceFile> {
        self.file.as_ref()
    }

    fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// Whether the text box may be edited
    pub fn can_use_text(&self) -> bool {
        self.mode != InputMode::File
    }

    /// Whether the file picker may be used
    pub fn can_use_file(&self) -> bool {
        self.mode != InputMode::Text
    }

    /// Check whether the active input is complete enough to submit
    pub fn can_generate(&self) -> bool {
        match self.mode {
            InputMode::Text => self.has_text(),
            InputMode::File => self.file.is_some(),
            InputMode::None => false,
        }
    }

    /// Build the source to submit, if the active input is usable
    pub fn current(&self) -> Option<Source> {
        match self.mode {
            InputMode::Text if self.has_text() => Some(Source::Text(self.text.clone())),
            InputMode::File => self.file.clone().map(Source::File),
            _ => None,
        }
    }

    /// Drop everything that is staged
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

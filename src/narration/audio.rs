//! Playable audio files

use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Synthesized audio stored in a temp file
///
/// The file lives as long as the handle. Dropping or releasing the handle
/// deletes it.
#[derive(Debug)]
pub struct AudioHandle {
    file: NamedTempFile,
}

impl AudioHandle {
    /// Write audio bytes to a fresh temp file
    pub fn from_bytes(bytes: &[u8]) -> io::Result<Self> {
        let mut file = tempfile::Builder::new().prefix("studyset-").suffix(".mp3").tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(Self { file })
    }

    /// Location a player can open
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the underlying file now, reporting failures
    pub fn release(self) -> io::Result<()> {
        self.file.close()
    }
}

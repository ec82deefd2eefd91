//! Destination directory and filename-based deduplication
//!
//! The set of known filenames is seeded from a directory listing taken
//! once when the store is opened. Every successful claim adds to it, so
//! two attachments that map to the same filename within one run are
//! written only once.

use crate::error::{Error, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Result of trying to persist one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The bytes were written to this path.
    Saved(PathBuf),
    /// A file with this name was already present; nothing was written.
    Duplicate,
}

/// The output directory plus the filenames already in it.
#[derive(Debug)]
pub struct AttachmentStore {
    dir: PathBuf,
    known: Mutex<HashSet<String>>,
}

impl AttachmentStore {
    /// Create `dir` if needed and snapshot the filenames it contains.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Filesystem`] if the directory cannot be created
    /// or listed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::filesystem(&dir, e))?;

        let mut known = HashSet::new();
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| Error::filesystem(&dir, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::filesystem(&dir, e))?
        {
            if let Ok(name) = entry.file_name().into_string() {
                known.insert(name);
            }
        }

        debug!("{} existing files in {}", known.len(), dir.display());
        Ok(Self {
            dir,
            known: Mutex::new(known),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether `filename` is already present or claimed.
    #[must_use]
    pub fn contains(&self, filename: &str) -> bool {
        self.lock().contains(filename)
    }

    /// Write `content` to `<dir>/<filename>` unless the name is known.
    ///
    /// An existing file that appeared after the snapshot is
    /// overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Filesystem`] if the write fails. The name is
    /// released again so a later attachment may retry it.
    pub async fn save(&self, filename: &str, content: &[u8]) -> Result<SaveOutcome> {
        if !self.lock().insert(filename.to_string()) {
            return Ok(SaveOutcome::Duplicate);
        }

        let path = self.dir.join(filename);
        if let Err(e) = tokio::fs::write(&path, content).await {
            self.lock().remove(filename);
            return Err(Error::filesystem(path, e));
        }

        Ok(SaveOutcome::Saved(path))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.known.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

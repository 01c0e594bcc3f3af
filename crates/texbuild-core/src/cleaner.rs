//! Post-build removal of auxiliary files.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::fileset::FileSet;
use crate::telemetry::CLEAN_TARGET;

/// Errors that stop a cleanup as a whole.
///
/// The orchestrator reports these as warnings; they never fail a build.
#[derive(Error, Debug)]
pub enum CleanError {
    #[error("Invalid include pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Cannot read {}: {source}", dir.display())]
    ReadDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Deletes files in a directory that match include patterns.
pub trait Cleaner: Send + Sync {
    /// Remove matches in `directory` (non-recursive). Returns the number of
    /// files actually removed.
    fn clean(&self, directory: &Path, patterns: &[String]) -> Result<usize, CleanError>;
}

/// Cleaner that delegates to [`FileSet`].
///
/// Patterns are applied literally: a pattern that matches the source document
/// deletes it.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSetCleaner;

impl FileSetCleaner {
    pub fn new() -> Self {
        Self
    }
}

impl Cleaner for FileSetCleaner {
    fn clean(&self, directory: &Path, patterns: &[String]) -> Result<usize, CleanError> {
        let set = FileSet::new(directory, patterns)?;
        let removed = set.delete()?;
        for path in &removed {
            info!(target: CLEAN_TARGET, "Deleting {}", path.display());
        }
        Ok(removed.len())
    }
}

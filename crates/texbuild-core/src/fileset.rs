//! Include-pattern file sets over a single directory.
//!
//! A [`FileSet`] names the regular files directly inside a directory whose
//! file name matches any of its include globs. Subdirectories are never
//! descended into and never matched.

use std::io;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};

use crate::cleaner::CleanError;

/// Files in `dir` matching any include pattern.
#[derive(Debug, Clone)]
pub struct FileSet {
    dir: PathBuf,
    includes: GlobSet,
    patterns: Vec<String>,
}

impl FileSet {
    /// Compile `patterns` into a file set rooted at `dir`.
    pub fn new(dir: &Path, patterns: &[String]) -> Result<Self, CleanError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| CleanError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
            builder.add(glob);
        }
        let includes = builder.build().map_err(|e| CleanError::InvalidPattern {
            pattern: patterns.join(" "),
            reason: e.to_string(),
        })?;

        Ok(Self {
            dir: dir.to_path_buf(),
            includes,
            patterns: patterns.to_vec(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether a bare file name is included.
    pub fn is_included(&self, file_name: &str) -> bool {
        self.includes.is_match(file_name)
    }

    /// Matching files, sorted by path.
    pub fn matches(&self) -> Result<Vec<PathBuf>, CleanError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| CleanError::ReadDir {
            dir: self.dir.clone(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(dir = %self.dir.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            if self.is_included(&entry.file_name().to_string_lossy()) {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Delete every matching file.
    ///
    /// A file that cannot be removed is skipped. Returns the paths actually
    /// deleted.
    pub fn delete(&self) -> Result<Vec<PathBuf>, CleanError> {
        self.delete_with(|path| std::fs::remove_file(path))
    }

    /// Like [`delete`](Self::delete), removing each match with `remove`.
    pub fn delete_with<F>(&self, mut remove: F) -> Result<Vec<PathBuf>, CleanError>
    where
        F: FnMut(&Path) -> io::Result<()>,
    {
        let mut removed = Vec::new();
        for path in self.matches()? {
            match remove(&path) {
                Ok(()) => {
                    debug!(file = %path.display(), "Deleted");
                    removed.push(path);
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Failed to delete, skipping");
                }
            }
        }
        Ok(removed)
    }
}

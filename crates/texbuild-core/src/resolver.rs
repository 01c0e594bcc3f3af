//! Path resolution for the working directory and source document.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{TaskError, TaskResult};

/// Canonical paths for one invocation.
///
/// Both paths existed when they were resolved. Produced once per request and
/// passed explicitly to every pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPaths {
    /// Output directory for the compiler.
    pub working_dir: PathBuf,

    /// Source document.
    pub source_file: PathBuf,
}

/// Turns configured paths into canonical, existing locations.
pub trait PathResolver: Send + Sync {
    /// Resolve a directory (or any path) on its own.
    fn resolve_dir(&self, dir: &str) -> TaskResult<PathBuf>;

    /// Resolve `name` relative to `dir`.
    fn resolve_file(&self, dir: &str, name: &str) -> TaskResult<PathBuf>;

    /// Resolve both paths of a request.
    fn resolve(&self, working_dir: &str, source: &str) -> TaskResult<ResolvedPaths> {
        let working_dir_abs = self.resolve_dir(working_dir)?;
        let source_file = self.resolve_file(working_dir, source)?;
        Ok(ResolvedPaths {
            working_dir: working_dir_abs,
            source_file,
        })
    }
}

/// Resolver backed by `std::fs::canonicalize`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsPathResolver;

impl FsPathResolver {
    pub fn new() -> Self {
        Self
    }

    fn canonicalize(path: &Path) -> TaskResult<PathBuf> {
        match std::fs::canonicalize(path) {
            Ok(p) if p.exists() => Ok(p),
            Ok(_) => Err(TaskError::NotFound {
                path: path.to_path_buf(),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(TaskError::NotFound {
                path: path.to_path_buf(),
            }),
            Err(e) => Err(TaskError::Resolve {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

impl PathResolver for FsPathResolver {
    fn resolve_dir(&self, dir: &str) -> TaskResult<PathBuf> {
        Self::canonicalize(Path::new(dir))
    }

    fn resolve_file(&self, dir: &str, name: &str) -> TaskResult<PathBuf> {
        // An absolute name replaces `dir`.
        Self::canonicalize(&Path::new(dir).join(name))
    }
}

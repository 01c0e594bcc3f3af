//! Error types for compilation tasks

use std::path::PathBuf;

use thiserror::Error;

/// Errors that end a compilation task.
///
/// Cleanup problems are not represented here; see
/// [`CleanError`](crate::cleaner::CleanError).
#[derive(Error, Debug)]
pub enum TaskError {
    /// No source document was configured
    #[error("No latex source file was given")]
    MissingSource,

    /// A configured path does not exist
    #[error("{} does not exist", path.display())]
    NotFound { path: PathBuf },

    /// Canonicalization failed for a reason other than a missing path
    #[error("Failed to resolve {}: {source}", path.display())]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The compiler executable could not be started
    #[error("Failed to launch {program}: {source}")]
    LaunchFailure {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The compiler ran and exited nonzero
    #[error("Compiler failed on pass {pass} with exit code {exit_code}")]
    CompilerFailure { pass: u8, exit_code: i32 },

    /// Waiting for the compiler was interrupted
    #[error("Interrupted: {0}")]
    Interrupted(String),

    /// The compiler exceeded the configured time limit and was killed
    #[error("Compiler pass {pass} timed out after {limit_secs} seconds")]
    Timeout { pass: u8, limit_secs: u64 },

    /// Invalid configuration file or value
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TaskError {
    /// Exit code reported by the compiler, when the failure carries one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            TaskError::CompilerFailure { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for TaskError {
    fn from(err: toml::de::Error) -> Self {
        TaskError::Config(err.to_string())
    }
}

/// Result type for compilation tasks
pub type TaskResult<T> = std::result::Result<T, TaskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_only_for_compiler_failure() {
        let err = TaskError::CompilerFailure {
            pass: 1,
            exit_code: 3,
        };
        assert_eq!(err.exit_code(), Some(3));
        assert_eq!(TaskError::MissingSource.exit_code(), None);
        assert_eq!(TaskError::Interrupted("x".into()).exit_code(), None);
    }

    #[test]
    fn messages_name_the_path() {
        let err = TaskError::NotFound {
            path: PathBuf::from("/tmp/missing-dir"),
        };
        assert_eq!(err.to_string(), "/tmp/missing-dir does not exist");
    }
}

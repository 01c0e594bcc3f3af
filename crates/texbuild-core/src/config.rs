//! Task configuration, as read from `texbuild.toml` or assembled by the CLI.
//!
//! Mirrors the task's declarative attributes: `source`, `working_dir`,
//! `clean`, `includes`, `two_pass`, plus `compiler` and `timeout_secs`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{TaskError, TaskResult};
use crate::request::{
    split_includes, CompilationRequest, PassPolicy, DEFAULT_COMPILER, DEFAULT_INCLUDES,
};

/// Conventional configuration file name.
pub const CONFIG_FILE_NAME: &str = "texbuild.toml";

/// Declarative task attributes with their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TaskConfig {
    /// Source document, relative to `working_dir` unless absolute.
    pub source: Option<String>,

    /// Compiler output directory; the process's current directory by default.
    pub working_dir: String,

    /// Remove auxiliary files after a successful build.
    pub clean: bool,

    /// Ant-style include list, separated by whitespace or commas.
    pub includes: String,

    /// Run the compiler twice.
    pub two_pass: bool,

    /// Compiler executable.
    pub compiler: String,

    /// Per-pass time limit in seconds (0 = none).
    pub timeout_secs: u64,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            source: None,
            working_dir: ".".to_string(),
            clean: false,
            includes: DEFAULT_INCLUDES.to_string(),
            two_pass: false,
            compiler: DEFAULT_COMPILER.to_string(),
            timeout_secs: 0,
        }
    }
}

impl TaskConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> TaskResult<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> TaskResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TaskError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Freeze into the request the orchestrator consumes.
    pub fn into_request(self) -> TaskResult<CompilationRequest> {
        if self.compiler.trim().is_empty() {
            return Err(TaskError::Config("compiler must not be empty".to_string()));
        }

        Ok(CompilationRequest {
            source: self.source,
            working_dir: self.working_dir,
            passes: PassPolicy::from_two_pass(self.two_pass),
            clean_enabled: self.clean,
            clean_patterns: split_includes(&self.includes),
            compiler: self.compiler,
            timeout_secs: self.timeout_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_document_gives_defaults() {
        let config = TaskConfig::from_toml_str("").unwrap();
        assert_eq!(config, TaskConfig::default());
        assert_eq!(config.includes, "*.log *.aux");
    }

    #[test]
    fn parses_all_attributes() {
        let config = TaskConfig::from_toml_str(
            r#"
            source = "thesis.tex"
            working_dir = "docs"
            clean = true
            includes = "*.log, *.aux, *.toc"
            two_pass = true
            compiler = "/opt/texbin/pdflatex"
            timeout_secs = 120
            "#,
        )
        .unwrap();

        let request = config.into_request().unwrap();
        assert_eq!(request.source.as_deref(), Some("thesis.tex"));
        assert_eq!(request.working_dir, "docs");
        assert!(request.clean_enabled);
        assert_eq!(request.clean_patterns, vec!["*.log", "*.aux", "*.toc"]);
        assert_eq!(request.passes, PassPolicy::Double);
        assert_eq!(request.compiler, "/opt/texbin/pdflatex");
        assert_eq!(request.timeout_secs, 120);
    }

    #[test]
    fn unknown_key_is_config_error() {
        let err = TaskConfig::from_toml_str("pdftex = true").unwrap_err();
        assert!(matches!(err, TaskError::Config(_)));
    }

    #[test]
    fn empty_compiler_is_rejected() {
        let config = TaskConfig {
            compiler: "  ".to_string(),
            ..TaskConfig::default()
        };
        assert!(matches!(config.into_request(), Err(TaskError::Config(_))));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "source = \"a.tex\"\nclean = true\n").unwrap();

        let config = TaskConfig::load(&path).unwrap();
        assert_eq!(config.source.as_deref(), Some("a.tex"));
        assert!(config.clean);
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let dir = tempdir().unwrap();
        let err = TaskConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, TaskError::Config(msg) if msg.contains("cannot read")));
    }
}

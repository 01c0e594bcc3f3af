//! Compilation request definitions.

use serde::{Deserialize, Serialize};

/// Compiler used when none is configured.
pub const DEFAULT_COMPILER: &str = "pdflatex";

/// Default include set for cleanup: the compiler's log and auxiliary state.
pub const DEFAULT_INCLUDES: &str = "*.log *.aux";

/// How many compiler passes a request runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PassPolicy {
    /// One pass.
    #[default]
    Single,

    /// Two identical passes, so references written to auxiliary files in the
    /// first pass are resolved in the second.
    Double,
}

impl PassPolicy {
    /// Policy for the `two_pass` flag.
    pub fn from_two_pass(two_pass: bool) -> Self {
        if two_pass {
            PassPolicy::Double
        } else {
            PassPolicy::Single
        }
    }

    /// Number of passes.
    pub fn count(&self) -> u8 {
        match self {
            PassPolicy::Single => 1,
            PassPolicy::Double => 2,
        }
    }
}

/// A single compilation task, consumed once by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompilationRequest {
    /// Source document, relative to `working_dir` unless absolute.
    pub source: Option<String>,

    /// Directory the compiler writes its output into.
    pub working_dir: String,

    /// Number of passes.
    pub passes: PassPolicy,

    /// Remove auxiliary files after a successful build.
    pub clean_enabled: bool,

    /// Include patterns for cleanup, matched against file names.
    pub clean_patterns: Vec<String>,

    /// Compiler executable.
    pub compiler: String,

    /// Per-pass time limit in seconds (0 = wait indefinitely).
    pub timeout_secs: u64,
}

impl CompilationRequest {
    /// Request for `source` in the current directory with default settings.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::default()
        }
    }

    /// Set the working directory.
    pub fn in_dir(mut self, working_dir: impl Into<String>) -> Self {
        self.working_dir = working_dir.into();
        self
    }

    /// Run two passes.
    pub fn two_pass(mut self) -> Self {
        self.passes = PassPolicy::Double;
        self
    }

    /// Enable cleanup with the given patterns.
    pub fn cleaning<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clean_enabled = true;
        self.clean_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Use a different compiler executable.
    pub fn with_compiler(mut self, compiler: impl Into<String>) -> Self {
        self.compiler = compiler.into();
        self
    }
}

impl Default for CompilationRequest {
    fn default() -> Self {
        Self {
            source: None,
            working_dir: ".".to_string(),
            passes: PassPolicy::Single,
            clean_enabled: false,
            clean_patterns: split_includes(DEFAULT_INCLUDES),
            compiler: DEFAULT_COMPILER.to_string(),
            timeout_secs: 0,
        }
    }
}

/// Split an include string on whitespace and commas.
pub fn split_includes(includes: &str) -> Vec<String> {
    includes
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_policy_count() {
        assert_eq!(PassPolicy::Single.count(), 1);
        assert_eq!(PassPolicy::Double.count(), 2);
        assert_eq!(PassPolicy::from_two_pass(true), PassPolicy::Double);
        assert_eq!(PassPolicy::from_two_pass(false), PassPolicy::Single);
    }

    #[test]
    fn test_request_defaults() {
        let request = CompilationRequest::default();
        assert!(request.source.is_none());
        assert_eq!(request.working_dir, ".");
        assert!(!request.clean_enabled);
        assert_eq!(request.clean_patterns, vec!["*.log", "*.aux"]);
        assert_eq!(request.compiler, "pdflatex");
        assert_eq!(request.timeout_secs, 0);
    }

    #[test]
    fn test_request_builder() {
        let request = CompilationRequest::new("paper.tex")
            .in_dir("/tmp/build")
            .two_pass()
            .cleaning(["*.toc"])
            .with_compiler("lualatex");
        assert_eq!(request.source.as_deref(), Some("paper.tex"));
        assert_eq!(request.working_dir, "/tmp/build");
        assert_eq!(request.passes, PassPolicy::Double);
        assert!(request.clean_enabled);
        assert_eq!(request.clean_patterns, vec!["*.toc"]);
        assert_eq!(request.compiler, "lualatex");
    }

    #[test]
    fn test_split_includes() {
        assert_eq!(split_includes("*.log *.aux"), vec!["*.log", "*.aux"]);
        assert_eq!(
            split_includes(" *.log,*.aux\t*.toc ,"),
            vec!["*.log", "*.aux", "*.toc"]
        );
        assert!(split_includes("  ").is_empty());
    }
}

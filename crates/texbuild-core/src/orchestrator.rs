//! Compilation orchestration: validate, run the passes, clean up.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cleaner::{Cleaner, FileSetCleaner};
use crate::error::{TaskError, TaskResult};
use crate::request::CompilationRequest;
use crate::resolver::{FsPathResolver, PathResolver, ResolvedPaths};
use crate::runner::{Invocation, ProcessRunner, TokioProcessRunner};
use crate::sink::{LogSink, TracingSink};

/// Prefix of the sink line written on every phase transition.
pub const PHASE_PREFIX: &str = "Phase: ";

/// Where an orchestration run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Validating,
    /// Compiler pass `n` (1-based) is running.
    PassRunning(u8),
    Cleaning,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Validating => write!(f, "validating"),
            Phase::PassRunning(n) => write!(f, "pass {n}"),
            Phase::Cleaning => write!(f, "cleaning"),
            Phase::Done => write!(f, "done"),
            Phase::Failed => write!(f, "failed"),
        }
    }
}

/// Terminal result of one orchestration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompilationOutcome {
    /// Every pass exited 0.
    pub succeeded: bool,

    /// Exit code of the last pass that ran (-1 if none produced one).
    pub last_exit_code: i32,

    /// Cleanup ran to completion.
    pub cleaned: bool,

    /// Number of passes that ran.
    pub passes_run: u8,

    /// Files removed by cleanup.
    pub removed: usize,

    /// Why cleanup did not complete, if it did not.
    pub cleanup_warning: Option<String>,
}

impl CompilationOutcome {
    /// Outcome reported for a failed run.
    pub fn failed(err: &TaskError) -> Self {
        let passes_run = match err {
            TaskError::CompilerFailure { pass, .. } | TaskError::Timeout { pass, .. } => *pass,
            _ => 0,
        };
        Self {
            succeeded: false,
            last_exit_code: err.exit_code().unwrap_or(-1),
            cleaned: false,
            passes_run,
            removed: 0,
            cleanup_warning: None,
        }
    }
}

/// Drives the compiler over a [`CompilationRequest`].
///
/// Holds its capabilities by composition; each `run` is independent and
/// keeps no state between requests.
pub struct Orchestrator {
    resolver: Arc<dyn PathResolver>,
    runner: Arc<dyn ProcessRunner>,
    cleaner: Arc<dyn Cleaner>,
    sink: Arc<dyn LogSink>,
}

impl Orchestrator {
    pub fn new(
        resolver: Arc<dyn PathResolver>,
        runner: Arc<dyn ProcessRunner>,
        cleaner: Arc<dyn Cleaner>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            resolver,
            runner,
            cleaner,
            sink,
        }
    }

    /// Filesystem resolver, tokio runner, glob cleaner, tracing sink.
    ///
    /// The runner has no interrupt channel; build with [`Orchestrator::new`]
    /// and [`TokioProcessRunner::with_interrupt`] to make passes cancellable.
    pub fn with_defaults() -> Self {
        Self::new(
            Arc::new(FsPathResolver),
            Arc::new(TokioProcessRunner::new()),
            Arc::new(FileSetCleaner),
            Arc::new(TracingSink),
        )
    }

    /// Run a request to completion.
    ///
    /// Any failure is logged to the sink once and returned. Cleanup problems
    /// are not failures; they show up in
    /// [`CompilationOutcome::cleanup_warning`].
    pub async fn run(&self, request: &CompilationRequest) -> TaskResult<CompilationOutcome> {
        let start = Instant::now();
        self.enter(Phase::Idle);

        match self.execute(request).await {
            Ok(outcome) => {
                info!(
                    passes = outcome.passes_run,
                    cleaned = outcome.cleaned,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Compilation succeeded"
                );
                Ok(outcome)
            }
            Err(e) => {
                self.enter(Phase::Failed);
                self.sink.log(&format!("BUILD FAILED: {e}"));
                Err(e)
            }
        }
    }

    async fn execute(&self, request: &CompilationRequest) -> TaskResult<CompilationOutcome> {
        self.enter(Phase::Validating);

        let source = request
            .source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(TaskError::MissingSource)?;

        let paths = self.resolver.resolve(&request.working_dir, source)?;
        self.log_attributes(request, &paths);

        let total = request.passes.count();
        let mut last_exit_code = -1;

        for pass in 1..=total {
            self.enter(Phase::PassRunning(pass));

            let invocation =
                Invocation::compiler(&request.compiler, &paths, pass, request.timeout_secs);
            self.sink
                .log(&format!("Exec: {}", invocation.command_line().join(" ")));

            let result = self.runner.run(&invocation, self.sink.as_ref()).await?;
            last_exit_code = result.exit_code;

            if !result.passed() {
                return Err(TaskError::CompilerFailure {
                    pass,
                    exit_code: result.exit_code,
                });
            }
            self.sink.log(&format!(
                "Pass {pass} of {total} completed ({} ms)",
                result.duration_ms
            ));
        }

        let mut outcome = CompilationOutcome {
            succeeded: true,
            last_exit_code,
            cleaned: false,
            passes_run: total,
            removed: 0,
            cleanup_warning: None,
        };

        if request.clean_enabled {
            self.enter(Phase::Cleaning);
            self.sink.log("Executing clean");

            match self
                .cleaner
                .clean(&paths.working_dir, &request.clean_patterns)
            {
                Ok(removed) => {
                    self.sink.log(&format!("Removed {removed} file(s)"));
                    outcome.cleaned = true;
                    outcome.removed = removed;
                }
                Err(e) => {
                    warn!(error = %e, "Cleanup failed; compilation result stands");
                    self.sink.log(&format!("Clean failed: {e}"));
                    outcome.cleanup_warning = Some(e.to_string());
                }
            }
        }

        self.enter(Phase::Done);
        Ok(outcome)
    }

    fn enter(&self, phase: Phase) {
        debug!(%phase, "Phase transition");
        self.sink.log(&format!("{PHASE_PREFIX}{phase}"));
    }

    fn log_attributes(&self, request: &CompilationRequest, paths: &ResolvedPaths) {
        self.sink.log(&format!(
            "Executing LaTeX task, version {}",
            crate::version()
        ));
        self.sink
            .log(&format!("source \t = {}", paths.source_file.display()));
        self.sink
            .log(&format!("workingdir \t = {}", paths.working_dir.display()));
        self.sink
            .log(&format!("passes \t = {}", request.passes.count()));
        self.sink.log(&format!("clean \t = {}", request.clean_enabled));
        self.sink.log(&format!("compiler \t = {}", request.compiler));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_reject_missing_source() {
        let err = Orchestrator::with_defaults()
            .run(&CompilationRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::MissingSource));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::PassRunning(2).to_string(), "pass 2");
        assert_eq!(Phase::Cleaning.to_string(), "cleaning");
        assert_eq!(Phase::Failed.to_string(), "failed");
    }

    #[test]
    fn test_failed_outcome_from_compiler_failure() {
        let outcome = CompilationOutcome::failed(&TaskError::CompilerFailure {
            pass: 2,
            exit_code: 1,
        });
        assert!(!outcome.succeeded);
        assert_eq!(outcome.last_exit_code, 1);
        assert_eq!(outcome.passes_run, 2);
        assert!(!outcome.cleaned);
    }

    #[test]
    fn test_failed_outcome_before_spawn() {
        let outcome = CompilationOutcome::failed(&TaskError::MissingSource);
        assert!(!outcome.succeeded);
        assert_eq!(outcome.last_exit_code, -1);
        assert_eq!(outcome.passes_run, 0);
    }

    #[test]
    fn test_outcome_serializes() {
        let outcome = CompilationOutcome {
            succeeded: true,
            last_exit_code: 0,
            cleaned: true,
            passes_run: 2,
            removed: 3,
            cleanup_warning: None,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["succeeded"], true);
        assert_eq!(json["removed"], 3);
    }
}

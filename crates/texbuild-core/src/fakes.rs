//! In-memory fakes for the orchestrator's capabilities (testing only)
//!
//! Provides `MemorySink`, `ScriptedRunner`, and `RecordingCleaner`, which
//! satisfy the trait contracts without spawning processes or touching disk.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::cleaner::{CleanError, Cleaner};
use crate::error::{TaskError, TaskResult};
use crate::runner::{Invocation, PassResult, ProcessRunner};
use crate::sink::LogSink;

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

/// Sink that keeps every line.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the lines logged so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    /// Whether any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().unwrap().iter().any(|l| l.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn log(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}

// ---------------------------------------------------------------------------
// ScriptedRunner
// ---------------------------------------------------------------------------

/// What a scripted pass does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scripted {
    /// Print `lines`, then exit with `code`.
    Exit { code: i32, lines: Vec<String> },
    /// Fail to spawn.
    LaunchFailure,
    /// Interrupted while waiting.
    Interrupted(String),
}

impl Scripted {
    pub fn exit(code: i32) -> Self {
        Scripted::Exit {
            code,
            lines: Vec::new(),
        }
    }
}

/// Spy runner that replays a script and records each invocation.
///
/// Once the script is exhausted every pass exits 0.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    script: Mutex<VecDeque<Scripted>>,
    invocations: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new<I: IntoIterator<Item = Scripted>>(script: I) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Runner whose passes exit with `codes` in turn.
    pub fn with_exit_codes<I: IntoIterator<Item = i32>>(codes: I) -> Self {
        Self::new(codes.into_iter().map(Scripted::exit))
    }

    /// Invocations received so far.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation, sink: &dyn LogSink) -> TaskResult<PassResult> {
        self.invocations.lock().unwrap().push(invocation.clone());
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Scripted::exit(0));

        match step {
            Scripted::Exit { code, lines } => {
                for line in &lines {
                    sink.log(line);
                }
                Ok(PassResult {
                    pass: invocation.pass,
                    exit_code: code,
                    output_lines: lines,
                    duration_ms: 0,
                })
            }
            Scripted::LaunchFailure => Err(TaskError::LaunchFailure {
                program: invocation.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted launch failure"),
            }),
            Scripted::Interrupted(message) => Err(TaskError::Interrupted(message)),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingCleaner
// ---------------------------------------------------------------------------

/// Cleaner that records its calls instead of deleting anything.
#[derive(Debug, Default)]
pub struct RecordingCleaner {
    calls: Mutex<Vec<(PathBuf, Vec<String>)>>,
    fail: bool,
    removed: usize,
}

impl RecordingCleaner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cleaner that reports `removed` files per call.
    pub fn removing(removed: usize) -> Self {
        Self {
            removed,
            ..Self::default()
        }
    }

    /// Cleaner whose every call fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Cleaner for RecordingCleaner {
    fn clean(&self, directory: &Path, patterns: &[String]) -> Result<usize, CleanError> {
        self.calls
            .lock()
            .unwrap()
            .push((directory.to_path_buf(), patterns.to_vec()));
        if self.fail {
            return Err(CleanError::ReadDir {
                dir: directory.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "scripted"),
            });
        }
        Ok(self.removed)
    }
}

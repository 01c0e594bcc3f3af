//! texbuild core - multi-pass LaTeX compilation
//!
//! Drives an external typesetting compiler (pdfLaTeX by default):
//! - Resolves the working directory and source document to canonical paths
//! - Runs the compiler once or twice, streaming its output into a log sink
//! - Removes auxiliary files matching include patterns after a successful build
//!
//! Every capability sits behind a trait so the [`Orchestrator`] can be
//! composed with fakes in tests (see [`fakes`]).

pub mod cleaner;
pub mod config;
pub mod error;
pub mod fakes;
pub mod fileset;
pub mod orchestrator;
pub mod request;
pub mod resolver;
pub mod runner;
pub mod sink;
pub mod telemetry;

// Re-export key types
pub use cleaner::{CleanError, Cleaner, FileSetCleaner};
pub use config::TaskConfig;
pub use error::{TaskError, TaskResult};
pub use fileset::FileSet;
pub use orchestrator::{CompilationOutcome, Orchestrator, Phase, PHASE_PREFIX};
pub use request::{CompilationRequest, PassPolicy, DEFAULT_COMPILER, DEFAULT_INCLUDES};
pub use resolver::{FsPathResolver, PathResolver, ResolvedPaths};
pub use runner::{Invocation, PassResult, ProcessRunner, TokioProcessRunner};
pub use sink::{LogSink, TracingSink};
pub use telemetry::init_tracing;

/// Crate version, shown in the task banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version string shown in the task banner.
pub fn version() -> &'static str {
    VERSION
}

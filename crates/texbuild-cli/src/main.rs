//! texbuild - LaTeX compilation driver
//!
//! ## Commands
//!
//! - `compile`: run the compiler over a document, optionally twice, then clean
//! - `clean`: remove auxiliary files from a directory without compiling

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use texbuild_core::config::CONFIG_FILE_NAME;
use texbuild_core::request::split_includes;
use texbuild_core::{
    Cleaner, CompilationOutcome, FileSetCleaner, FsPathResolver, Orchestrator, PathResolver,
    TaskConfig, TaskError, TokioProcessRunner, TracingSink, DEFAULT_INCLUDES,
};
use tokio::sync::watch;
use tracing::{info, warn, Level};

/// Exit status for task errors that carry no compiler exit code.
const TASK_ERROR_EXIT: u8 = 2;

#[derive(Parser)]
#[command(name = "texbuild")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Multi-pass LaTeX compilation with auxiliary file cleanup", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a LaTeX document
    Compile(CompileArgs),

    /// Remove auxiliary files without compiling
    Clean {
        /// Directory to clean
        #[arg(default_value = ".")]
        dir: String,

        /// Include patterns (separated by spaces or commas)
        #[arg(short, long, default_value = DEFAULT_INCLUDES)]
        includes: String,
    },
}

#[derive(Args, Debug, Default)]
struct CompileArgs {
    /// Source document, relative to the working directory
    #[arg(short, long, env = "TEXBUILD_SOURCE")]
    source: Option<String>,

    /// Output directory for the compiler (default: current directory)
    #[arg(short, long, env = "TEXBUILD_WORKING_DIR")]
    working_dir: Option<String>,

    /// Remove auxiliary files after a successful build
    #[arg(long)]
    clean: bool,

    /// Include patterns for --clean (separated by spaces or commas)
    #[arg(short, long, env = "TEXBUILD_INCLUDES")]
    includes: Option<String>,

    /// Run the compiler twice to resolve cross-references
    #[arg(long)]
    two_pass: bool,

    /// Compiler executable (default: pdflatex)
    #[arg(long, env = "TEXBUILD_COMPILER")]
    compiler: Option<String>,

    /// Kill a pass after this many seconds (0 = no limit)
    #[arg(long, env = "TEXBUILD_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Configuration file (default: ./texbuild.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the outcome as JSON on stdout
    #[arg(long)]
    summary_json: bool,
}

impl CompileArgs {
    /// Merge command-line values over the configuration file.
    fn to_config(&self, cwd: &Path) -> Result<TaskConfig> {
        let mut config = match &self.config {
            Some(path) => TaskConfig::load(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => {
                let default_path = cwd.join(CONFIG_FILE_NAME);
                if default_path.is_file() {
                    TaskConfig::load(&default_path)?
                } else {
                    TaskConfig::default()
                }
            }
        };

        if let Some(source) = &self.source {
            config.source = Some(source.clone());
        }
        if let Some(dir) = &self.working_dir {
            config.working_dir = dir.clone();
        }
        if let Some(includes) = &self.includes {
            config.includes = includes.clone();
        }
        if let Some(compiler) = &self.compiler {
            config.compiler = compiler.clone();
        }
        if let Some(timeout) = self.timeout_secs {
            config.timeout_secs = timeout;
        }
        config.clean |= self.clean;
        config.two_pass |= self.two_pass;

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    texbuild_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Compile(args) => cmd_compile(&args).await,
        Commands::Clean { dir, includes } => cmd_clean(&dir, &includes),
    }
}

/// Compile a document and report the outcome
async fn cmd_compile(args: &CompileArgs) -> Result<ExitCode> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let request = match args.to_config(&cwd).and_then(|c| c.into_request().map_err(Into::into)) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return Ok(ExitCode::from(TASK_ERROR_EXIT));
        }
    };

    let orchestrator = Orchestrator::new(
        Arc::new(FsPathResolver),
        Arc::new(TokioProcessRunner::with_interrupt(interrupt_on_ctrl_c())),
        Arc::new(FileSetCleaner),
        Arc::new(TracingSink),
    );
    let (outcome, code) = match orchestrator.run(&request).await {
        Ok(outcome) => (outcome, ExitCode::SUCCESS),
        Err(e) => (CompilationOutcome::failed(&e), ExitCode::from(exit_status(&e))),
    };

    if args.summary_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if outcome.succeeded {
        println!(
            "Compiled in {} pass(es){}",
            outcome.passes_run,
            if outcome.cleaned {
                format!(", removed {} file(s)", outcome.removed)
            } else {
                String::new()
            }
        );
        if let Some(warning) = &outcome.cleanup_warning {
            println!("Warning: cleanup incomplete: {warning}");
        }
    }

    Ok(code)
}

/// Publish `true` on the first Ctrl-C so the running pass is killed.
fn interrupt_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(true);
            }
            Err(e) => warn!(error = %e, "Cannot listen for Ctrl-C"),
        }
    });
    rx
}

/// Remove auxiliary files from a directory
fn cmd_clean(dir: &str, includes: &str) -> Result<ExitCode> {
    let dir = FsPathResolver.resolve_dir(dir)?;
    let patterns = split_includes(includes);

    info!(dir = %dir.display(), patterns = ?patterns, "Cleaning");
    let removed = FileSetCleaner.clean(&dir, &patterns)?;

    println!("Removed {removed} file(s) from {}", dir.display());
    Ok(ExitCode::SUCCESS)
}

/// Process exit status for a failed task.
fn exit_status(err: &TaskError) -> u8 {
    match err.exit_code() {
        Some(code) => code.clamp(1, 255) as u8,
        None => TASK_ERROR_EXIT,
    }
}

//! Compiler process execution with streamed output.

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{TaskError, TaskResult};
use crate::resolver::ResolvedPaths;
use crate::sink::LogSink;

/// Keeps the compiler from stopping at an error to wait for keyboard input.
pub const BATCH_FLAG: &str = "-interaction=nonstopmode";

/// Prefix of the flag that points the compiler at the output directory.
pub const OUTPUT_DIR_FLAG: &str = "-output-directory=";

const INTERRUPT_MESSAGE: &str = "received interrupt signal while waiting for the compiler";

/// One compiler invocation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Invocation {
    /// Pass number, starting at 1.
    pub pass: u8,

    /// Executable to spawn.
    pub program: String,

    /// Arguments after the executable.
    pub args: Vec<String>,

    /// Time limit in seconds (0 = none).
    pub timeout_secs: u64,
}

impl Invocation {
    /// Create an invocation for an arbitrary command.
    pub fn new(pass: u8, program: impl Into<String>, args: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            pass,
            program: program.into(),
            args,
            timeout_secs,
        }
    }

    /// `<program> -interaction=nonstopmode -output-directory=<dir> <source>`
    pub fn compiler(program: &str, paths: &ResolvedPaths, pass: u8, timeout_secs: u64) -> Self {
        let args = vec![
            BATCH_FLAG.to_string(),
            format!("{}{}", OUTPUT_DIR_FLAG, paths.working_dir.display()),
            paths.source_file.display().to_string(),
        ];
        Self::new(pass, program, args, timeout_secs)
    }

    /// Executable followed by its arguments.
    pub fn command_line(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// Result of a compiler pass.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PassResult {
    /// Pass number.
    pub pass: u8,

    /// Exit code (0 = success, -1 = killed by a signal).
    pub exit_code: i32,

    /// Standard output, one entry per line, in emission order.
    pub output_lines: Vec<String>,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl PassResult {
    /// Whether this pass passed (exit code 0).
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }
}

/// Spawns the compiler and reports its exit code.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run one pass, forwarding every output line to `sink` as it is read.
    async fn run(&self, invocation: &Invocation, sink: &dyn LogSink) -> TaskResult<PassResult>;
}

/// Runner backed by `tokio::process`.
///
/// The child inherits the caller's working directory and environment.
/// Stdout is piped and drained line by line, stderr is inherited.
/// Without an interrupt channel a pass can only end by exiting or timing out.
#[derive(Debug, Default, Clone)]
pub struct TokioProcessRunner {
    interrupt: Option<watch::Receiver<bool>>,
}

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the running pass once `true` is published on `interrupt`.
    ///
    /// The caller owns the sender and decides what counts as an interrupt
    /// (the `texbuild` binary wires it to Ctrl-C).
    pub fn with_interrupt(interrupt: watch::Receiver<bool>) -> Self {
        Self {
            interrupt: Some(interrupt),
        }
    }
}

enum Waited {
    Exited(Vec<String>, std::io::Result<ExitStatus>),
    TimedOut,
    Interrupted,
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, invocation: &Invocation, sink: &dyn LogSink) -> TaskResult<PassResult> {
        let start = Instant::now();

        debug!(
            pass = invocation.pass,
            command = ?invocation.command_line(),
            "Spawning compiler"
        );

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TaskError::LaunchFailure {
                program: invocation.program.clone(),
                source,
            })?;

        let waited = {
            let work = drain_and_wait(&mut child, sink);
            tokio::pin!(work);

            tokio::select! {
                (lines, status) = &mut work => Waited::Exited(lines, status),
                _ = deadline(invocation.timeout_secs) => Waited::TimedOut,
                _ = interrupted(self.interrupt.clone()) => Waited::Interrupted,
            }
        };

        let (output_lines, status) = match waited {
            Waited::Exited(lines, status) => (lines, status),
            Waited::TimedOut => {
                kill(&mut child).await;
                return Err(TaskError::Timeout {
                    pass: invocation.pass,
                    limit_secs: invocation.timeout_secs,
                });
            }
            Waited::Interrupted => {
                kill(&mut child).await;
                return Err(TaskError::Interrupted(INTERRUPT_MESSAGE.to_string()));
            }
        };

        let status = status.map_err(|e| TaskError::Interrupted(e.to_string()))?;
        let exit_code = status.code().unwrap_or(-1);
        let duration_ms = start.elapsed().as_millis() as u64;

        debug!(pass = invocation.pass, exit_code, duration_ms, "Compiler exited");

        Ok(PassResult {
            pass: invocation.pass,
            exit_code,
            output_lines,
            duration_ms,
        })
    }
}

/// Drain stdout to EOF, then reap the child.
async fn drain_and_wait(
    child: &mut Child,
    sink: &dyn LogSink,
) -> (Vec<String>, std::io::Result<ExitStatus>) {
    let lines = match child.stdout.take() {
        Some(stdout) => forward_lines(stdout, sink).await,
        None => Vec::new(),
    };
    let status = child.wait().await;
    (lines, status)
}

/// Forward each line to the sink before reading the next one.
///
/// Bytes are decoded lossily; TeX engines happily print 8-bit text. A read
/// error is logged once and ends the drain without failing the pass.
async fn forward_lines<R>(output: R, sink: &dyn LogSink) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(output);
    let mut lines = Vec::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(trim_line_ending(&buf)).into_owned();
                sink.log(&line);
                lines.push(line);
            }
            Err(e) => {
                warn!(error = %e, "Compiler output stream failed");
                sink.log(&format!("Compiler output ceased to function: {e}"));
                break;
            }
        }
    }

    lines
}

fn trim_line_ending(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

async fn deadline(timeout_secs: u64) {
    if timeout_secs == 0 {
        std::future::pending::<()>().await
    } else {
        tokio::time::sleep(Duration::from_secs(timeout_secs)).await
    }
}

async fn interrupted(interrupt: Option<watch::Receiver<bool>>) {
    let Some(mut rx) = interrupt else {
        return std::future::pending().await;
    };
    let closed = rx.wait_for(|flag| *flag).await.is_err();
    // A dropped sender can no longer interrupt.
    if closed {
        std::future::pending::<()>().await
    }
}

async fn kill(child: &mut Child) {
    if let Err(e) = child.kill().await {
        warn!(error = %e, "Failed to kill compiler process");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemorySink;
    use std::io;
    use std::path::PathBuf;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Serves `data` once, then fails every read.
    struct BrokenPipe {
        data: &'static [u8],
        served: bool,
    }

    impl AsyncRead for BrokenPipe {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.served {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "pipe closed",
                )));
            }
            self.served = true;
            buf.put_slice(self.data);
            Poll::Ready(Ok(()))
        }
    }

    fn paths() -> ResolvedPaths {
        ResolvedPaths {
            working_dir: PathBuf::from("/work/thesis"),
            source_file: PathBuf::from("/work/thesis/main.tex"),
        }
    }

    #[test]
    fn test_compiler_invocation_arguments() {
        let inv = Invocation::compiler("pdflatex", &paths(), 1, 0);
        assert_eq!(
            inv.command_line(),
            vec![
                "pdflatex",
                "-interaction=nonstopmode",
                "-output-directory=/work/thesis",
                "/work/thesis/main.tex",
            ]
        );
    }

    #[test]
    fn test_source_is_last_argument() {
        let inv = Invocation::compiler("xelatex", &paths(), 2, 30);
        assert_eq!(inv.args.last().unwrap(), "/work/thesis/main.tex");
        assert_eq!(inv.pass, 2);
        assert_eq!(inv.timeout_secs, 30);
    }

    #[test]
    fn test_trim_line_ending() {
        assert_eq!(trim_line_ending(b"abc\n"), b"abc");
        assert_eq!(trim_line_ending(b"abc\r\n"), b"abc");
        assert_eq!(trim_line_ending(b"abc"), b"abc");
    }

    #[test]
    fn test_pass_result_passed() {
        let result = PassResult {
            pass: 1,
            exit_code: 0,
            output_lines: vec![],
            duration_ms: 10,
        };
        assert!(result.passed());

        let failed = PassResult {
            exit_code: 1,
            ..result
        };
        assert!(!failed.passed());
    }

    #[tokio::test]
    async fn test_read_failure_keeps_earlier_lines_and_logs_once() {
        let sink = MemorySink::new();
        let output = BrokenPipe {
            data: b"This is pdfTeX\r\nOutput written on doc.pdf\n",
            served: false,
        };

        let lines = forward_lines(output, &sink).await;

        assert_eq!(lines, vec!["This is pdfTeX", "Output written on doc.pdf"]);
        let logged = sink.lines();
        assert_eq!(logged.len(), 3);
        assert_eq!(&logged[..2], &lines[..]);
        assert_eq!(
            logged
                .iter()
                .filter(|l| l.contains("ceased to function"))
                .count(),
            1
        );
        assert!(logged[2].ends_with("pipe closed"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_streams_lines_in_order() {
        let sink = MemorySink::new();
        let inv = Invocation::new(
            1,
            "sh",
            vec!["-c".into(), "printf 'one\\ntwo\\nthree\\n'".into()],
            0,
        );

        let result = TokioProcessRunner::new().run(&inv, &sink).await.expect("run failed");
        assert!(result.passed());
        assert_eq!(result.output_lines, vec!["one", "two", "three"]);
        assert_eq!(sink.lines(), vec!["one", "two", "three"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_reports_nonzero_exit() {
        let sink = MemorySink::new();
        let inv = Invocation::new(1, "sh", vec!["-c".into(), "exit 7".into()], 0);

        let result = TokioProcessRunner::new().run(&inv, &sink).await.expect("run failed");
        assert!(!result.passed());
        assert_eq!(result.exit_code, 7);
    }

    #[tokio::test]
    async fn test_run_missing_executable_is_launch_failure() {
        let sink = MemorySink::new();
        let inv = Invocation::new(1, "texbuild-no-such-compiler", vec![], 0);

        let err = TokioProcessRunner::new().run(&inv, &sink).await.unwrap_err();
        assert!(
            matches!(err, TaskError::LaunchFailure { ref program, .. } if program == "texbuild-no-such-compiler")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_times_out() {
        let sink = MemorySink::new();
        let inv = Invocation::new(1, "sh", vec!["-c".into(), "sleep 30".into()], 1);

        let err = TokioProcessRunner::new().run(&inv, &sink).await.unwrap_err();
        assert!(matches!(err, TaskError::Timeout { pass: 1, limit_secs: 1 }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_interrupt_kills_compiler() {
        let sink = MemorySink::new();
        let (tx, rx) = watch::channel(false);
        let runner = TokioProcessRunner::with_interrupt(rx);
        let inv = Invocation::new(1, "sh", vec!["-c".into(), "sleep 30".into()], 0);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let _ = tx.send(true);
        });

        let start = Instant::now();
        let err = runner.run(&inv, &sink).await.unwrap_err();
        assert!(matches!(err, TaskError::Interrupted(ref msg) if msg == INTERRUPT_MESSAGE));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_ignores_closed_interrupt_channel() {
        let sink = MemorySink::new();
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let runner = TokioProcessRunner::with_interrupt(rx);
        let inv = Invocation::new(1, "sh", vec!["-c".into(), "echo done".into()], 0);

        let result = runner.run(&inv, &sink).await.expect("run failed");
        assert!(result.passed());
        assert_eq!(sink.lines(), vec!["done"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_large_output_does_not_stall() {
        let sink = MemorySink::new();
        let inv = Invocation::new(
            1,
            "sh",
            vec!["-c".into(), "i=0; while [ $i -lt 20000 ]; do echo line$i; i=$((i+1)); done".into()],
            60,
        );

        let result = TokioProcessRunner::new().run(&inv, &sink).await.expect("run failed");
        assert!(result.passed());
        assert_eq!(result.output_lines.len(), 20000);
        assert_eq!(result.output_lines.last().unwrap(), "line19999");
    }
}

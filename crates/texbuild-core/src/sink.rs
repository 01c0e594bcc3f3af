//! Line-oriented log sink.

use crate::telemetry::COMPILER_TARGET;

/// Receives one line at a time: compiler output, phase summaries, errors.
pub trait LogSink: Send + Sync {
    fn log(&self, line: &str);
}

/// Sink that emits each line as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, line: &str) {
        tracing::info!(target: COMPILER_TARGET, "{line}");
    }
}

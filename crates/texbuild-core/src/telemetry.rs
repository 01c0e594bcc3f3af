//! Tracing setup for the texbuild binary.
//!
//! Compiler output and cleanup notices are emitted under their own targets
//! so they can be filtered apart from the task's diagnostics, e.g.
//! `RUST_LOG=texbuild::compiler=off` hides the compiler transcript.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Target of every compiler output line forwarded by [`TracingSink`](crate::sink::TracingSink).
pub const COMPILER_TARGET: &str = "texbuild::compiler";

/// Target of per-file cleanup notices.
pub const CLEAN_TARGET: &str = "texbuild::clean";

/// Filter used when `RUST_LOG` is unset.
///
/// Our own crates log at `level`; the transcript and cleanup targets stay at
/// `info` so `--verbose` adds diagnostics without changing them, and
/// dependencies are held at `warn`.
pub fn default_filter(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    format!(
        "warn,texbuild_core={level},texbuild={level},{COMPILER_TARGET}=info,{CLEAN_TARGET}=info"
    )
}

/// Install the global subscriber. Only the first call takes effect.
///
/// * `json`: newline-delimited JSON with targets, for log collectors.
/// * `level`: verbosity of texbuild's own diagnostics when `RUST_LOG` is unset.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true).json())
            .try_init()
            .ok();
    } else {
        // Plain mode reads like a compiler transcript: no timestamps or targets.
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).without_time())
            .try_init()
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_pins_transcript_targets() {
        let filter = default_filter(Level::DEBUG);
        assert!(filter.starts_with("warn,"));
        assert!(filter.contains("texbuild_core=debug"));
        assert!(filter.contains("texbuild::compiler=info"));
        assert!(filter.contains("texbuild::clean=info"));
        assert!(EnvFilter::try_new(&filter).is_ok());
    }

    #[test]
    fn init_twice_is_harmless() {
        init_tracing(false, Level::INFO);
        init_tracing(true, Level::DEBUG);
        tracing::info!(target: COMPILER_TARGET, "still logging");
    }
}

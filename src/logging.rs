//! Logging façade: a `tracing` subscriber initialized once in `main`.
//!
//! Grounded on `core/log.h`'s four-level model (error/warn/info/debug),
//! rendered onto `tracing`'s levels of the same names. Unlike the C
//! source's mutable global level, the level is threaded in explicitly as
//! a `Level` chosen by configuration and `--verbose`.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber at `level`, writing to stderr. Safe
/// to call once per process; a second call is a no-op rather than a
/// panic, since tests may initialize logging more than once.
pub fn init(level: Level) {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Map a `--verbose` repeat count onto a level, starting from `base`.
pub fn level_for_verbosity(base: Level, extra: u8) -> Level {
    let mut level = base;
    for _ in 0..extra {
        level = match level {
            Level::ERROR => Level::WARN,
            Level::WARN => Level::INFO,
            Level::INFO => Level::DEBUG,
            Level::DEBUG | Level::TRACE => Level::TRACE,
        };
    }
    level
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_escalates_up_to_trace() {
        assert_eq!(level_for_verbosity(Level::INFO, 0), Level::INFO);
        assert_eq!(level_for_verbosity(Level::INFO, 1), Level::DEBUG);
        assert_eq!(level_for_verbosity(Level::INFO, 2), Level::TRACE);
        assert_eq!(level_for_verbosity(Level::INFO, 5), Level::TRACE);
    }
}

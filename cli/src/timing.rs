//! Tracing setup for the CLI.
//!
//! With `--timing`, spans close with their duration (`FmtSpan::CLOSE`), so
//! every `#[instrument]`ed batch and transfer step reports how long it took.
//! `RUST_LOG` still overrides the default level.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

/// Default level when `RUST_LOG` is unset.
///
/// Span close events are emitted at INFO, so timing needs at least that.
pub fn default_level(verbose: bool, timing: bool) -> LevelFilter {
    if verbose {
        LevelFilter::DEBUG
    } else if timing {
        LevelFilter::INFO
    } else {
        LevelFilter::WARN
    }
}

pub fn init_tracing(verbose: bool, timing: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(default_level(verbose, timing).into())
        .from_env_lossy();

    let span_events = if timing {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    // stdout stays clean for tables and completion scripts.
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(verbose)
                .with_level(true)
                .with_span_events(span_events)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    // The global subscriber can only be installed once per process, so only
    // the level selection is tested here.
    #[test]
    fn test_default_level() {
        assert_eq!(default_level(false, false), LevelFilter::WARN);
        assert_eq!(default_level(false, true), LevelFilter::INFO);
        assert_eq!(default_level(true, false), LevelFilter::DEBUG);
        assert_eq!(default_level(true, true), LevelFilter::DEBUG);
    }
}

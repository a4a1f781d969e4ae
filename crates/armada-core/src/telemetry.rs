//! Tracing initialisation for the armada binary.
//!
//! One call at program start wires the global subscriber. Stage progress is
//! logged at `info`, per-repo detail at `debug` (the `--verbose` flag), and
//! `RUST_LOG` overrides both when set.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the global tracing subscriber.
///
/// * `json` — emit newline-delimited JSON log lines instead of human text
///   (useful when armada runs under a log aggregator).
/// * `verbose` — default to `debug` instead of `info` when `RUST_LOG` is
///   not set.
///
/// Calling more than once is harmless; only the first call takes effect,
/// since the global subscriber can be set once per process.
pub fn init_tracing(json: bool, verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        registry
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}

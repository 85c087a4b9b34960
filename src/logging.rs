//! Subscriber setup for binaries embedding a view.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

const DEFAULT_DIRECTIVES: &str = "cigraph=info";

/// Install a global `fmt` subscriber writing to stderr.
///
/// Directives come from `RUST_LOG` and fall back to `cigraph=info`. Returns
/// an error if a global subscriber is already set.
pub fn init() -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let stderr_is_tty = std::io::IsTerminal::is_terminal(&std::io::stderr());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(stderr_is_tty)
                .with_target(true)
                .compact(),
        )
        .try_init()
}

//! Log output for the command line tool.
//!
//! The libraries log through the `log` facade; the subscriber installed
//! here bridges those records into `tracing` and writes them to stderr.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Level for our own crates at a given `-v` count.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Default filter directives; other crates stay at `warn`.
pub fn default_directives(verbosity: u8) -> String {
    let level = level_for(verbosity);
    format!(
        "warn,ftpgrab={},ftpgrab_core={},ftpgrab_ftp={}",
        level, level, level
    )
}

/// Install the global subscriber. `RUST_LOG` overrides the `-v` level.
///
/// Fails only if a subscriber is already installed.
pub fn init_logging(verbosity: u8) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbosity)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbosity >= 1)
                .with_file(verbosity >= 2)
                .with_line_number(verbosity >= 2),
        )
        .try_init()
        .map_err(|e| e.to_string())
}

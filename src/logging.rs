//! Logging setup shared by both binaries.
//!
//! Logs always go to stderr: stdout carries the MCP channel.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Determines the log level from CLI arguments and the configured level.
#[must_use]
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
pub fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN,
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
///
/// `RUST_LOG` directives are honoured; `level` is added on top.
pub fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

//! revit-mcp: MCP server exposing a Revit instance's routes as tools.
//!
//! Speaks MCP over stdio and forwards every tool call to the host's route
//! server over HTTP.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use revit_mcp_bridge::bridge::Invoker;
use revit_mcp_bridge::config;
use revit_mcp_bridge::logging::{get_log_level, init_tracing};
use revit_mcp_bridge::mcp::{McpServer, Timeouts, ToolRegistry};

/// MCP server exposing Revit operations as tools.
///
/// Tool calls are forwarded to the routes served inside Revit
/// (by default `http://localhost:48884/revit_mcp`).
#[derive(Parser, Debug)]
#[command(name = "revit-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

/// Entry point for the revit-mcp server.
fn main() -> ExitCode {
    let args = Args::parse();

    let config_path = args.config.as_deref();
    let cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if config_path.is_none() {
                if let Some(default_path) = config::default_config_path() {
                    eprintln!("\nConfig read from: {}", default_path.display());
                }
            }
            return ExitCode::FAILURE;
        }
    };

    init_tracing(get_log_level(args.verbose, args.quiet, &cfg.logging.level));

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting revit-mcp server"
    );

    let base_url = cfg.revit.base_url();
    let invoker = match Invoker::new(&base_url, cfg.revit.timeout()) {
        Ok(invoker) => invoker,
        Err(e) => {
            error!(error = %e, base_url = %base_url, "Cannot create HTTP client");
            return ExitCode::FAILURE;
        }
    };
    let registry = match ToolRegistry::with_defaults(Timeouts::from_config(&cfg.revit)) {
        Ok(registry) => registry,
        Err(e) => {
            error!(error = %e, "Cannot register tools");
            return ExitCode::FAILURE;
        }
    };

    info!(base_url = %base_url, tools = registry.len(), "MCP server ready, waiting for client connection...");

    let mut server = McpServer::new(registry, invoker);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(server.run()) {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn parses_flags() {
        let args = Args::try_parse_from(["revit-mcp", "-vv", "--config", "/tmp/c.json"]).unwrap();
        assert_eq!(args.verbose, 2);
        assert!(!args.quiet);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/c.json")));
    }
}

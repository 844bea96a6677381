//! revit-mcp-host: serves the Revit routes over a simulated host session.
//!
//! Stand-in for the extension that runs inside Revit, for exercising the MCP
//! server and the route framework locally.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use revit_mcp_bridge::config::{self, Config};
use revit_mcp_bridge::host::{self, Document, Session};
use revit_mcp_bridge::logging::{get_log_level, init_tracing};
use revit_mcp_bridge::routes::{self, Api, CallbackDispatcher, ContextSlot, Executor};

/// Serve the Revit MCP routes over a simulated document.
#[derive(Parser, Debug)]
#[command(name = "revit-mcp-host")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides `host.port`)
    #[arg(short, long)]
    port: Option<u16>,

    /// Start with no open document
    #[arg(long)]
    no_document: bool,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

async fn serve(cfg: Config, session: Session) -> Result<(), Box<dyn std::error::Error>> {
    let mut api = Api::new(cfg.revit.api_name.trim());
    host::register_all(&mut api)?;
    info!(api = api.namespace(), routes = api.routes().len(), "Routes registered");

    let slot = ContextSlot::spawn(session)?;
    let executor = Executor::new(api, slot);
    let dispatcher = CallbackDispatcher::new(cfg.host.callback_timeout())?;

    let address = cfg.host.listen_address();
    let listener = TcpListener::bind(&address).await?;
    if !cfg.host.is_loopback() {
        warn!(%address, "Routes are unauthenticated and reachable beyond loopback");
    }

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
        }
    };
    routes::serve(listener, routes::router(executor, dispatcher), shutdown).await?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let mut cfg = match config::load_config(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(port) = args.port {
        cfg.host.port = port;
    }

    init_tracing(get_log_level(args.verbose, args.quiet, &cfg.logging.level));

    let session = if args.no_document {
        Session::new()
    } else {
        Session::with_document(Document::sample())
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(serve(cfg, session)) {
        Ok(()) => {
            info!("Host server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Host server error");
            ExitCode::FAILURE
        }
    }
}

//! revit-mcp-bridge: lets an MCP client drive a running Revit instance.
//!
//! Two processes cooperate:
//!
//! - **Host side**: a small HTTP route framework ([`routes`]) running next to
//!   the host application. Routes are grouped under an API namespace and may
//!   declare that they need the host's single privileged execution context.
//!   A request carrying `callbackUrl` is acknowledged at once and its result
//!   is POSTed to that URL later.
//! - **MCP side**: an MCP server ([`mcp`]) over stdio. Every tool maps onto
//!   exactly one route call made through the [`bridge`] invoker.
//!
//! The [`host`] module is a simulated host session used by the bundled
//! `revit-mcp-host` binary and the tests.
//!
//! # Security
//!
//! The route server has no authentication. Keep it bound to loopback.
//!
//! # Modules
//!
//! - [`bridge`]: Outbound HTTP calls and callback delivery
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Error types
//! - [`host`]: Simulated host session and its routes
//! - [`logging`]: tracing setup
//! - [`mcp`]: MCP protocol implementation
//! - [`routes`]: Host-side route framework

pub mod bridge;
pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod mcp;
pub mod routes;

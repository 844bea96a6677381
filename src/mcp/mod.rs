//! Model Context Protocol (MCP) server.
//!
//! Exposes the host's routes as MCP tools. The server speaks JSON-RPC 2.0
//! over stdio and forwards each tool call to the host over HTTP.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          MCP Server                          │
//! │                                                              │
//! │   ┌─────────────┐    ┌─────────────┐    ┌──────────────┐     │
//! │   │  Transport  │───▶│   Server    │───▶│ ToolRegistry │     │
//! │   │   (stdio)   │    │ (lifecycle) │    │ (tool → Call)│     │
//! │   └─────────────┘    └─────────────┘    └──────────────┘     │
//! │                             │                                │
//! │                             ▼                                │
//! │                      ┌─────────────┐                         │
//! │                      │   Invoker   │──── HTTP ───▶ host      │
//! │                      └─────────────┘                         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! This implementation targets MCP protocol version 2024-11-05.

pub mod protocol;
pub mod server;
pub mod tools;
pub mod transport;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use server::{format_result, McpServer, ServerState};
pub use tools::{Timeouts, ToolCallResult, ToolContent, ToolDefinition, ToolRegistry, ToolSpec};
pub use transport::{StdioTransport, Transport};

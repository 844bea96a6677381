//! Client side of the bridge: calling the host's routes over HTTP.
//!
//! The MCP server maps every tool call onto exactly one [`Call`] and runs it
//! through an [`Invoker`]. The host-side dispatcher reuses [`deliver`] to push
//! deferred results to callback URLs.

pub mod invoker;

pub use invoker::{deliver, path_segment, Call, Expect, Invoker, Payload};

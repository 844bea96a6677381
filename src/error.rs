//! Error types for revit-mcp-bridge.
//!
//! Each concern gets its own enum:
//!
//! - [`ConfigError`]: loading and validating the configuration file
//! - [`InvokeError`]: outbound calls made by the [`Invoker`](crate::bridge::Invoker)
//! - [`ClientError`]: inbound requests that never reach a handler
//! - [`RegistrationError`]: building an [`Api`](crate::routes::Api) or a
//!   [`ToolRegistry`](crate::mcp::ToolRegistry) at startup
//!
//! Handler failures are not errors in this sense: they are carried as a
//! [`Fault`](crate::routes::Fault) and always rendered into a response.

use std::path::PathBuf;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use thiserror::Error;

use crate::routes::ParamType;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Errors returned by a single outbound call.
///
/// Calls are never retried; callers decide what to do with each variant.
#[derive(Error, Debug)]
pub enum InvokeError {
    /// The peer answered with a non-2xx status.
    #[error("{status} - {body}")]
    Remote {
        /// HTTP status code returned by the peer.
        status: u16,
        /// Response body as text.
        body: String,
    },

    /// No response arrived within the configured bound.
    #[error("request timed out after {}s", after.as_secs_f64())]
    Timeout {
        /// The timeout that elapsed.
        after: Duration,
    },

    /// A response arrived but its payload could not be decoded.
    #[error("failed to decode response: {message}")]
    Decode {
        /// What went wrong while decoding.
        message: String,
    },

    /// The request could not be sent (connection refused, DNS, TLS, ...).
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The target URL could not be built.
    #[error("invalid endpoint url: {url}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
    },
}

/// Inbound request problems detected before any handler runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// No route matches the path.
    #[error("no route matches {path}")]
    NotFound {
        /// The requested path.
        path: String,
    },

    /// A route matches the path but does not accept the method.
    #[error("method {method} is not allowed for {path}")]
    MethodNotAllowed {
        /// The requested method.
        method: Method,
        /// The requested path.
        path: String,
    },

    /// A typed path segment did not parse as its declared type.
    #[error("path parameter '{name}' expects {expected}, got '{value}'")]
    InvalidParameter {
        /// Declared parameter name.
        name: String,
        /// Declared parameter type.
        expected: ParamType,
        /// The raw segment text.
        value: String,
    },
}

impl ClientError {
    /// HTTP status used when this error is rendered as a response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

/// Errors raised while registering routes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// The same path and method were registered twice in one namespace.
    #[error("route {method} {path} is already registered")]
    DuplicateRoute {
        /// Conflicting method.
        method: Method,
        /// Normalised route pattern.
        path: String,
    },

    /// The route pattern could not be parsed.
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern as written.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A route was registered without any method.
    #[error("route '{pattern}' declares no methods")]
    NoMethods {
        /// The pattern as written.
        pattern: String,
    },

    /// Two MCP tools share a name.
    #[error("tool '{name}' is already registered")]
    DuplicateTool {
        /// The tool name.
        name: String,
    },
}

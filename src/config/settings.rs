//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::net::IpAddr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Where the MCP server finds the host's routes.
    #[serde(default)]
    pub revit: RevitConfig,

    /// Settings for the bundled host server.
    #[serde(default)]
    pub host: HostConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let api_name = self.revit.api_name.trim();
        if api_name.is_empty() {
            return Err(invalid("revit.api_name must not be empty"));
        }
        if api_name.contains('/') {
            return Err(invalid(format!(
                "revit.api_name '{api_name}' must not contain '/'"
            )));
        }
        if self.revit.host.trim().is_empty() {
            return Err(invalid("revit.host must not be empty"));
        }

        let non_zero = [
            ("revit.port", u64::from(self.revit.port)),
            ("revit.timeout_secs", self.revit.timeout_secs),
            ("revit.status_timeout_secs", self.revit.status_timeout_secs),
            ("revit.image_timeout_secs", self.revit.image_timeout_secs),
            ("host.port", u64::from(self.host.port)),
            ("host.callback_timeout_secs", self.host.callback_timeout_secs),
        ];
        if let Some((name, _)) = non_zero.iter().find(|(_, value)| *value == 0) {
            return Err(invalid(format!("{name} must be greater than zero")));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        message: message.into(),
    }
}

/// Connection to the host's routes server.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RevitConfig {
    /// Host name or address of the routes server.
    /// Default: "localhost"
    #[serde(default = "default_revit_host")]
    pub host: String,

    /// Routes server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// API namespace the routes are mounted under.
    #[serde(default = "default_api_name")]
    pub api_name: String,

    /// Timeout for ordinary calls, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Timeout for the status check, in seconds.
    #[serde(default = "default_status_timeout_secs")]
    pub status_timeout_secs: u64,

    /// Timeout for view image exports, in seconds.
    #[serde(default = "default_image_timeout_secs")]
    pub image_timeout_secs: u64,
}

impl RevitConfig {
    /// Base URL of the API, e.g. `http://localhost:48884/revit_mcp`.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!(
            "http://{}:{}/{}",
            self.host.trim(),
            self.port,
            self.api_name.trim().trim_matches('/')
        )
    }

    /// Timeout for ordinary calls.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Timeout for the status check.
    #[must_use]
    pub const fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status_timeout_secs)
    }

    /// Timeout for image exports.
    #[must_use]
    pub const fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout_secs)
    }
}

impl Default for RevitConfig {
    fn default() -> Self {
        Self {
            host: default_revit_host(),
            port: default_port(),
            api_name: default_api_name(),
            timeout_secs: default_timeout_secs(),
            status_timeout_secs: default_status_timeout_secs(),
            image_timeout_secs: default_image_timeout_secs(),
        }
    }
}

fn default_revit_host() -> String {
    "localhost".to_string()
}

const fn default_port() -> u16 {
    48884
}

fn default_api_name() -> String {
    "revit_mcp".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_status_timeout_secs() -> u64 {
    10
}

const fn default_image_timeout_secs() -> u64 {
    60
}

/// Settings for `revit-mcp-host`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Address to bind. Default: "127.0.0.1"
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Timeout for callback deliveries, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub callback_timeout_secs: u64,
}

impl HostConfig {
    /// `bind_address:port`.
    #[must_use]
    pub fn listen_address(&self) -> String {
        let bind = self.bind_address.trim();
        match bind.parse::<IpAddr>() {
            Ok(IpAddr::V6(_)) => format!("[{bind}]:{}", self.port),
            _ => format!("{bind}:{}", self.port),
        }
    }

    /// Whether `bind_address` only accepts local connections.
    #[must_use]
    pub fn is_loopback(&self) -> bool {
        let bind = self.bind_address.trim();
        bind.eq_ignore_ascii_case("localhost")
            || bind.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
    }

    /// Timeout for callback deliveries.
    #[must_use]
    pub const fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            callback_timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

//! Global wire and logging configuration.
//!
//! This module defines the settings that apply to the whole engine: which
//! side of the connection it decodes for, the connection-id length it
//! issues, the versions it accepts, the key-retry policy, and logging.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use quicwire_core::packet::EndpointContext;
use quicwire_core::types::{Side, MAX_CID_LENGTH};
use quicwire_core::version::Version;

/// Which endpoint role the engine decodes packets for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointSide {
    Client,
    Server,
}

impl From<EndpointSide> for Side {
    fn from(side: EndpointSide) -> Self {
        match side {
            EndpointSide::Client => Side::Client,
            EndpointSide::Server => Side::Server,
        }
    }
}

impl std::str::FromStr for EndpointSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "client" => Ok(EndpointSide::Client),
            "server" => Ok(EndpointSide::Server),
            _ => Err(format!("Invalid endpoint side: {}", s)),
        }
    }
}

/// Wire-level decoding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireConfig {
    /// Role of the local endpoint.
    ///
    /// A server derives Initial keys from each client's DCID on its own;
    /// a client needs them installed.
    ///
    /// **Default:** `server`
    pub side: EndpointSide,

    /// Length of every connection ID this endpoint issues.
    ///
    /// Short-header packets carry no DCID length, so this is how the
    /// decoder finds where the DCID ends.
    ///
    /// **Default:** `8`
    pub local_cid_len: usize,

    /// Accepted versions, by name (`v1`, `draft-29` ... `draft-32`).
    ///
    /// **Default:** all of them
    pub supported_versions: Vec<String>,

    /// Times a datagram is re-queued while its keys are missing.
    ///
    /// **Default:** `3`
    pub max_retries: u8,

    /// Wait for room in the ingress queue when re-queuing.
    ///
    /// **Default:** `5` ms
    pub retry_timeout_ms: u64,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            side: EndpointSide::Server,
            local_cid_len: 8,
            supported_versions: Version::ALL.iter().map(|v| v.name().to_string()).collect(),
            max_retries: 3,
            retry_timeout_ms: 5,
        }
    }
}

impl WireConfig {
    pub fn side(&self) -> Side {
        self.side.into()
    }

    pub fn retry_timeout(&self) -> Duration {
        Duration::from_millis(self.retry_timeout_ms)
    }

    /// Resolve `supported_versions`, skipping unknown names.
    pub fn versions(&self) -> Vec<Version> {
        self.supported_versions
            .iter()
            .filter_map(|name| Version::from_name(name))
            .collect()
    }

    /// A fresh parse context for this configuration.
    pub fn endpoint_context(&self) -> EndpointContext {
        EndpointContext::new(self.side(), self.local_cid_len, self.versions())
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.local_cid_len > MAX_CID_LENGTH {
            errors.push(format!(
                "local_cid_len ({}) exceeds the maximum of {} bytes",
                self.local_cid_len, MAX_CID_LENGTH
            ));
        }

        if self.supported_versions.is_empty() {
            errors.push("supported_versions must not be empty".to_string());
        }

        let mut seen = HashSet::new();
        for name in &self.supported_versions {
            match Version::from_name(name) {
                Some(version) => {
                    if !seen.insert(version) {
                        errors.push(format!("Duplicate version '{}'", name));
                    }
                }
                None => errors.push(format!("Unknown version '{}'", name)),
            }
        }

        if self.max_retries > 0 && self.retry_timeout_ms == 0 {
            errors.push("retry_timeout_ms must be > 0 when retries are enabled".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is not set.
    ///
    /// **Default:** `Info`
    pub level: LogLevel,

    /// Enable ANSI color codes in logs.
    ///
    /// **Default:** `true`
    pub enable_colors: bool,

    /// Include source file and line number in logs.
    ///
    /// **Default:** `false`
    pub include_file_line: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            enable_colors: true,
            include_file_line: false,
        }
    }
}

/// Log level enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

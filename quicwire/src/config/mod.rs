//! Engine configuration module.
//!
//! # Architecture
//!
//! - **Wire:** endpoint role, connection-id length, versions, key retries
//! - **Pipeline:** queue capacities and timeouts between the workers
//! - **Buffer pool:** datagram buffer size and retention
//! - **Logging:** level and formatting
//!
//! Precedence: defaults < TOML file < `QUICWIRE_` environment < CLI.
//!
//! # Example
//!
//! ```toml
//! [wire]
//! side = "server"
//! local_cid_len = 8
//! supported_versions = ["v1", "draft-29"]
//!
//! [pipeline]
//! ingress_capacity = 1024
//! offer_timeout_ms = 1000
//!
//! [logging]
//! level = "debug"
//! ```

pub mod global;
pub mod loader;
pub mod validation;


pub use global::{EndpointSide, LogLevel, LoggingConfig, WireConfig};
pub use loader::{load_config, CliArgs};
pub use validation::ConfigValidator;

use serde::{Deserialize, Serialize};

use crate::channel_config::PipelineConfig;
use crate::netio::BufferPoolConfig;

/// Top-level configuration composing all sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub wire: WireConfig,
    pub pipeline: PipelineConfig,
    pub buffer_pool: BufferPoolConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    fn sections(&self) -> [&dyn ConfigValidator; 4] {
        [&self.wire, &self.pipeline, &self.buffer_pool, &self.logging]
    }

    /// Validate every section, then the cross-section limits.
    ///
    /// Errors are prefixed with their section; cross-section findings are
    /// logged as warnings and never fail validation.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for section in self.sections() {
            if let Err(e) = section.validate() {
                errors.extend(e.into_iter().map(|err| format!("[{}] {}", section.section(), err)));
            }
        }

        validation::validate_resource_limits(self);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

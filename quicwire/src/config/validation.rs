//! Configuration validation utilities.
//!
//! Every section validates itself; this module ties the sections together
//! and adds the checks that span more than one of them.

use super::AppConfig;
use crate::channel_config::PipelineConfig;
use crate::config::global::{LoggingConfig, WireConfig};
use crate::netio::BufferPoolConfig;

/// Configuration validator trait.
pub trait ConfigValidator {
    /// Section name used to prefix error messages.
    fn section(&self) -> &'static str;

    /// Validate the configuration.
    ///
    /// Returns `Ok(())` if valid, or a list of error messages if invalid.
    fn validate(&self) -> Result<(), Vec<String>>;
}

impl ConfigValidator for WireConfig {
    fn section(&self) -> &'static str {
        "wire"
    }

    fn validate(&self) -> Result<(), Vec<String>> {
        WireConfig::validate(self)
    }
}

impl ConfigValidator for PipelineConfig {
    fn section(&self) -> &'static str {
        "pipeline"
    }

    fn validate(&self) -> Result<(), Vec<String>> {
        PipelineConfig::validate(self)
    }
}

impl ConfigValidator for BufferPoolConfig {
    fn section(&self) -> &'static str {
        "buffer_pool"
    }

    fn validate(&self) -> Result<(), Vec<String>> {
        BufferPoolConfig::validate(self)
    }
}

impl ConfigValidator for LoggingConfig {
    fn section(&self) -> &'static str {
        "logging"
    }

    fn validate(&self) -> Result<(), Vec<String>> {
        Ok(())
    }
}

/// Validate resource limits make sense together.
///
/// Returns warnings only; none of these combinations is invalid.
pub fn validate_resource_limits(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    // every queued datagram holds on to its buffer allocation
    if config.buffer_pool.max_buffers < config.pipeline.ingress_capacity {
        warnings.push(format!(
            "buffer_pool.max_buffers ({}) is smaller than pipeline.ingress_capacity ({}); \
             a full ingress queue will allocate past the pool",
            config.buffer_pool.max_buffers, config.pipeline.ingress_capacity
        ));
    }

    if config.wire.max_retries > 0
        && config.wire.retry_timeout_ms >= config.pipeline.offer_timeout_ms
    {
        warnings.push(format!(
            "wire.retry_timeout_ms ({}) is not shorter than pipeline.offer_timeout_ms ({})",
            config.wire.retry_timeout_ms, config.pipeline.offer_timeout_ms
        ));
    }

    for warning in &warnings {
        tracing::warn!("{}", warning);
    }
    warnings
}

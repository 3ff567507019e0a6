//! Queue configuration for the receive pipeline.
//!
//! Two bounded queues connect the workers:
//!
//! ```text
//! source -> ReceiveWorker -> [ingress] -> ParsingWorker -> [egress] -> consumer
//! ```
//!
//! A full queue blocks the producer for at most `offer_timeout_ms`; running
//! out of that time is fatal to the producing worker.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Queue capacities and timing for the two pipeline stages.
///
/// Capacities count messages: datagrams on the ingress queue, decoded
/// packets on the egress queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Capacity of the ingress queue (receive worker -> parsing worker).
    ///
    /// Default: 1024
    #[serde(default = "default_ingress_capacity")]
    pub ingress_capacity: usize,

    /// Capacity of the egress queue (parsing worker -> consumer).
    ///
    /// A datagram can carry several coalesced packets, so this is usually
    /// larger than the ingress capacity.
    ///
    /// Default: 4096
    #[serde(default = "default_egress_capacity")]
    pub egress_capacity: usize,

    /// How long a producer waits on a full queue before failing.
    ///
    /// Default: 1000 ms
    #[serde(default = "default_offer_timeout_ms")]
    pub offer_timeout_ms: u64,

    /// How often idle workers wake up to check for shutdown.
    ///
    /// Default: 50 ms
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_ingress_capacity() -> usize {
    1024
}

fn default_egress_capacity() -> usize {
    4096
}

fn default_offer_timeout_ms() -> u64 {
    1000
}

fn default_poll_interval_ms() -> u64 {
    50
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ingress_capacity: default_ingress_capacity(),
            egress_capacity: default_egress_capacity(),
            offer_timeout_ms: default_offer_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl PipelineConfig {
    pub fn offer_timeout(&self) -> Duration {
        Duration::from_millis(self.offer_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validate queue configuration.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.ingress_capacity == 0 {
            errors.push("ingress_capacity must be > 0".to_string());
        }
        if self.egress_capacity == 0 {
            errors.push("egress_capacity must be > 0".to_string());
        }
        if self.offer_timeout_ms == 0 {
            errors.push("offer_timeout_ms must be > 0".to_string());
        }
        if self.poll_interval_ms == 0 {
            errors.push("poll_interval_ms must be > 0".to_string());
        }

        if self.egress_capacity < self.ingress_capacity {
            tracing::warn!(
                ingress = self.ingress_capacity,
                egress = self.egress_capacity,
                "egress_capacity is smaller than ingress_capacity, coalesced datagrams may stall the parser"
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.offer_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = PipelineConfig {
            ingress_capacity: 0,
            egress_capacity: 0,
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: PipelineConfig = toml::from_str("ingress_capacity = 8").unwrap();
        assert_eq!(config.ingress_capacity, 8);
        assert_eq!(config.egress_capacity, 4096);
    }
}

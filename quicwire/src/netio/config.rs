use serde::{Deserialize, Serialize};

use quicwire_core::types::MIN_INITIAL_PACKET_SIZE;

/// Sensible defaults for QUIC datagram payloads.
pub const DEFAULT_DATAGRAM_SIZE: usize = 1350;

/// Largest UDP payload QUIC permits (RFC 9000 Section 18.2).
pub const MAX_DATAGRAM_SIZE: usize = 65527;

/// Default number of buffers kept on the free list.
pub const DEFAULT_MAX_BUFFERS: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BufferPoolConfig {
    /// Maximum number of idle buffers retained by the pool.
    /// Buffers released beyond this are freed.
    pub max_buffers: usize,

    /// Size in bytes of every buffer handed out.
    /// Datagrams larger than this are dropped on receipt.
    pub datagram_size: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            max_buffers: DEFAULT_MAX_BUFFERS,
            datagram_size: DEFAULT_DATAGRAM_SIZE,
        }
    }
}

impl BufferPoolConfig {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.max_buffers == 0 {
            errors.push("max_buffers must be > 0".to_string());
        }

        // a client Initial must always fit
        if self.datagram_size < MIN_INITIAL_PACKET_SIZE {
            errors.push(format!(
                "datagram_size ({}) must be at least {} bytes",
                self.datagram_size, MIN_INITIAL_PACKET_SIZE
            ));
        }

        if self.datagram_size > MAX_DATAGRAM_SIZE {
            errors.push(format!(
                "datagram_size ({}) exceeds the UDP payload limit ({})",
                self.datagram_size, MAX_DATAGRAM_SIZE
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

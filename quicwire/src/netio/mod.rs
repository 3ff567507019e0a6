//! Network I/O utilities module.
//!
//! This module provides what sits between a socket and the parser:
//! - Buffer pool for received datagrams
//! - Datagram sources and the `Datagram` envelope
//! - Buffer pool configuration
//!
//! For worker thread orchestration, see the `worker` module.

pub mod buffer;
pub mod config;
pub mod source;


pub use buffer::DatagramBufferPool;
pub use config::BufferPoolConfig;
pub use source::{parse_hex_datagrams, Datagram, DatagramSource, IterSource};

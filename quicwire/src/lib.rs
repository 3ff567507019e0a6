//! quicwire runtime crate.
//!
//! Hosts the `quicwire-core` decoder on a two-stage receive pipeline:
//!
//! - `config`: layered TOML / environment / CLI configuration
//! - `channel_config`: queue sizing between the workers
//! - `netio`: datagram buffers and datagram sources
//! - `telemetry`: tracing subscriber setup
//! - `worker`: receive and parsing workers, [`worker::Pipeline`]
//!
//! The `quicwire` binary feeds hex-encoded datagrams through the pipeline.

pub mod channel_config;
pub mod config;
pub mod netio;
pub mod telemetry;
pub mod worker;

pub use config::AppConfig;
pub use worker::{ParsedPacket, Pipeline, PipelineReport};

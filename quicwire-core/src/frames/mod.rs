//! # QUIC Frame Parsing and Types (RFC 9000 Section 12.4, 19)
//!
//! The frame catalogue, the payload decoder and the serializer.

pub mod encode;
pub mod parse;
pub mod types;

pub use parse::{decode_frame, decode_frames, FrameIterator};
pub use types::*;

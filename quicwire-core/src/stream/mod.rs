//! # Streams (RFC 9000 Section 2)
//!
//! Stream id bookkeeping. Stream data itself stays in the STREAM frames
//! handed to the application.

pub mod id_context;

pub use id_context::StreamIdContext;

pub use crate::types::{StreamId, StreamType};

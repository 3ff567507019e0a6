//! quicwire-core: QUIC Wire Engine
//!
//! Turns raw UDP datagram bytes into typed, validated packets and frames,
//! and back, as specified in RFC 9000, RFC 9001 and RFC 8999 (plus the
//! draft-29 to draft-32 wire versions).
//!
//! # Architecture
//!
//! - **Pure decoding**: parsing reads a [`packet::ParseContext`] and never
//!   mutates it; the caller records accepted packets afterwards
//! - **Zero-copy payloads**: frame data are `bytes::Bytes` slices of the
//!   received datagram
//! - **Sum types**: one enum variant per packet kind and per frame family
//! - **Crypto seam**: header protection plugs in through
//!   [`crypto::HeaderProtector`]; payload AEAD stays outside this crate
//!
//! # Module Organization
//!
//! - `varint`: variable-length integer codec (RFC 9000 Section 16)
//! - `reader`: bounded datagram cursor with absolute offsets
//! - `version`: supported versions and Initial salts
//! - `crypto`: Initial key schedule and header-protection masks
//! - `packet`: datagram decoder, packet types, builder, packet numbers
//! - `frames`: frame catalogue, decoder and encoder
//! - `stream`: stream id allocation and gap filling
//! - `flow_control`: credit counters
//! - `connection`: frame effects on per-connection state

pub mod connection;
pub mod crypto;
pub mod error;
pub mod flow_control;
pub mod frames;
pub mod packet;
pub mod reader;
pub mod stream;
pub mod types;
pub mod varint;
pub mod version;

// Re-export key types
pub use connection::{ConnectionLimits, ConnectionState, SharedConnection};
pub use crypto::{EncryptionLevel, HeaderProtector, InitialKeySchedule, InitialKeys};
pub use error::{Error, ParseError, Result, TransportError};
pub use flow_control::FlowCredit;
pub use frames::Frame;
pub use packet::{
    decode_datagram, ContextUpdate, DatagramOutcome, EndpointContext, Packet, PacketBuilder,
    PacketType, ParseContext,
};
pub use reader::Reader;
pub use stream::StreamIdContext;
pub use types::{ConnectionId, PacketNumberSpace, Side, StreamId};
pub use varint::{VarInt, VarIntCodec};
pub use version::Version;

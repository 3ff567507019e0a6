//! # QUIC Packet Layer (RFC 9000 Section 12, 17)
//!
//! Datagram demultiplexing, header protection removal, packet number
//! reconstruction and packet assembly.

pub mod builder;
pub mod context;
pub mod decoder;
pub mod header;
pub mod number;
pub mod protection;
pub mod space;
pub mod types;

pub use builder::PacketBuilder;
pub use context::{ContextUpdate, EndpointContext, KeyLookup, ParseContext};
pub use decoder::{decode_datagram, decode_packet, DatagramOutcome};
pub use header::PacketType;
pub use number::{decode_packet_number, encode_length, truncate};
pub use space::PacketNumberSpaces;
pub use types::{
    LongHeader, LongPacket, Packet, RetryPacket, ShortPacket, VersionNegotiationPacket,
};

//! # Core QUIC Types (RFC 8999, RFC 9000)
//!
//! Connection IDs, packet number spaces, stream identifiers and the endpoint
//! role. Variable-length integers live in [`crate::varint`].

#![forbid(unsafe_code)]

use bytes::Bytes;
use core::hash::{Hash, Hasher};

use crate::varint::VARINT_MAX;

// ============================================================================
// Connection ID (RFC 9000 Section 5.1, RFC 8999 Section 5.3)
// ============================================================================

/// Maximum length of a Connection ID (20 bytes per RFC 9000)
pub const MAX_CID_LENGTH: usize = 20;

/// Connection ID - Version-independent identifier (RFC 8999 Section 5.3)
///
/// An opaque byte sequence plus the sequence number it was issued under
/// (0 for handshake CIDs, the NEW_CONNECTION_ID sequence otherwise).
/// Equality and hashing look at the bytes only.
#[derive(Clone)]
pub struct ConnectionId {
    bytes: Bytes,
    sequence: u64,
}

impl ConnectionId {
    /// Returns None if length exceeds MAX_CID_LENGTH
    pub fn new(bytes: Bytes) -> Option<Self> {
        Self::with_sequence(bytes, 0)
    }

    pub fn with_sequence(bytes: Bytes, sequence: u64) -> Option<Self> {
        if bytes.len() > MAX_CID_LENGTH || sequence > VARINT_MAX {
            return None;
        }
        Some(Self { bytes, sequence })
    }

    /// Create from a borrowed slice (copies data)
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        Self::new(Bytes::copy_from_slice(slice))
    }

    /// Create an empty (zero-length) connection ID
    pub fn empty() -> Self {
        Self {
            bytes: Bytes::new(),
            sequence: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl PartialEq for ConnectionId {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for ConnectionId {}

impl Hash for ConnectionId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl core::fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ConnectionId({})", self)
    }
}

impl core::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for byte in &self.bytes[..] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

// ============================================================================
// Packet Number (RFC 9000 Section 12.3)
// ============================================================================

/// Packet Number - Monotonically increasing per packet number space
pub type PacketNumber = u64;

/// Maximum packet number value (2^62 - 1)
pub const MAX_PACKET_NUMBER: u64 = VARINT_MAX;

/// Packet Number Space (RFC 9000 Section 12.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PacketNumberSpace {
    /// Initial packets
    Initial = 0,
    /// Handshake packets
    Handshake = 1,
    /// 0-RTT and 1-RTT packets
    ApplicationData = 2,
}

impl PacketNumberSpace {
    pub const ALL: [PacketNumberSpace; 3] = [
        PacketNumberSpace::Initial,
        PacketNumberSpace::Handshake,
        PacketNumberSpace::ApplicationData,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

// ============================================================================
// Side (Client vs Server)
// ============================================================================

/// Connection endpoint side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Client,
    Server,
}

impl Side {
    pub fn is_client(self) -> bool {
        matches!(self, Side::Client)
    }

    pub fn is_server(self) -> bool {
        matches!(self, Side::Server)
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Client => Side::Server,
            Side::Server => Side::Client,
        }
    }

    /// Value of the initiator bit (bit 0) in stream ids opened by this side.
    pub fn initiator_bit(self) -> u64 {
        match self {
            Side::Client => 0x00,
            Side::Server => 0x01,
        }
    }
}

// ============================================================================
// Stream ID (RFC 9000 Section 2.1)
// ============================================================================

/// Maximum Stream ID value (2^62 - 1)
pub const MAX_STREAM_ID: u64 = VARINT_MAX;

/// Stream ID - Identifies a bidirectional or unidirectional stream
///
/// The two least significant bits encode stream type and initiator:
/// - Bit 0: Initiator (0=client, 1=server)
/// - Bit 1: Direction (0=bidirectional, 1=unidirectional)
///
/// The remaining bits count streams within that class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u64);

impl StreamId {
    /// Returns None above 2^62 - 1.
    pub fn new(id: u64) -> Option<Self> {
        if id > MAX_STREAM_ID {
            return None;
        }
        Some(Self(id))
    }

    /// Compose an id from its class and per-class counter.
    pub fn from_parts(initiator: Side, unidirectional: bool, index: u64) -> Option<Self> {
        let class = initiator.initiator_bit() | if unidirectional { 0x02 } else { 0x00 };
        let raw = index.checked_mul(4)?.checked_add(class)?;
        Self::new(raw)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    pub fn initiator(self) -> Side {
        if self.0 & 0x01 == 0 {
            Side::Client
        } else {
            Side::Server
        }
    }

    pub fn is_bidirectional(self) -> bool {
        self.0 & 0x02 == 0
    }

    pub fn is_unidirectional(self) -> bool {
        !self.is_bidirectional()
    }

    pub fn stream_type(self) -> StreamType {
        StreamType::from_stream_id(self)
    }

    /// Position of this id within its class's counting sequence.
    pub fn index(self) -> u64 {
        self.0 >> 2
    }
}

impl core::fmt::Display for StreamId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

/// Stream Type - the (initiator, directionality) class of a stream id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    ClientBidirectional = 0x00,
    ServerBidirectional = 0x01,
    ClientUnidirectional = 0x02,
    ServerUnidirectional = 0x03,
}

impl StreamType {
    pub fn from_stream_id(id: StreamId) -> Self {
        match id.0 & 0x03 {
            0x00 => StreamType::ClientBidirectional,
            0x01 => StreamType::ServerBidirectional,
            0x02 => StreamType::ClientUnidirectional,
            _ => StreamType::ServerUnidirectional,
        }
    }

    /// Index 0..4 used for per-class tables.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_bidirectional(self) -> bool {
        matches!(
            self,
            StreamType::ClientBidirectional | StreamType::ServerBidirectional
        )
    }

    pub fn is_client_initiated(self) -> bool {
        matches!(
            self,
            StreamType::ClientBidirectional | StreamType::ClientUnidirectional
        )
    }
}

/// Stateless reset token carried by NEW_CONNECTION_ID (RFC 9000 Section 10.3)
pub type StatelessResetToken = [u8; 16];

// ============================================================================
// Constants from RFC 9000
// ============================================================================

/// Minimum Initial packet size (1200 bytes per RFC 9000 Section 14.1)
pub const MIN_INITIAL_PACKET_SIZE: usize = 1200;

/// Maximum UDP payload size for IPv6 (65535 bytes)
pub const MAX_UDP_PAYLOAD_SIZE: usize = 65535;

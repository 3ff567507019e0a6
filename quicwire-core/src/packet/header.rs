//! # QUIC Packet Header Layout (RFC 9000 Section 17, RFC 8999)
//!
//! ```text
//! Long Header:   1|1|T T|R R|P P  Version(32)  DCID Len(8) DCID  SCID Len(8) SCID ...
//! Short Header:  0|1|S|R R|K|P P  DCID  Packet Number(8..32)  Payload
//! ```
//!
//! Bits marked R, K and P are covered by header protection.

#![forbid(unsafe_code)]

use crate::crypto::EncryptionLevel;
use crate::types::PacketNumberSpace;

// ============================================================================
// Header Form Constants (RFC 8999 Section 5.1, RFC 9000 Section 17)
// ============================================================================

/// Header Form Bit (most significant bit)
/// 1 = Long Header, 0 = Short Header
pub const HEADER_FORM_BIT: u8 = 0x80;

/// Fixed Bit (second most significant bit)
/// MUST be set to 1 in all QUIC packets
pub const FIXED_BIT: u8 = 0x40;

/// Long Packet Type Mask (bits 4-5)
pub const LONG_PACKET_TYPE_MASK: u8 = 0x30;

/// Long Packet Type Values
pub const LONG_PACKET_TYPE_INITIAL: u8 = 0x00;
pub const LONG_PACKET_TYPE_0RTT: u8 = 0x10;
pub const LONG_PACKET_TYPE_HANDSHAKE: u8 = 0x20;
pub const LONG_PACKET_TYPE_RETRY: u8 = 0x30;

/// Reserved bits, protected, must be zero once unmasked
pub const LONG_RESERVED_BITS: u8 = 0x0c;
pub const SHORT_RESERVED_BITS: u8 = 0x18;

/// Spin Bit (Short Header, bit 5)
pub const SPIN_BIT: u8 = 0x20;

/// Key Phase Bit (Short Header, bit 2)
pub const KEY_PHASE_BIT: u8 = 0x04;

/// Packet Number Length Mask (bottom 2 bits)
/// Encodes (packet_number_length - 1)
pub const PACKET_NUMBER_LENGTH_MASK: u8 = 0x03;

/// First-byte bits covered by header protection
pub const LONG_PROTECTED_BITS: u8 = 0x0f;
pub const SHORT_PROTECTED_BITS: u8 = 0x1f;

/// Retry Integrity Tag length (RFC 9001 Section 5.8)
pub const RETRY_INTEGRITY_TAG_LEN: usize = 16;

// ============================================================================
// Packet Type Enumeration
// ============================================================================

/// Packet Type (RFC 9000 Section 17)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// Initial packet (Long Header, type 0x0)
    Initial,
    /// 0-RTT packet (Long Header, type 0x1)
    ZeroRtt,
    /// Handshake packet (Long Header, type 0x2)
    Handshake,
    /// Retry packet (Long Header, type 0x3)
    Retry,
    /// 1-RTT packet (Short Header)
    OneRtt,
    /// Version Negotiation packet (Long Header, version 0)
    VersionNegotiation,
}

impl PacketType {
    /// Decode the two long-packet-type bits of a first byte.
    pub fn from_long_first_byte(first: u8) -> Self {
        match first & LONG_PACKET_TYPE_MASK {
            LONG_PACKET_TYPE_INITIAL => PacketType::Initial,
            LONG_PACKET_TYPE_0RTT => PacketType::ZeroRtt,
            LONG_PACKET_TYPE_HANDSHAKE => PacketType::Handshake,
            _ => PacketType::Retry,
        }
    }

    /// The type bits for a long header, `None` for the others.
    pub fn long_type_bits(self) -> Option<u8> {
        match self {
            PacketType::Initial => Some(LONG_PACKET_TYPE_INITIAL),
            PacketType::ZeroRtt => Some(LONG_PACKET_TYPE_0RTT),
            PacketType::Handshake => Some(LONG_PACKET_TYPE_HANDSHAKE),
            PacketType::Retry => Some(LONG_PACKET_TYPE_RETRY),
            PacketType::OneRtt | PacketType::VersionNegotiation => None,
        }
    }

    pub fn is_long_header(self) -> bool {
        !matches!(self, PacketType::OneRtt)
    }

    /// Types that carry a packet number and a frame payload.
    pub fn has_payload(self) -> bool {
        !matches!(self, PacketType::Retry | PacketType::VersionNegotiation)
    }

    pub fn encryption_level(self) -> Option<EncryptionLevel> {
        match self {
            PacketType::Initial => Some(EncryptionLevel::Initial),
            PacketType::ZeroRtt => Some(EncryptionLevel::ZeroRtt),
            PacketType::Handshake => Some(EncryptionLevel::Handshake),
            PacketType::OneRtt => Some(EncryptionLevel::OneRtt),
            PacketType::Retry | PacketType::VersionNegotiation => None,
        }
    }

    pub fn packet_number_space(self) -> Option<PacketNumberSpace> {
        self.encryption_level().map(EncryptionLevel::packet_number_space)
    }
}

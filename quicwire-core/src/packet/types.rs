//! # Packet Type Definitions (RFC 9000 Section 17)
//!
//! One variant per packet kind. Every payload-carrying packet already holds
//! its decoded frames; the header fields kept here are the ones needed to
//! re-derive the exact number of bytes the packet occupied.

#![forbid(unsafe_code)]

use bytes::Bytes;

use super::header::PacketType;
use crate::frames::Frame;
use crate::types::{ConnectionId, PacketNumber, PacketNumberSpace, MAX_PACKET_NUMBER};
use crate::varint::VarIntCodec;
use crate::version::Version;

/// first byte + version + DCID length byte + SCID length byte
const LONG_HEADER_FIXED_LEN: usize = 1 + 4 + 1 + 1;

/// Fields common to every long-header packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongHeader {
    pub version: Version,
    pub dcid: ConnectionId,
    pub scid: ConnectionId,
}

impl LongHeader {
    fn encoded_len(&self) -> usize {
        LONG_HEADER_FIXED_LEN + self.dcid.len() + self.scid.len()
    }
}

/// Initial, 0-RTT or Handshake packet (RFC 9000 Section 17.2.2-17.2.4)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongPacket {
    pub header: LongHeader,
    /// Address validation token; present only on Initial packets.
    pub token: Option<Bytes>,
    pub packet_number: PacketNumber,
    /// Encoded packet number length, 1 to 4.
    pub packet_number_len: usize,
    /// Declared Length field: packet number plus payload.
    pub length: u64,
    /// Bytes the Length field itself occupied on the wire.
    pub length_len: usize,
    pub frames: Vec<Frame>,
    /// Bytes each frame occupied, parallel to `frames`.
    pub frame_wire_lengths: Vec<usize>,
}

impl LongPacket {
    pub fn payload_len(&self) -> u64 {
        self.length.saturating_sub(self.packet_number_len as u64)
    }

    fn packet_length(&self) -> usize {
        let token = self
            .token
            .as_ref()
            .map(|t| VarIntCodec::size(t.len() as u64) + t.len())
            .unwrap_or(0);
        self.header.encoded_len() + token + self.length_len + self.length as usize
    }
}

/// Retry packet (RFC 9000 Section 17.2.5)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPacket {
    pub header: LongHeader,
    pub token: Bytes,
    pub integrity_tag: [u8; 16],
}

/// Version Negotiation packet (RFC 9000 Section 17.2.1)
///
/// The version list may contain values this endpoint does not know, so
/// it is kept as raw `u32`s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionNegotiationPacket {
    pub dcid: ConnectionId,
    pub scid: ConnectionId,
    pub versions: Vec<u32>,
}

/// 1-RTT packet (RFC 9000 Section 17.3.1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortPacket {
    pub dcid: ConnectionId,
    pub spin: bool,
    pub key_phase: bool,
    pub packet_number: PacketNumber,
    pub packet_number_len: usize,
    pub payload_len: usize,
    pub frames: Vec<Frame>,
    pub frame_wire_lengths: Vec<usize>,
}

/// A decoded QUIC packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Initial(LongPacket),
    ZeroRtt(LongPacket),
    Handshake(LongPacket),
    Retry(RetryPacket),
    VersionNegotiation(VersionNegotiationPacket),
    Short(ShortPacket),
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Initial(_) => PacketType::Initial,
            Packet::ZeroRtt(_) => PacketType::ZeroRtt,
            Packet::Handshake(_) => PacketType::Handshake,
            Packet::Retry(_) => PacketType::Retry,
            Packet::VersionNegotiation(_) => PacketType::VersionNegotiation,
            Packet::Short(_) => PacketType::OneRtt,
        }
    }

    fn long(&self) -> Option<&LongPacket> {
        match self {
            Packet::Initial(p) | Packet::ZeroRtt(p) | Packet::Handshake(p) => Some(p),
            _ => None,
        }
    }

    pub fn dcid(&self) -> &ConnectionId {
        match self {
            Packet::Initial(p) | Packet::ZeroRtt(p) | Packet::Handshake(p) => &p.header.dcid,
            Packet::Retry(p) => &p.header.dcid,
            Packet::VersionNegotiation(p) => &p.dcid,
            Packet::Short(p) => &p.dcid,
        }
    }

    /// Source connection id; short headers carry none.
    pub fn scid(&self) -> Option<&ConnectionId> {
        match self {
            Packet::Initial(p) | Packet::ZeroRtt(p) | Packet::Handshake(p) => Some(&p.header.scid),
            Packet::Retry(p) => Some(&p.header.scid),
            Packet::VersionNegotiation(p) => Some(&p.scid),
            Packet::Short(_) => None,
        }
    }

    /// Version of a long-header packet other than Version Negotiation.
    pub fn version(&self) -> Option<Version> {
        match self {
            Packet::Initial(p) | Packet::ZeroRtt(p) | Packet::Handshake(p) => {
                Some(p.header.version)
            }
            Packet::Retry(p) => Some(p.header.version),
            Packet::VersionNegotiation(_) | Packet::Short(_) => None,
        }
    }

    pub fn packet_number(&self) -> Option<PacketNumber> {
        match self {
            Packet::Short(p) => Some(p.packet_number),
            other => other.long().map(|p| p.packet_number),
        }
    }

    pub fn packet_number_len(&self) -> Option<usize> {
        match self {
            Packet::Short(p) => Some(p.packet_number_len),
            other => other.long().map(|p| p.packet_number_len),
        }
    }

    pub fn frames(&self) -> &[Frame] {
        match self {
            Packet::Initial(p) | Packet::ZeroRtt(p) | Packet::Handshake(p) => &p.frames,
            Packet::Short(p) => &p.frames,
            Packet::Retry(_) | Packet::VersionNegotiation(_) => &[],
        }
    }

    /// Bytes each frame occupied on the wire, parallel to [`Packet::frames`].
    ///
    /// Differs from [`Frame::frame_length`] when a field used a non-minimal
    /// VarInt.
    pub fn frame_wire_lengths(&self) -> &[usize] {
        match self {
            Packet::Initial(p) | Packet::ZeroRtt(p) | Packet::Handshake(p) => &p.frame_wire_lengths,
            Packet::Short(p) => &p.frame_wire_lengths,
            Packet::Retry(_) | Packet::VersionNegotiation(_) => &[],
        }
    }

    pub fn space(&self) -> Option<PacketNumberSpace> {
        self.packet_type().packet_number_space()
    }

    /// Bytes this packet occupied in its datagram.
    pub fn packet_length(&self) -> usize {
        match self {
            Packet::Initial(p) | Packet::ZeroRtt(p) | Packet::Handshake(p) => p.packet_length(),
            Packet::Retry(p) => p.header.encoded_len() + p.token.len() + p.integrity_tag.len(),
            Packet::VersionNegotiation(p) => {
                LONG_HEADER_FIXED_LEN + p.dcid.len() + p.scid.len() + 4 * p.versions.len()
            }
            Packet::Short(p) => 1 + p.dcid.len() + p.packet_number_len + p.payload_len,
        }
    }

    /// Field-level checks that need no knowledge of the frames.
    pub fn is_valid(&self) -> bool {
        match self {
            Packet::Initial(p) | Packet::ZeroRtt(p) | Packet::Handshake(p) => {
                (1..=4).contains(&p.packet_number_len)
                    && p.packet_number <= MAX_PACKET_NUMBER
                    && p.length >= p.packet_number_len as u64
                    && p.token.is_some() == matches!(self, Packet::Initial(_))
            }
            Packet::Retry(p) => !p.token.is_empty(),
            Packet::VersionNegotiation(p) => !p.versions.is_empty(),
            Packet::Short(p) => {
                (1..=4).contains(&p.packet_number_len) && p.packet_number <= MAX_PACKET_NUMBER
            }
        }
    }

    /// [`Packet::is_valid`] plus every frame valid and permitted here, and
    /// the declared length equal to the bytes the frames occupied.
    pub fn is_deep_valid(&self) -> bool {
        if !self.is_valid() {
            return false;
        }
        let ty = self.packet_type();
        let frames_ok = self
            .frames()
            .iter()
            .all(|f| f.is_valid() && f.permitted_in(ty));
        let wire = self.frame_wire_lengths();
        // a non-minimal encoding only ever grows a frame
        let wire_ok = wire.len() == self.frames().len()
            && self
                .frames()
                .iter()
                .zip(wire)
                .all(|(f, &len)| len >= f.frame_length());
        let frame_bytes: usize = wire.iter().sum();
        let length_ok = match self {
            Packet::Initial(p) | Packet::ZeroRtt(p) | Packet::Handshake(p) => {
                p.payload_len() == frame_bytes as u64
            }
            Packet::Short(p) => p.payload_len == frame_bytes,
            Packet::Retry(_) | Packet::VersionNegotiation(_) => true,
        };
        frames_ok && wire_ok && length_ok
    }

    pub fn is_ack_eliciting(&self) -> bool {
        self.frames().iter().any(Frame::is_ack_eliciting)
    }
}

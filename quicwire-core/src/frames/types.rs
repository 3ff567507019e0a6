//! # QUIC Frame Types (RFC 9000 Section 19)
//!
//! QUIC packets contain one or more frames carrying control or application data.
//! Every frame owns its fields; variable-length payloads are `Bytes` slices
//! of the received datagram, so no payload byte is copied while decoding.
//!
//! ## Frame Classification:
//! - **ACK-eliciting**: everything except PADDING, ACK and CONNECTION_CLOSE
//! - **Handshake-safe**: PADDING, PING, ACK, CRYPTO and transport CONNECTION_CLOSE
//!   (the only frames allowed in Initial and Handshake packets)

#![forbid(unsafe_code)]

use bytes::Bytes;
use core::ops::RangeInclusive;

use crate::packet::PacketType;
use crate::types::{ConnectionId, PacketNumber, StatelessResetToken, StreamId};
use crate::varint::{VarIntCodec, VARINT_MAX};

/// Frame Type Constants (RFC 9000 Section 19)
pub const FRAME_TYPE_PADDING: u64 = 0x00;
pub const FRAME_TYPE_PING: u64 = 0x01;
pub const FRAME_TYPE_ACK: u64 = 0x02;
pub const FRAME_TYPE_ACK_ECN: u64 = 0x03;
pub const FRAME_TYPE_RESET_STREAM: u64 = 0x04;
pub const FRAME_TYPE_STOP_SENDING: u64 = 0x05;
pub const FRAME_TYPE_CRYPTO: u64 = 0x06;
pub const FRAME_TYPE_NEW_TOKEN: u64 = 0x07;
pub const FRAME_TYPE_STREAM_BASE: u64 = 0x08; // 0x08-0x0f
pub const FRAME_TYPE_MAX_DATA: u64 = 0x10;
pub const FRAME_TYPE_MAX_STREAM_DATA: u64 = 0x11;
pub const FRAME_TYPE_MAX_STREAMS_BIDI: u64 = 0x12;
pub const FRAME_TYPE_MAX_STREAMS_UNI: u64 = 0x13;
pub const FRAME_TYPE_DATA_BLOCKED: u64 = 0x14;
pub const FRAME_TYPE_STREAM_DATA_BLOCKED: u64 = 0x15;
pub const FRAME_TYPE_STREAMS_BLOCKED_BIDI: u64 = 0x16;
pub const FRAME_TYPE_STREAMS_BLOCKED_UNI: u64 = 0x17;
pub const FRAME_TYPE_NEW_CONNECTION_ID: u64 = 0x18;
pub const FRAME_TYPE_RETIRE_CONNECTION_ID: u64 = 0x19;
pub const FRAME_TYPE_PATH_CHALLENGE: u64 = 0x1a;
pub const FRAME_TYPE_PATH_RESPONSE: u64 = 0x1b;
pub const FRAME_TYPE_CONNECTION_CLOSE_QUIC: u64 = 0x1c;
pub const FRAME_TYPE_CONNECTION_CLOSE_APP: u64 = 0x1d;
pub const FRAME_TYPE_HANDSHAKE_DONE: u64 = 0x1e;

/// STREAM Frame Flag Bits (RFC 9000 Section 19.8)
///
/// - Bit 0 (FIN): Last frame in stream
/// - Bit 1 (LEN): Length field present
/// - Bit 2 (OFF): Offset field present
pub const STREAM_FRAME_BIT_FIN: u64 = 0x01;
pub const STREAM_FRAME_BIT_LEN: u64 = 0x02;
pub const STREAM_FRAME_BIT_OFF: u64 = 0x04;

/// MAX_STREAMS / STREAMS_BLOCKED counts above 2^60 are invalid (RFC 9000 Section 19.11)
pub const MAX_STREAMS_LIMIT: u64 = 1 << 60;

fn vlen(value: u64) -> usize {
    VarIntCodec::size(value)
}

/// PADDING run (RFC 9000 Section 19.1)
///
/// Consecutive 0x00 bytes decode into one value; `count` is the number of
/// bytes in the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaddingFrame {
    pub count: usize,
}

/// ACK Frame (RFC 9000 Section 19.3)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckFrame {
    /// Largest packet number being acknowledged
    pub largest_acknowledged: PacketNumber,

    /// Encoded ack delay (scaled by the peer's ack_delay_exponent)
    pub ack_delay: u64,

    /// Packets acknowledged below largest_acknowledged
    pub first_ack_range: u64,

    /// Additional (Gap, ACK Range Length) pairs in wire order
    pub ranges: tinyvec::TinyVec<[AckRange; 8]>,

    /// ECN counts (only present in ACK_ECN frames)
    pub ecn_counts: Option<EcnCounts>,
}

/// ACK Range (RFC 9000 Section 19.3.1)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AckRange {
    /// Unacknowledged packets before this range, minus one
    pub gap: u64,

    /// Acknowledged packets in this range, minus one
    pub length: u64,
}

/// ECN Counts (RFC 9000 Section 19.3.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcnCounts {
    pub ect0_count: u64,
    pub ect1_count: u64,
    pub ce_count: u64,
}

impl AckFrame {
    /// Acknowledged packet numbers as inclusive ranges, highest first.
    ///
    /// Stops at the first range that would go below zero, so the iterator
    /// is total even for invalid frames.
    pub fn acked_ranges(&self) -> AckRangeIter<'_> {
        AckRangeIter {
            frame: self,
            next_index: 0,
            current: self
                .largest_acknowledged
                .checked_sub(self.first_ack_range)
                .map(|smallest| smallest..=self.largest_acknowledged),
        }
    }

    fn is_valid(&self) -> bool {
        self.largest_acknowledged <= VARINT_MAX
            && self.acked_ranges().count() == self.ranges.len() + 1
    }
}

pub struct AckRangeIter<'a> {
    frame: &'a AckFrame,
    next_index: usize,
    current: Option<RangeInclusive<PacketNumber>>,
}

impl Iterator for AckRangeIter<'_> {
    type Item = RangeInclusive<PacketNumber>;

    fn next(&mut self) -> Option<Self::Item> {
        let out = self.current.take()?;
        if let Some(range) = self.frame.ranges.get(self.next_index) {
            self.next_index += 1;
            // largest = previous_smallest - gap - 2
            self.current = out
                .start()
                .checked_sub(range.gap)
                .and_then(|v| v.checked_sub(2))
                .and_then(|largest| largest.checked_sub(range.length).map(|s| s..=largest));
        }
        Some(out)
    }
}

/// RESET_STREAM Frame (RFC 9000 Section 19.4)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetStreamFrame {
    pub stream_id: StreamId,
    pub error_code: u64,
    pub final_size: u64,
}

/// STOP_SENDING Frame (RFC 9000 Section 19.5)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopSendingFrame {
    pub stream_id: StreamId,
    pub error_code: u64,
}

/// CRYPTO Frame (RFC 9000 Section 19.6)
///
/// Carries cryptographic handshake messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoFrame {
    /// Byte offset in the crypto stream
    pub offset: u64,

    /// Handshake bytes; the Length field is `data.len()`
    pub data: Bytes,
}

/// NEW_TOKEN Frame (RFC 9000 Section 19.7)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTokenFrame {
    pub token: Bytes,
}

/// STREAM Frame (RFC 9000 Section 19.8)
///
/// `has_offset` and `has_length` mirror the OFF and LEN bits so that the
/// frame knows its own wire length; an explicit zero offset is legal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    pub stream_id: StreamId,

    /// Byte offset in stream (0 if OFF bit not set)
    pub offset: u64,

    pub data: Bytes,

    /// FIN bit: indicates final frame in stream
    pub fin: bool,

    pub has_offset: bool,

    /// Without LEN the data runs to the end of the packet
    pub has_length: bool,
}

impl StreamFrame {
    pub fn frame_type(&self) -> u64 {
        let mut ty = FRAME_TYPE_STREAM_BASE;
        if self.fin {
            ty |= STREAM_FRAME_BIT_FIN;
        }
        if self.has_length {
            ty |= STREAM_FRAME_BIT_LEN;
        }
        if self.has_offset {
            ty |= STREAM_FRAME_BIT_OFF;
        }
        ty
    }

    /// Offset one past the last byte carried.
    pub fn end_offset(&self) -> u64 {
        self.offset.saturating_add(self.data.len() as u64)
    }
}

/// MAX_STREAM_DATA Frame (RFC 9000 Section 19.10)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxStreamDataFrame {
    pub stream_id: StreamId,
    pub maximum_stream_data: u64,
}

/// MAX_STREAMS Frame (RFC 9000 Section 19.11)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxStreamsFrame {
    pub maximum_streams: u64,
    pub bidirectional: bool,
}

/// STREAM_DATA_BLOCKED Frame (RFC 9000 Section 19.13)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDataBlockedFrame {
    pub stream_id: StreamId,
    pub stream_data_limit: u64,
}

/// STREAMS_BLOCKED Frame (RFC 9000 Section 19.14)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamsBlockedFrame {
    pub stream_limit: u64,
    pub bidirectional: bool,
}

/// NEW_CONNECTION_ID Frame (RFC 9000 Section 19.15)
///
/// The sequence number is carried on `connection_id` itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConnectionIdFrame {
    pub retire_prior_to: u64,
    pub connection_id: ConnectionId,
    pub stateless_reset_token: StatelessResetToken,
}

impl NewConnectionIdFrame {
    pub fn sequence_number(&self) -> u64 {
        self.connection_id.sequence()
    }
}

/// CONNECTION_CLOSE Frame (RFC 9000 Section 19.19)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionCloseFrame {
    pub error_code: u64,

    /// Frame type that triggered close (only for QUIC-level close)
    pub frame_type: Option<u64>,

    /// Human-readable reason (UTF-8 by convention, not enforced)
    pub reason: Bytes,

    /// True if application-level close (0x1d), false if QUIC-level (0x1c)
    pub application_close: bool,
}

/// Unified Frame Type (RFC 9000 Section 19)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// PADDING run (0x00)
    Padding(PaddingFrame),

    /// PING frame (0x01)
    Ping,

    /// ACK frame (0x02 or 0x03)
    Ack(AckFrame),

    /// RESET_STREAM frame (0x04)
    ResetStream(ResetStreamFrame),

    /// STOP_SENDING frame (0x05)
    StopSending(StopSendingFrame),

    /// CRYPTO frame (0x06)
    Crypto(CryptoFrame),

    /// NEW_TOKEN frame (0x07)
    NewToken(NewTokenFrame),

    /// STREAM frame (0x08-0x0f)
    Stream(StreamFrame),

    /// MAX_DATA frame (0x10)
    MaxData(u64),

    /// MAX_STREAM_DATA frame (0x11)
    MaxStreamData(MaxStreamDataFrame),

    /// MAX_STREAMS frame (0x12 or 0x13)
    MaxStreams(MaxStreamsFrame),

    /// DATA_BLOCKED frame (0x14)
    DataBlocked(u64),

    /// STREAM_DATA_BLOCKED frame (0x15)
    StreamDataBlocked(StreamDataBlockedFrame),

    /// STREAMS_BLOCKED frame (0x16 or 0x17)
    StreamsBlocked(StreamsBlockedFrame),

    /// NEW_CONNECTION_ID frame (0x18)
    NewConnectionId(NewConnectionIdFrame),

    /// RETIRE_CONNECTION_ID frame (0x19)
    RetireConnectionId(u64),

    /// PATH_CHALLENGE frame (0x1a)
    PathChallenge([u8; 8]),

    /// PATH_RESPONSE frame (0x1b)
    PathResponse([u8; 8]),

    /// CONNECTION_CLOSE frame (0x1c or 0x1d)
    ConnectionClose(ConnectionCloseFrame),

    /// HANDSHAKE_DONE frame (0x1e)
    HandshakeDone,
}

impl Frame {
    /// Wire type value; the lowest in a family for PADDING runs.
    pub fn frame_type(&self) -> u64 {
        match self {
            Frame::Padding(_) => FRAME_TYPE_PADDING,
            Frame::Ping => FRAME_TYPE_PING,
            Frame::Ack(ack) => {
                if ack.ecn_counts.is_some() {
                    FRAME_TYPE_ACK_ECN
                } else {
                    FRAME_TYPE_ACK
                }
            }
            Frame::ResetStream(_) => FRAME_TYPE_RESET_STREAM,
            Frame::StopSending(_) => FRAME_TYPE_STOP_SENDING,
            Frame::Crypto(_) => FRAME_TYPE_CRYPTO,
            Frame::NewToken(_) => FRAME_TYPE_NEW_TOKEN,
            Frame::Stream(s) => s.frame_type(),
            Frame::MaxData(_) => FRAME_TYPE_MAX_DATA,
            Frame::MaxStreamData(_) => FRAME_TYPE_MAX_STREAM_DATA,
            Frame::MaxStreams(f) => {
                if f.bidirectional {
                    FRAME_TYPE_MAX_STREAMS_BIDI
                } else {
                    FRAME_TYPE_MAX_STREAMS_UNI
                }
            }
            Frame::DataBlocked(_) => FRAME_TYPE_DATA_BLOCKED,
            Frame::StreamDataBlocked(_) => FRAME_TYPE_STREAM_DATA_BLOCKED,
            Frame::StreamsBlocked(f) => {
                if f.bidirectional {
                    FRAME_TYPE_STREAMS_BLOCKED_BIDI
                } else {
                    FRAME_TYPE_STREAMS_BLOCKED_UNI
                }
            }
            Frame::NewConnectionId(_) => FRAME_TYPE_NEW_CONNECTION_ID,
            Frame::RetireConnectionId(_) => FRAME_TYPE_RETIRE_CONNECTION_ID,
            Frame::PathChallenge(_) => FRAME_TYPE_PATH_CHALLENGE,
            Frame::PathResponse(_) => FRAME_TYPE_PATH_RESPONSE,
            Frame::ConnectionClose(c) => {
                if c.application_close {
                    FRAME_TYPE_CONNECTION_CLOSE_APP
                } else {
                    FRAME_TYPE_CONNECTION_CLOSE_QUIC
                }
            }
            Frame::HandshakeDone => FRAME_TYPE_HANDSHAKE_DONE,
        }
    }

    /// Encoded size with minimal VarInt fields.
    ///
    /// Equals the bytes written by [`Frame::encode`] and the bytes consumed
    /// when decoding a minimally encoded frame. Decoded packets keep the
    /// actual sizes in `Packet::frame_wire_lengths`.
    pub fn frame_length(&self) -> usize {
        let body = match self {
            Frame::Padding(p) => return p.count,
            Frame::Ping | Frame::HandshakeDone => 0,
            Frame::Ack(ack) => {
                let mut len = vlen(ack.largest_acknowledged)
                    + vlen(ack.ack_delay)
                    + vlen(ack.ranges.len() as u64)
                    + vlen(ack.first_ack_range);
                for r in ack.ranges.iter() {
                    len += vlen(r.gap) + vlen(r.length);
                }
                if let Some(ecn) = &ack.ecn_counts {
                    len += vlen(ecn.ect0_count) + vlen(ecn.ect1_count) + vlen(ecn.ce_count);
                }
                len
            }
            Frame::ResetStream(f) => {
                vlen(f.stream_id.value()) + vlen(f.error_code) + vlen(f.final_size)
            }
            Frame::StopSending(f) => vlen(f.stream_id.value()) + vlen(f.error_code),
            Frame::Crypto(f) => vlen(f.offset) + vlen(f.data.len() as u64) + f.data.len(),
            Frame::NewToken(f) => vlen(f.token.len() as u64) + f.token.len(),
            Frame::Stream(f) => {
                let mut len = vlen(f.stream_id.value()) + f.data.len();
                if f.has_offset {
                    len += vlen(f.offset);
                }
                if f.has_length {
                    len += vlen(f.data.len() as u64);
                }
                len
            }
            Frame::MaxData(v) | Frame::DataBlocked(v) | Frame::RetireConnectionId(v) => vlen(*v),
            Frame::MaxStreamData(f) => vlen(f.stream_id.value()) + vlen(f.maximum_stream_data),
            Frame::MaxStreams(f) => vlen(f.maximum_streams),
            Frame::StreamDataBlocked(f) => vlen(f.stream_id.value()) + vlen(f.stream_data_limit),
            Frame::StreamsBlocked(f) => vlen(f.stream_limit),
            Frame::NewConnectionId(f) => {
                vlen(f.sequence_number())
                    + vlen(f.retire_prior_to)
                    + 1
                    + f.connection_id.len()
                    + f.stateless_reset_token.len()
            }
            Frame::PathChallenge(_) | Frame::PathResponse(_) => 8,
            Frame::ConnectionClose(c) => {
                vlen(c.error_code)
                    + c.frame_type.map_or(0, vlen)
                    + vlen(c.reason.len() as u64)
                    + c.reason.len()
            }
        };
        vlen(self.frame_type()) + body
    }

    /// Field-level validity; never looks at wire bytes.
    pub fn is_valid(&self) -> bool {
        let in_range = |v: u64| v <= VARINT_MAX;
        match self {
            Frame::Padding(p) => p.count > 0,
            Frame::Ping | Frame::HandshakeDone => true,
            Frame::Ack(ack) => ack.is_valid(),
            Frame::ResetStream(f) => in_range(f.error_code) && in_range(f.final_size),
            Frame::StopSending(f) => in_range(f.error_code),
            Frame::Crypto(f) => f
                .offset
                .checked_add(f.data.len() as u64)
                .map_or(false, in_range),
            Frame::NewToken(f) => !f.token.is_empty(),
            Frame::Stream(f) => {
                (f.has_offset || f.offset == 0)
                    && f.offset.checked_add(f.data.len() as u64).map_or(false, in_range)
            }
            Frame::MaxData(v) | Frame::DataBlocked(v) | Frame::RetireConnectionId(v) => {
                in_range(*v)
            }
            Frame::MaxStreamData(f) => in_range(f.maximum_stream_data),
            Frame::MaxStreams(f) => f.maximum_streams <= MAX_STREAMS_LIMIT,
            Frame::StreamDataBlocked(f) => in_range(f.stream_data_limit),
            Frame::StreamsBlocked(f) => f.stream_limit <= MAX_STREAMS_LIMIT,
            Frame::NewConnectionId(f) => {
                !f.connection_id.is_empty() && f.retire_prior_to <= f.sequence_number()
            }
            Frame::PathChallenge(_) | Frame::PathResponse(_) => true,
            Frame::ConnectionClose(c) => {
                in_range(c.error_code) && c.application_close == c.frame_type.is_none()
            }
        }
    }

    /// Returns true if this frame is ACK-eliciting (RFC 9000 Section 13.2)
    pub fn is_ack_eliciting(&self) -> bool {
        !matches!(
            self,
            Frame::Padding(_) | Frame::Ack(_) | Frame::ConnectionClose(_)
        )
    }

    /// Whether the frame may appear in a packet of type `packet`
    /// (RFC 9000 Section 12.4, Table 3).
    pub fn permitted_in(&self, packet: PacketType) -> bool {
        match packet {
            PacketType::Initial | PacketType::Handshake => match self {
                Frame::Padding(_) | Frame::Ping | Frame::Ack(_) | Frame::Crypto(_) => true,
                Frame::ConnectionClose(c) => !c.application_close,
                _ => false,
            },
            PacketType::ZeroRtt => !matches!(
                self,
                Frame::Ack(_)
                    | Frame::Crypto(_)
                    | Frame::NewToken(_)
                    | Frame::PathResponse(_)
                    | Frame::RetireConnectionId(_)
                    | Frame::HandshakeDone
            ),
            PacketType::OneRtt => true,
            PacketType::Retry | PacketType::VersionNegotiation => false,
        }
    }
}

//! QUIC Error Types
//!
//! RFC 9000 Section 20 defines the transport error codes carried in
//! CONNECTION_CLOSE frames. Every failure inside the wire engine maps onto
//! one of them via [`Error::transport_code`], so the connection layer can
//! close with the right code without re-inspecting the failure.

#![forbid(unsafe_code)]

use crate::crypto::EncryptionLevel;
use thiserror::Error;

/// Transport Error Codes as defined in RFC 9000 Section 20.1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[repr(u64)]
pub enum TransportError {
    /// No error (0x00) - Used for graceful shutdown
    #[error("NO_ERROR")]
    NoError = 0x00,

    /// Internal Error (0x01) - Implementation error
    #[error("INTERNAL_ERROR")]
    InternalError = 0x01,

    /// Connection Refused (0x02)
    #[error("CONNECTION_REFUSED")]
    ConnectionRefused = 0x02,

    /// Flow Control Error (0x03) - Peer exceeded flow control limits
    #[error("FLOW_CONTROL_ERROR")]
    FlowControlError = 0x03,

    /// Stream Limit Error (0x04)
    #[error("STREAM_LIMIT_ERROR")]
    StreamLimitError = 0x04,

    /// Stream State Error (0x05) - Frame received in invalid stream state
    #[error("STREAM_STATE_ERROR")]
    StreamStateError = 0x05,

    /// Final Size Error (0x06)
    #[error("FINAL_SIZE_ERROR")]
    FinalSizeError = 0x06,

    /// Frame Encoding Error (0x07)
    #[error("FRAME_ENCODING_ERROR")]
    FrameEncodingError = 0x07,

    /// Transport Parameter Error (0x08)
    #[error("TRANSPORT_PARAMETER_ERROR")]
    TransportParameterError = 0x08,

    /// Connection ID Limit Error (0x09)
    #[error("CONNECTION_ID_LIMIT_ERROR")]
    ConnectionIdLimitError = 0x09,

    /// Protocol Violation (0x0a)
    #[error("PROTOCOL_VIOLATION")]
    ProtocolViolation = 0x0a,

    /// Invalid Token (0x0b)
    #[error("INVALID_TOKEN")]
    InvalidToken = 0x0b,

    /// Application Error (0x0c)
    #[error("APPLICATION_ERROR")]
    ApplicationError = 0x0c,

    /// Crypto Buffer Exceeded (0x0d)
    #[error("CRYPTO_BUFFER_EXCEEDED")]
    CryptoBufferExceeded = 0x0d,

    /// Key Update Error (0x0e)
    #[error("KEY_UPDATE_ERROR")]
    KeyUpdateError = 0x0e,

    /// AEAD Limit Reached (0x0f)
    #[error("AEAD_LIMIT_REACHED")]
    AeadLimitReached = 0x0f,

    /// No Viable Path (0x10)
    #[error("NO_VIABLE_PATH")]
    NoViablePath = 0x10,
}

impl TransportError {
    /// Wire value of this error code.
    pub fn code(self) -> u64 {
        self as u64
    }

    /// Map a wire value back to a known code.
    ///
    /// Crypto errors (0x0100-0x01ff) and unknown codes return `None`.
    pub fn from_code(code: u64) -> Option<Self> {
        Some(match code {
            0x00 => TransportError::NoError,
            0x01 => TransportError::InternalError,
            0x02 => TransportError::ConnectionRefused,
            0x03 => TransportError::FlowControlError,
            0x04 => TransportError::StreamLimitError,
            0x05 => TransportError::StreamStateError,
            0x06 => TransportError::FinalSizeError,
            0x07 => TransportError::FrameEncodingError,
            0x08 => TransportError::TransportParameterError,
            0x09 => TransportError::ConnectionIdLimitError,
            0x0a => TransportError::ProtocolViolation,
            0x0b => TransportError::InvalidToken,
            0x0c => TransportError::ApplicationError,
            0x0d => TransportError::CryptoBufferExceeded,
            0x0e => TransportError::KeyUpdateError,
            0x0f => TransportError::AeadLimitReached,
            0x10 => TransportError::NoViablePath,
            _ => return None,
        })
    }
}

/// Generic Result Type for QUIC Operations
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the wire engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A transport-level protocol error raised by frame effects.
    #[error("transport error: {0}")]
    Transport(TransportError),

    /// Fewer bytes remain than the field being read requires.
    #[error("buffer too short")]
    BufferTooShort,

    /// The fixed bit (0x40) of the first byte is clear.
    #[error("fixed bit not set")]
    FixedBitNotSet,

    /// Long header carries a version this endpoint does not speak.
    #[error("unsupported version 0x{0:08x}")]
    UnsupportedVersion(u32),

    /// Connection ID length byte exceeds 20.
    #[error("connection id length {0} exceeds 20")]
    ConnectionIdTooLong(usize),

    /// Short header arrived but the DCID length is not known for it.
    #[error("short header connection id length unknown")]
    UnknownConnectionIdLength,

    /// Length field does not fit in the remaining datagram.
    #[error("packet length {declared} exceeds {available} remaining bytes")]
    PacketLengthExceeded { declared: u64, available: usize },

    /// Reserved header bits are non-zero after protection is removed.
    #[error("reserved header bits set")]
    ReservedBitsSet,

    /// Version Negotiation version list is not a whole number of versions.
    #[error("malformed version negotiation packet")]
    InvalidVersionList,

    /// Header protection sample runs past the end of the packet.
    #[error("packet too short for header protection sample")]
    SampleOutOfBounds,

    /// A coalesced packet's DCID differs from the first packet's.
    #[error("coalesced packet connection id mismatch")]
    ConnectionIdMismatch,

    /// Header protection keys for this level are not installed yet.
    #[error("keys for {0:?} not yet available")]
    KeysUnavailable(EncryptionLevel),

    /// Frame type tag is not in the catalogue.
    #[error("unknown frame type 0x{0:x}")]
    UnknownFrameType(u64),

    /// Frame type tag is encoded with more bytes than necessary.
    #[error("frame type 0x{0:x} not minimally encoded")]
    NonMinimalFrameType(u64),

    /// Frame fields are truncated or inconsistent.
    #[error("malformed frame of type 0x{0:x}")]
    MalformedFrame(u64),

    /// Frame type not allowed in the containing packet type.
    #[error("frame type 0x{frame_type:x} not permitted in {packet:?} packet")]
    FrameNotPermitted {
        frame_type: u64,
        packet: crate::packet::PacketType,
    },

    /// Packet carried no frames where at least one is required.
    #[error("packet payload is empty")]
    EmptyPayload,

    /// Value exceeds 2^62 - 1.
    #[error("value {0} out of varint range")]
    VarIntOutOfRange(u64),

    /// Cryptographic primitive could not be set up or used.
    #[error("crypto setup failed: {0}")]
    CryptoSetup(&'static str),

    /// Payload could not be opened by the packet protection collaborator.
    #[error("payload decryption failed")]
    PayloadDecryption,

    /// Stream id is out of range or belongs to the wrong initiator.
    #[error("invalid stream id {0}")]
    InvalidStreamId(u64),

    /// Counter update would overflow the 62-bit range.
    #[error("flow control counter overflow")]
    FlowControlOverflow,

    /// Output buffer cannot hold the encoded value.
    #[error("output buffer too small")]
    OutputTooSmall,
}

impl Error {
    /// Transport error code to close the connection with.
    pub fn transport_code(&self) -> TransportError {
        match self {
            Error::Transport(code) => *code,
            Error::BufferTooShort
            | Error::UnknownFrameType(_)
            | Error::MalformedFrame(_)
            | Error::VarIntOutOfRange(_) => TransportError::FrameEncodingError,
            Error::FixedBitNotSet
            | Error::ConnectionIdTooLong(_)
            | Error::UnknownConnectionIdLength
            | Error::PacketLengthExceeded { .. }
            | Error::SampleOutOfBounds
            | Error::ReservedBitsSet
            | Error::InvalidVersionList
            | Error::ConnectionIdMismatch
            | Error::NonMinimalFrameType(_)
            | Error::FrameNotPermitted { .. }
            | Error::EmptyPayload
            | Error::UnsupportedVersion(_) => TransportError::ProtocolViolation,
            Error::KeysUnavailable(_)
            | Error::CryptoSetup(_)
            | Error::OutputTooSmall => TransportError::InternalError,
            Error::PayloadDecryption => TransportError::ProtocolViolation,
            Error::InvalidStreamId(_) => TransportError::StreamStateError,
            Error::FlowControlOverflow => TransportError::FlowControlError,
        }
    }

    /// True for the "keys not yet available" deferral signal.
    pub fn is_keys_unavailable(&self) -> bool {
        matches!(self, Error::KeysUnavailable(_))
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

/// A datagram parse failure pinned to its location.
///
/// `packet_index` counts coalesced packets from zero; `offset` is the byte
/// offset within the datagram where the failing read started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("packet #{packet_index} at offset {offset}: {error}")]
pub struct ParseError {
    pub packet_index: usize,
    pub offset: usize,
    #[source]
    pub error: Error,
}

impl ParseError {
    pub fn new(packet_index: usize, offset: usize, error: Error) -> Self {
        Self {
            packet_index,
            offset,
            error,
        }
    }
}

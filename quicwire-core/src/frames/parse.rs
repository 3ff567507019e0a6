//! # Frame Parsing (RFC 9000 Section 12.4)
//!
//! A packet payload is a sequence of frames, each starting with a
//! variable-length type tag. The decoder walks a length-bounded [`Reader`]
//! over the payload, so the packet's Length field is the frame budget and a
//! frame can never read into the next coalesced packet.

#![forbid(unsafe_code)]

use bytes::Buf;
use tracing::trace;

use super::types::*;
use crate::error::{Error, ParseError, Result};
use crate::packet::PacketType;
use crate::reader::Reader;
use crate::types::{ConnectionId, StreamId, MAX_CID_LENGTH};
use crate::varint::VarIntCodec;

/// Decode every frame of one packet payload.
///
/// `packet_index` is only used to label errors. The payload must carry at
/// least one frame, every frame must be valid and permitted in
/// `packet_type`.
///
/// Returns the frames and, in the same order, the bytes each one occupied.
/// Fields may use non-minimal VarInts, so a wire length can exceed
/// [`Frame::frame_length`].
pub fn decode_frames(
    payload: &mut Reader,
    packet_index: usize,
    packet_type: PacketType,
) -> core::result::Result<(Vec<Frame>, Vec<usize>), ParseError> {
    let mut frames = Vec::new();
    let mut wire_lengths = Vec::new();
    for item in FrameIterator::new(payload, packet_index, packet_type) {
        let (frame, wire_len) = item?;
        frames.push(frame);
        wire_lengths.push(wire_len);
    }
    if frames.is_empty() {
        return Err(ParseError::new(
            packet_index,
            payload.position(),
            Error::EmptyPayload,
        ));
    }
    Ok((frames, wire_lengths))
}

/// Frame Iterator
///
/// Yields one frame and its wire length per step and stops after the first
/// error, leaving the reader positioned where the failing frame started.
pub struct FrameIterator<'r> {
    reader: &'r mut Reader,
    packet_index: usize,
    packet_type: PacketType,
    failed: bool,
}

impl<'r> FrameIterator<'r> {
    pub fn new(reader: &'r mut Reader, packet_index: usize, packet_type: PacketType) -> Self {
        Self {
            reader,
            packet_index,
            packet_type,
            failed: false,
        }
    }
}

impl Iterator for FrameIterator<'_> {
    type Item = core::result::Result<(Frame, usize), ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || !self.reader.has_remaining() {
            return None;
        }

        let start = self.reader.position();
        let mut lookahead = self.reader.clone();
        let result = decode_frame(&mut lookahead).and_then(|frame| {
            if !frame.permitted_in(self.packet_type) {
                return Err(Error::FrameNotPermitted {
                    frame_type: frame.frame_type(),
                    packet: self.packet_type,
                });
            }
            Ok(frame)
        });

        match result {
            Ok(frame) => {
                trace!(
                    packet_index = self.packet_index,
                    offset = start,
                    frame_type = frame.frame_type(),
                    "decoded frame"
                );
                let wire_len = lookahead.position() - start;
                *self.reader = lookahead;
                Some(Ok((frame, wire_len)))
            }
            Err(error) => {
                self.failed = true;
                Some(Err(ParseError::new(self.packet_index, start, error)))
            }
        }
    }
}

fn varint(rd: &mut Reader, frame_type: u64) -> Result<u64> {
    rd.read_varint().ok_or(Error::MalformedFrame(frame_type))
}

fn stream_id(rd: &mut Reader, frame_type: u64) -> Result<StreamId> {
    StreamId::new(varint(rd, frame_type)?).ok_or(Error::MalformedFrame(frame_type))
}

fn length_prefixed(rd: &mut Reader, frame_type: u64) -> Result<bytes::Bytes> {
    let len = varint(rd, frame_type)?;
    if len > rd.remaining() as u64 {
        return Err(Error::MalformedFrame(frame_type));
    }
    rd.read_bytes(len as usize)
        .ok_or(Error::MalformedFrame(frame_type))
}

/// Decode a single frame starting at the reader's position.
pub fn decode_frame(rd: &mut Reader) -> Result<Frame> {
    let tag_start = rd.remaining();
    let frame_type = rd.read_varint().ok_or(Error::BufferTooShort)?;
    if tag_start - rd.remaining() != VarIntCodec::size(frame_type) {
        return Err(Error::NonMinimalFrameType(frame_type));
    }

    let frame = match frame_type {
        FRAME_TYPE_PADDING => {
            let mut count = 1;
            while rd.peek_u8() == Some(0x00) {
                rd.advance(1);
                count += 1;
            }
            Frame::Padding(PaddingFrame { count })
        }

        FRAME_TYPE_PING => Frame::Ping,

        FRAME_TYPE_ACK | FRAME_TYPE_ACK_ECN => Frame::Ack(decode_ack(rd, frame_type)?),

        FRAME_TYPE_RESET_STREAM => Frame::ResetStream(ResetStreamFrame {
            stream_id: stream_id(rd, frame_type)?,
            error_code: varint(rd, frame_type)?,
            final_size: varint(rd, frame_type)?,
        }),

        FRAME_TYPE_STOP_SENDING => Frame::StopSending(StopSendingFrame {
            stream_id: stream_id(rd, frame_type)?,
            error_code: varint(rd, frame_type)?,
        }),

        FRAME_TYPE_CRYPTO => {
            let offset = varint(rd, frame_type)?;
            let data = length_prefixed(rd, frame_type)?;
            Frame::Crypto(CryptoFrame { offset, data })
        }

        FRAME_TYPE_NEW_TOKEN => Frame::NewToken(NewTokenFrame {
            token: length_prefixed(rd, frame_type)?,
        }),

        // STREAM frames: 0x08-0x0f
        0x08..=0x0f => Frame::Stream(decode_stream(rd, frame_type)?),

        FRAME_TYPE_MAX_DATA => Frame::MaxData(varint(rd, frame_type)?),

        FRAME_TYPE_MAX_STREAM_DATA => Frame::MaxStreamData(MaxStreamDataFrame {
            stream_id: stream_id(rd, frame_type)?,
            maximum_stream_data: varint(rd, frame_type)?,
        }),

        FRAME_TYPE_MAX_STREAMS_BIDI | FRAME_TYPE_MAX_STREAMS_UNI => {
            Frame::MaxStreams(MaxStreamsFrame {
                maximum_streams: varint(rd, frame_type)?,
                bidirectional: frame_type == FRAME_TYPE_MAX_STREAMS_BIDI,
            })
        }

        FRAME_TYPE_DATA_BLOCKED => Frame::DataBlocked(varint(rd, frame_type)?),

        FRAME_TYPE_STREAM_DATA_BLOCKED => Frame::StreamDataBlocked(StreamDataBlockedFrame {
            stream_id: stream_id(rd, frame_type)?,
            stream_data_limit: varint(rd, frame_type)?,
        }),

        FRAME_TYPE_STREAMS_BLOCKED_BIDI | FRAME_TYPE_STREAMS_BLOCKED_UNI => {
            Frame::StreamsBlocked(StreamsBlockedFrame {
                stream_limit: varint(rd, frame_type)?,
                bidirectional: frame_type == FRAME_TYPE_STREAMS_BLOCKED_BIDI,
            })
        }

        FRAME_TYPE_NEW_CONNECTION_ID => Frame::NewConnectionId(decode_new_cid(rd, frame_type)?),

        FRAME_TYPE_RETIRE_CONNECTION_ID => Frame::RetireConnectionId(varint(rd, frame_type)?),

        FRAME_TYPE_PATH_CHALLENGE => Frame::PathChallenge(
            rd.read_array::<8>()
                .ok_or(Error::MalformedFrame(frame_type))?,
        ),

        FRAME_TYPE_PATH_RESPONSE => Frame::PathResponse(
            rd.read_array::<8>()
                .ok_or(Error::MalformedFrame(frame_type))?,
        ),

        FRAME_TYPE_CONNECTION_CLOSE_QUIC | FRAME_TYPE_CONNECTION_CLOSE_APP => {
            let application_close = frame_type == FRAME_TYPE_CONNECTION_CLOSE_APP;
            let error_code = varint(rd, frame_type)?;
            let trigger = if application_close {
                None
            } else {
                Some(varint(rd, frame_type)?)
            };
            Frame::ConnectionClose(ConnectionCloseFrame {
                error_code,
                frame_type: trigger,
                reason: length_prefixed(rd, frame_type)?,
                application_close,
            })
        }

        FRAME_TYPE_HANDSHAKE_DONE => Frame::HandshakeDone,

        other => return Err(Error::UnknownFrameType(other)),
    };

    if !frame.is_valid() {
        return Err(Error::MalformedFrame(frame_type));
    }
    Ok(frame)
}

/// Parse ACK frame (RFC 9000 Section 19.3)
fn decode_ack(rd: &mut Reader, frame_type: u64) -> Result<AckFrame> {
    let largest_acknowledged = varint(rd, frame_type)?;
    let ack_delay = varint(rd, frame_type)?;
    let range_count = varint(rd, frame_type)?;
    let first_ack_range = varint(rd, frame_type)?;

    // each range needs at least two bytes
    if range_count > (rd.remaining() / 2) as u64 {
        return Err(Error::MalformedFrame(frame_type));
    }

    let mut ranges = tinyvec::TinyVec::new();
    for _ in 0..range_count {
        ranges.push(AckRange {
            gap: varint(rd, frame_type)?,
            length: varint(rd, frame_type)?,
        });
    }

    let ecn_counts = if frame_type == FRAME_TYPE_ACK_ECN {
        Some(EcnCounts {
            ect0_count: varint(rd, frame_type)?,
            ect1_count: varint(rd, frame_type)?,
            ce_count: varint(rd, frame_type)?,
        })
    } else {
        None
    };

    Ok(AckFrame {
        largest_acknowledged,
        ack_delay,
        first_ack_range,
        ranges,
        ecn_counts,
    })
}

/// Parse STREAM frame (RFC 9000 Section 19.8)
fn decode_stream(rd: &mut Reader, frame_type: u64) -> Result<StreamFrame> {
    let has_offset = frame_type & STREAM_FRAME_BIT_OFF != 0;
    let has_length = frame_type & STREAM_FRAME_BIT_LEN != 0;
    let fin = frame_type & STREAM_FRAME_BIT_FIN != 0;

    let stream_id = stream_id(rd, frame_type)?;
    let offset = if has_offset {
        varint(rd, frame_type)?
    } else {
        0
    };
    let data = if has_length {
        length_prefixed(rd, frame_type)?
    } else {
        rd.read_rest()
    };

    Ok(StreamFrame {
        stream_id,
        offset,
        data,
        fin,
        has_offset,
        has_length,
    })
}

/// Parse NEW_CONNECTION_ID frame (RFC 9000 Section 19.15)
fn decode_new_cid(rd: &mut Reader, frame_type: u64) -> Result<NewConnectionIdFrame> {
    let sequence_number = varint(rd, frame_type)?;
    let retire_prior_to = varint(rd, frame_type)?;

    let cid_len = rd.read_u8().ok_or(Error::MalformedFrame(frame_type))? as usize;
    if cid_len == 0 || cid_len > MAX_CID_LENGTH {
        return Err(Error::MalformedFrame(frame_type));
    }
    let cid_bytes = rd
        .read_bytes(cid_len)
        .ok_or(Error::MalformedFrame(frame_type))?;
    let stateless_reset_token = rd
        .read_array::<16>()
        .ok_or(Error::MalformedFrame(frame_type))?;

    let connection_id = ConnectionId::with_sequence(cid_bytes, sequence_number)
        .ok_or(Error::MalformedFrame(frame_type))?;

    Ok(NewConnectionIdFrame {
        retire_prior_to,
        connection_id,
        stateless_reset_token,
    })
}

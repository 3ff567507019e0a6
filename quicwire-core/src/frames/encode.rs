//! # Frame Serialization (RFC 9000 Section 19)
//!
//! Writes frames with minimal VarInt encodings, so the output length is
//! always [`Frame::frame_length`].

#![forbid(unsafe_code)]

use bytes::BufMut;

use super::types::*;
use crate::error::{Error, Result};
use crate::varint::VarIntCodec;

fn put_varint<B: BufMut>(buf: &mut B, value: u64) -> Result<()> {
    VarIntCodec::encode(value, buf)
        .map(|_| ())
        .ok_or(Error::VarIntOutOfRange(value))
}

impl Frame {
    /// Serialize into `buf`, returning the bytes written.
    ///
    /// Fails before writing anything if `buf` cannot hold
    /// [`Frame::frame_length`] bytes.
    pub fn encode<B: BufMut>(&self, buf: &mut B) -> Result<usize> {
        let len = self.frame_length();
        if buf.remaining_mut() < len {
            return Err(Error::OutputTooSmall);
        }

        if let Frame::Padding(p) = self {
            buf.put_bytes(0x00, p.count);
            return Ok(len);
        }

        put_varint(buf, self.frame_type())?;

        match self {
            Frame::Padding(_) | Frame::Ping | Frame::HandshakeDone => {}

            Frame::Ack(ack) => {
                put_varint(buf, ack.largest_acknowledged)?;
                put_varint(buf, ack.ack_delay)?;
                put_varint(buf, ack.ranges.len() as u64)?;
                put_varint(buf, ack.first_ack_range)?;
                for range in ack.ranges.iter() {
                    put_varint(buf, range.gap)?;
                    put_varint(buf, range.length)?;
                }
                if let Some(ecn) = &ack.ecn_counts {
                    put_varint(buf, ecn.ect0_count)?;
                    put_varint(buf, ecn.ect1_count)?;
                    put_varint(buf, ecn.ce_count)?;
                }
            }

            Frame::ResetStream(f) => {
                put_varint(buf, f.stream_id.value())?;
                put_varint(buf, f.error_code)?;
                put_varint(buf, f.final_size)?;
            }

            Frame::StopSending(f) => {
                put_varint(buf, f.stream_id.value())?;
                put_varint(buf, f.error_code)?;
            }

            Frame::Crypto(f) => {
                put_varint(buf, f.offset)?;
                put_varint(buf, f.data.len() as u64)?;
                buf.put_slice(&f.data);
            }

            Frame::NewToken(f) => {
                put_varint(buf, f.token.len() as u64)?;
                buf.put_slice(&f.token);
            }

            Frame::Stream(f) => {
                put_varint(buf, f.stream_id.value())?;
                if f.has_offset {
                    put_varint(buf, f.offset)?;
                }
                if f.has_length {
                    put_varint(buf, f.data.len() as u64)?;
                }
                buf.put_slice(&f.data);
            }

            Frame::MaxData(v) | Frame::DataBlocked(v) | Frame::RetireConnectionId(v) => {
                put_varint(buf, *v)?;
            }

            Frame::MaxStreamData(f) => {
                put_varint(buf, f.stream_id.value())?;
                put_varint(buf, f.maximum_stream_data)?;
            }

            Frame::MaxStreams(f) => put_varint(buf, f.maximum_streams)?,

            Frame::StreamDataBlocked(f) => {
                put_varint(buf, f.stream_id.value())?;
                put_varint(buf, f.stream_data_limit)?;
            }

            Frame::StreamsBlocked(f) => put_varint(buf, f.stream_limit)?,

            Frame::NewConnectionId(f) => {
                put_varint(buf, f.sequence_number())?;
                put_varint(buf, f.retire_prior_to)?;
                buf.put_u8(f.connection_id.len() as u8);
                buf.put_slice(f.connection_id.as_bytes());
                buf.put_slice(&f.stateless_reset_token);
            }

            Frame::PathChallenge(data) | Frame::PathResponse(data) => buf.put_slice(data),

            Frame::ConnectionClose(c) => {
                put_varint(buf, c.error_code)?;
                if let Some(trigger) = c.frame_type {
                    put_varint(buf, trigger)?;
                }
                put_varint(buf, c.reason.len() as u64)?;
                buf.put_slice(&c.reason);
            }
        }

        Ok(len)
    }
}

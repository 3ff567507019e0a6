//! # Connection State and Frame Effects (RFC 9000 Section 2-4, 19)
//!
//! [`ConnectionState`] is the mutable per-connection state decoded frames
//! act on: stream ids, flow-control credit in both directions, connection
//! ids, handshake completion and close. It performs no I/O and owns no
//! timers.

#![forbid(unsafe_code)]

use std::collections::HashMap;

use tracing::{debug, info, trace};

use super::cid_registry::{ConnectionIdRegistry, DEFAULT_ACTIVE_CID_LIMIT};
use crate::error::{Error, Result, TransportError};
use crate::flow_control::FlowCredit;
use crate::frames::{ConnectionCloseFrame, Frame, StreamFrame};
use crate::stream::StreamIdContext;
use crate::types::{ConnectionId, Side, StreamId};

/// Initial limits, normally taken from transport parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionLimits {
    /// Connection bytes the peer may send us.
    pub max_data_local: u64,
    /// Connection bytes we may send before the peer's first MAX_DATA.
    pub max_data_remote: u64,
    /// Per-stream bytes the peer may send us.
    pub max_stream_data_local: u64,
    /// Per-stream bytes we may send.
    pub max_stream_data_remote: u64,
    /// Bidirectional streams the peer may open.
    pub max_streams_bidi_local: u64,
    /// Unidirectional streams the peer may open.
    pub max_streams_uni_local: u64,
    /// Bidirectional streams we may open before the peer's first MAX_STREAMS.
    pub max_streams_bidi_remote: u64,
    /// Unidirectional streams we may open before the peer's first MAX_STREAMS.
    pub max_streams_uni_remote: u64,
    pub active_connection_id_limit: u64,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            max_data_local: 1 << 20,
            max_data_remote: 1 << 20,
            max_stream_data_local: 1 << 18,
            max_stream_data_remote: 1 << 18,
            max_streams_bidi_local: 100,
            max_streams_uni_local: 100,
            max_streams_bidi_remote: 100,
            max_streams_uni_remote: 100,
            active_connection_id_limit: DEFAULT_ACTIVE_CID_LIMIT,
        }
    }
}

/// Receive-side bookkeeping for one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecvStreamState {
    pub credit: FlowCredit,
    /// Highest offset seen; the difference to the previous one is what a
    /// frame charges against flow control.
    pub highest_offset: u64,
    pub final_size: Option<u64>,
    pub reset_error: Option<u64>,
}

/// Connection State
#[derive(Debug)]
pub struct ConnectionState {
    side: Side,
    limits: ConnectionLimits,
    streams: StreamIdContext,

    recv_credit: FlowCredit,
    send_credit: FlowCredit,
    recv_streams: HashMap<StreamId, RecvStreamState>,
    send_streams: HashMap<StreamId, FlowCredit>,
    /// Streams the peer lets us open: (bidirectional, unidirectional).
    peer_max_streams: (u64, u64),
    stopped_streams: HashMap<StreamId, u64>,

    cids: ConnectionIdRegistry,
    /// Only the latest PATH_CHALLENGE is answered.
    pending_path_response: Option<[u8; 8]>,
    new_token: Option<bytes::Bytes>,
    handshake_done: bool,
    close: Option<ConnectionCloseFrame>,
}

fn err(code: TransportError) -> Error {
    Error::Transport(code)
}

impl ConnectionState {
    pub fn new(side: Side, local_cid: ConnectionId, limits: ConnectionLimits) -> Self {
        Self {
            side,
            limits,
            streams: StreamIdContext::new(side),
            recv_credit: FlowCredit::new(limits.max_data_local),
            send_credit: FlowCredit::new(limits.max_data_remote),
            recv_streams: HashMap::new(),
            send_streams: HashMap::new(),
            peer_max_streams: (limits.max_streams_bidi_remote, limits.max_streams_uni_remote),
            stopped_streams: HashMap::new(),
            cids: ConnectionIdRegistry::new(local_cid, limits.active_connection_id_limit),
            pending_path_response: None,
            new_token: None,
            handshake_done: false,
            close: None,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn streams(&self) -> &StreamIdContext {
        &self.streams
    }

    pub fn connection_ids(&self) -> &ConnectionIdRegistry {
        &self.cids
    }

    pub fn connection_ids_mut(&mut self) -> &mut ConnectionIdRegistry {
        &mut self.cids
    }

    /// Connection-level credit for data the peer sends.
    pub fn recv_credit(&self) -> &FlowCredit {
        &self.recv_credit
    }

    /// Connection-level credit for data we send.
    pub fn send_credit(&self) -> &FlowCredit {
        &self.send_credit
    }

    pub fn recv_stream(&self, id: StreamId) -> Option<&RecvStreamState> {
        self.recv_streams.get(&id)
    }

    pub fn send_stream(&self, id: StreamId) -> Option<&FlowCredit> {
        self.send_streams.get(&id)
    }

    /// Error code from a STOP_SENDING the peer sent for `id`.
    pub fn stop_sending_error(&self, id: StreamId) -> Option<u64> {
        self.stopped_streams.get(&id).copied()
    }

    pub fn peer_max_streams(&self, bidirectional: bool) -> u64 {
        if bidirectional {
            self.peer_max_streams.0
        } else {
            self.peer_max_streams.1
        }
    }

    pub fn is_handshake_done(&self) -> bool {
        self.handshake_done
    }

    pub fn close_reason(&self) -> Option<&ConnectionCloseFrame> {
        self.close.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.close.is_some()
    }

    /// Payload of the most recent PATH_CHALLENGE to echo back
    /// (RFC 9000 Section 8.2.2).
    pub fn take_path_response(&mut self) -> Option<[u8; 8]> {
        self.pending_path_response.take()
    }

    pub fn new_token(&self) -> Option<&bytes::Bytes> {
        self.new_token.as_ref()
    }

    /// Open a local stream, bounded by the peer's MAX_STREAMS.
    pub fn open_stream(&mut self, unidirectional: bool) -> Result<StreamId> {
        let opened = self.streams.opened(
            StreamId::from_parts(self.side, unidirectional, 0)
                .ok_or(Error::InvalidStreamId(0))?
                .stream_type(),
        );
        if opened >= self.peer_max_streams(!unidirectional) {
            return Err(err(TransportError::StreamLimitError));
        }
        let id = self.streams.create_new_id(unidirectional)?;
        self.send_streams
            .insert(id, FlowCredit::new(self.limits.max_stream_data_remote));
        if !unidirectional {
            self.recv_streams.insert(
                id,
                RecvStreamState {
                    credit: FlowCredit::new(self.limits.max_stream_data_local),
                    ..Default::default()
                },
            );
        }
        Ok(id)
    }

    /// True if `n` more bytes fit both the stream and connection credit.
    pub fn can_send(&self, id: StreamId, n: u64) -> bool {
        self.send_credit.can_send(n)
            && self.send_streams.get(&id).is_some_and(|c| c.can_send(n))
    }

    /// Charge `n` sent bytes against both send credits.
    pub fn record_sent(&mut self, id: StreamId, n: u64) -> Result<()> {
        if !self.can_send(id, n) {
            return Err(err(TransportError::FlowControlError));
        }
        self.send_credit.increment_transferred(n)?;
        if let Some(credit) = self.send_streams.get_mut(&id) {
            credit.increment_transferred(n)?;
        }
        Ok(())
    }

    /// Resolve a stream id referenced by a received frame.
    ///
    /// `receiving` is true for frames carrying data towards us, which a
    /// locally-initiated unidirectional stream can never have.
    fn resolve_stream(&mut self, id: StreamId, receiving: bool) -> Result<StreamId> {
        if id.initiator() == self.side {
            if !self.streams.contains(id) {
                return Err(err(TransportError::StreamStateError));
            }
            if receiving && id.is_unidirectional() {
                return Err(err(TransportError::StreamStateError));
            }
            return Ok(id);
        }

        if !receiving && id.is_unidirectional() {
            // peer unidirectional streams are receive-only for us
            return Err(err(TransportError::StreamStateError));
        }

        let limit = if id.is_bidirectional() {
            self.limits.max_streams_bidi_local
        } else {
            self.limits.max_streams_uni_local
        };
        if id.index() >= limit {
            return Err(err(TransportError::StreamLimitError));
        }

        let first_new = self.streams.opened(id.stream_type());
        let id = self
            .streams
            .notify_about_new_id(id.value())
            .ok_or(Error::InvalidStreamId(id.value()))?;
        self.register_peer_streams(id, first_new);
        Ok(id)
    }

    /// Create credit entries for peer streams `first_new..=id`.
    fn register_peer_streams(&mut self, id: StreamId, first_new: u64) {
        let unidirectional = id.is_unidirectional();
        for index in first_new..=id.index() {
            let Some(sid) = StreamId::from_parts(id.initiator(), unidirectional, index) else {
                continue;
            };
            self.recv_streams.entry(sid).or_insert_with(|| RecvStreamState {
                credit: FlowCredit::new(self.limits.max_stream_data_local),
                ..Default::default()
            });
            if !unidirectional {
                self.send_streams
                    .entry(sid)
                    .or_insert_with(|| FlowCredit::new(self.limits.max_stream_data_remote));
            }
        }
    }

    /// Charge a new highest offset on a stream against both credits.
    fn charge_recv(&mut self, id: StreamId, end: u64, fin: bool) -> Result<()> {
        let state = self
            .recv_streams
            .get_mut(&id)
            .ok_or(err(TransportError::StreamStateError))?;

        if let Some(final_size) = state.final_size {
            if end > final_size || (fin && end != final_size) {
                return Err(err(TransportError::FinalSizeError));
            }
        }
        if fin && end < state.highest_offset {
            return Err(err(TransportError::FinalSizeError));
        }

        let new_bytes = end.saturating_sub(state.highest_offset);
        if !state.credit.can_send(new_bytes) || !self.recv_credit.can_send(new_bytes) {
            debug!(stream_id = id.value(), end, "peer exceeded flow control credit");
            return Err(err(TransportError::FlowControlError));
        }
        state.credit.increment_transferred(new_bytes)?;
        self.recv_credit.increment_transferred(new_bytes)?;
        state.highest_offset = state.highest_offset.max(end);
        if fin {
            state.final_size = Some(end);
        }
        Ok(())
    }

    fn on_stream(&mut self, frame: &StreamFrame) -> Result<()> {
        let id = self.resolve_stream(frame.stream_id, true)?;
        self.charge_recv(id, frame.end_offset(), frame.fin)
    }

    /// Apply one received frame.
    ///
    /// An `Err` carries the transport error the connection must be closed
    /// with.
    pub fn apply_frame(&mut self, frame: &Frame) -> Result<()> {
        trace!(frame_type = frame.frame_type(), "applying frame");
        match frame {
            Frame::Padding(_) | Frame::Ping | Frame::Ack(_) | Frame::Crypto(_) => Ok(()),

            Frame::Stream(f) => self.on_stream(f),

            Frame::ResetStream(f) => {
                let id = self.resolve_stream(f.stream_id, true)?;
                self.charge_recv(id, f.final_size, true)?;
                if let Some(state) = self.recv_streams.get_mut(&id) {
                    state.reset_error = Some(f.error_code);
                }
                Ok(())
            }

            Frame::StopSending(f) => {
                let id = self.resolve_stream(f.stream_id, false)?;
                self.stopped_streams.insert(id, f.error_code);
                Ok(())
            }

            Frame::MaxData(max) => {
                self.send_credit.raise_limit_to(*max);
                Ok(())
            }

            Frame::MaxStreamData(f) => {
                let id = self.resolve_stream(f.stream_id, false)?;
                if let Some(credit) = self.send_streams.get_mut(&id) {
                    credit.raise_limit_to(f.maximum_stream_data);
                }
                Ok(())
            }

            Frame::MaxStreams(f) => {
                let slot = if f.bidirectional {
                    &mut self.peer_max_streams.0
                } else {
                    &mut self.peer_max_streams.1
                };
                *slot = (*slot).max(f.maximum_streams);
                Ok(())
            }

            Frame::DataBlocked(_) | Frame::StreamsBlocked(_) => Ok(()),

            Frame::StreamDataBlocked(f) => {
                self.resolve_stream(f.stream_id, true)?;
                Ok(())
            }

            Frame::NewToken(f) => {
                if self.side.is_server() {
                    return Err(err(TransportError::ProtocolViolation));
                }
                self.new_token = Some(f.token.clone());
                Ok(())
            }

            Frame::NewConnectionId(f) => self.cids.on_new_connection_id(f),

            Frame::RetireConnectionId(seq) => self.cids.on_retire_connection_id(*seq),

            Frame::PathChallenge(data) => {
                self.pending_path_response = Some(*data);
                Ok(())
            }

            Frame::PathResponse(_) => Ok(()),

            Frame::ConnectionClose(f) => {
                info!(
                    error_code = f.error_code,
                    application = f.application_close,
                    reason = %String::from_utf8_lossy(&f.reason),
                    "peer closed connection"
                );
                self.close = Some(f.clone());
                Ok(())
            }

            Frame::HandshakeDone => {
                if self.side.is_server() {
                    return Err(err(TransportError::ProtocolViolation));
                }
                self.handshake_done = true;
                Ok(())
            }
        }
    }

    /// Apply frames in order, stopping at the first error.
    pub fn apply_frames<'f>(&mut self, frames: impl IntoIterator<Item = &'f Frame>) -> Result<()> {
        frames.into_iter().try_for_each(|f| self.apply_frame(f))
    }
}

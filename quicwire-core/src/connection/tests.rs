//! # Connection Module Tests (RFC 9000 Section 2-5, 19)
//!
//! Frame effects on stream ids, flow control, connection ids and the
//! handshake/close flags.

#![cfg(test)]

use crate::connection::{ConnectionLimits, ConnectionState, SharedConnection};
use crate::error::{Error, TransportError};
use crate::frames::*;
use crate::types::{ConnectionId, Side, StreamId};
use bytes::Bytes;

fn state(side: Side) -> ConnectionState {
    ConnectionState::new(
        side,
        ConnectionId::from_slice(&[1; 8]).unwrap(),
        ConnectionLimits {
            max_data_local: 1000,
            max_stream_data_local: 400,
            max_streams_bidi_local: 4,
            max_streams_uni_local: 2,
            ..ConnectionLimits::default()
        },
    )
}

fn stream(id: u64, offset: u64, len: usize, fin: bool) -> Frame {
    Frame::Stream(StreamFrame {
        stream_id: StreamId::new(id).unwrap(),
        offset,
        data: Bytes::from(vec![0xab; len]),
        fin,
        has_offset: offset > 0,
        has_length: true,
    })
}

fn transport(code: TransportError) -> Result<(), Error> {
    Err(Error::Transport(code))
}

// ============================================================================
// Stream Tests (RFC 9000 Section 2, 4)
// ============================================================================

mod stream_tests {
    use super::*;

    #[test]
    fn test_peer_stream_opens_lower_ids() {
        let mut conn = state(Side::Server);
        conn.apply_frame(&stream(8, 0, 10, false)).unwrap();
        let ids: Vec<u64> = conn.streams().known_ids().map(StreamId::value).collect();
        assert_eq!(ids, vec![0, 4, 8]);
        assert!(conn.recv_stream(StreamId::new(4).unwrap()).is_some());
        assert_eq!(conn.recv_credit().transferred(), 10);
    }

    #[test]
    fn test_stream_limit_enforced() {
        let mut conn = state(Side::Server);
        // index 4 with max_streams_bidi_local = 4
        assert_eq!(
            conn.apply_frame(&stream(16, 0, 1, false)),
            transport(TransportError::StreamLimitError)
        );
        // index 2 with max_streams_uni_local = 2
        assert_eq!(
            conn.apply_frame(&stream(10, 0, 1, false)),
            transport(TransportError::StreamLimitError)
        );
    }

    #[test]
    fn test_unopened_local_stream_is_state_error() {
        let mut conn = state(Side::Server);
        assert_eq!(
            conn.apply_frame(&stream(1, 0, 1, false)),
            transport(TransportError::StreamStateError)
        );

        let id = conn.open_stream(false).unwrap();
        assert_eq!(id.value(), 1);
        conn.apply_frame(&stream(1, 0, 1, false)).unwrap();
    }

    #[test]
    fn test_data_on_local_unidirectional_stream() {
        let mut conn = state(Side::Client);
        let id = conn.open_stream(true).unwrap();
        assert_eq!(id.value(), 2);
        assert_eq!(
            conn.apply_frame(&stream(2, 0, 1, false)),
            transport(TransportError::StreamStateError)
        );
    }

    #[test]
    fn test_stop_sending_on_peer_unidirectional_stream() {
        let mut conn = state(Side::Server);
        let frame = Frame::StopSending(StopSendingFrame {
            stream_id: StreamId::new(2).unwrap(),
            error_code: 0,
        });
        assert_eq!(
            conn.apply_frame(&frame),
            transport(TransportError::StreamStateError)
        );
    }

    #[test]
    fn test_stop_sending_recorded() {
        let mut conn = state(Side::Server);
        let frame = Frame::StopSending(StopSendingFrame {
            stream_id: StreamId::new(0).unwrap(),
            error_code: 0x42,
        });
        conn.apply_frame(&frame).unwrap();
        assert_eq!(conn.stop_sending_error(StreamId::new(0).unwrap()), Some(0x42));
    }
}

// ============================================================================
// Flow Control Tests (RFC 9000 Section 4)
// ============================================================================

mod flow_control_tests {
    use super::*;

    #[test]
    fn test_stream_credit_exceeded() {
        let mut conn = state(Side::Server);
        conn.apply_frame(&stream(0, 0, 400, false)).unwrap();
        assert_eq!(
            conn.apply_frame(&stream(0, 400, 1, false)),
            transport(TransportError::FlowControlError)
        );
    }

    #[test]
    fn test_connection_credit_exceeded() {
        let mut conn = state(Side::Server);
        conn.apply_frame(&stream(0, 0, 400, false)).unwrap();
        conn.apply_frame(&stream(4, 0, 400, false)).unwrap();
        assert_eq!(
            conn.apply_frame(&stream(8, 0, 201, false)),
            transport(TransportError::FlowControlError)
        );
        assert_eq!(conn.recv_credit().transferred(), 800);
    }

    #[test]
    fn test_retransmission_not_charged_twice() {
        let mut conn = state(Side::Server);
        conn.apply_frame(&stream(0, 0, 100, false)).unwrap();
        conn.apply_frame(&stream(0, 0, 100, false)).unwrap();
        conn.apply_frame(&stream(0, 50, 100, false)).unwrap();
        assert_eq!(conn.recv_credit().transferred(), 150);
    }

    #[test]
    fn test_final_size_changes_rejected() {
        let mut conn = state(Side::Server);
        conn.apply_frame(&stream(0, 0, 10, true)).unwrap();
        assert_eq!(
            conn.apply_frame(&stream(0, 10, 1, false)),
            transport(TransportError::FinalSizeError)
        );
        let reset = Frame::ResetStream(ResetStreamFrame {
            stream_id: StreamId::new(0).unwrap(),
            error_code: 1,
            final_size: 12,
        });
        assert_eq!(
            conn.apply_frame(&reset),
            transport(TransportError::FinalSizeError)
        );
    }

    #[test]
    fn test_reset_stream_charges_final_size() {
        let mut conn = state(Side::Server);
        conn.apply_frame(&stream(0, 0, 10, false)).unwrap();
        let reset = Frame::ResetStream(ResetStreamFrame {
            stream_id: StreamId::new(0).unwrap(),
            error_code: 7,
            final_size: 50,
        });
        conn.apply_frame(&reset).unwrap();
        let recv = conn.recv_stream(StreamId::new(0).unwrap()).unwrap();
        assert_eq!(recv.final_size, Some(50));
        assert_eq!(recv.reset_error, Some(7));
        assert_eq!(conn.recv_credit().transferred(), 50);
    }

    #[test]
    fn test_max_data_only_raises() {
        let mut conn = state(Side::Client);
        let before = conn.send_credit().limit();
        conn.apply_frame(&Frame::MaxData(before + 10)).unwrap();
        conn.apply_frame(&Frame::MaxData(1)).unwrap();
        assert_eq!(conn.send_credit().limit(), before + 10);
    }

    #[test]
    fn test_send_side_accounting() {
        let mut conn = state(Side::Client);
        let id = conn.open_stream(false).unwrap();
        let limit = conn.send_stream(id).unwrap().limit();
        assert!(conn.can_send(id, limit));
        conn.record_sent(id, limit).unwrap();
        assert_eq!(
            conn.record_sent(id, 1),
            transport(TransportError::FlowControlError)
        );

        conn.apply_frame(&Frame::MaxStreamData(MaxStreamDataFrame {
            stream_id: id,
            maximum_stream_data: limit + 5,
        }))
        .unwrap();
        assert!(conn.can_send(id, 5));
    }

    #[test]
    fn test_max_streams_bounds_open_stream() {
        let mut conn = ConnectionState::new(
            Side::Client,
            ConnectionId::from_slice(&[1; 8]).unwrap(),
            ConnectionLimits {
                max_streams_uni_remote: 1,
                ..ConnectionLimits::default()
            },
        );
        conn.open_stream(true).unwrap();
        assert_eq!(
            conn.open_stream(true),
            Err(Error::Transport(TransportError::StreamLimitError))
        );
        conn.apply_frame(&Frame::MaxStreams(MaxStreamsFrame {
            maximum_streams: 2,
            bidirectional: false,
        }))
        .unwrap();
        assert_eq!(conn.open_stream(true).unwrap().value(), 6);
    }
}

// ============================================================================
// Handshake, Close and Path Tests
// ============================================================================

mod control_frame_tests {
    use super::*;

    #[test]
    fn test_handshake_done_direction() {
        let mut server = state(Side::Server);
        assert_eq!(
            server.apply_frame(&Frame::HandshakeDone),
            transport(TransportError::ProtocolViolation)
        );

        let mut client = state(Side::Client);
        client.apply_frame(&Frame::HandshakeDone).unwrap();
        assert!(client.is_handshake_done());
    }

    #[test]
    fn test_new_token_only_to_clients() {
        let frame = Frame::NewToken(NewTokenFrame {
            token: Bytes::from_static(b"tok"),
        });
        let mut server = state(Side::Server);
        assert_eq!(
            server.apply_frame(&frame),
            transport(TransportError::ProtocolViolation)
        );
        let mut client = state(Side::Client);
        client.apply_frame(&frame).unwrap();
        assert_eq!(client.new_token().map(|t| &t[..]), Some(&b"tok"[..]));
    }

    #[test]
    fn test_connection_close_recorded() {
        let mut conn = state(Side::Client);
        let close = ConnectionCloseFrame {
            error_code: 0x0a,
            frame_type: Some(0x08),
            reason: Bytes::from_static(b"bye"),
            application_close: false,
        };
        conn.apply_frame(&Frame::ConnectionClose(close.clone())).unwrap();
        assert!(conn.is_closed());
        assert_eq!(conn.close_reason(), Some(&close));
    }

    #[test]
    fn test_only_latest_path_challenge_kept() {
        let mut conn = state(Side::Server);
        for i in 0..1000u16 {
            let mut data = [0u8; 8];
            data[..2].copy_from_slice(&i.to_be_bytes());
            conn.apply_frame(&Frame::PathChallenge(data)).unwrap();
        }
        let mut latest = [0u8; 8];
        latest[..2].copy_from_slice(&999u16.to_be_bytes());
        assert_eq!(conn.take_path_response(), Some(latest));
        assert_eq!(conn.take_path_response(), None);
    }

    #[test]
    fn test_connection_id_frames_reach_registry() {
        let mut conn = state(Side::Client);
        let frame = NewConnectionIdFrame {
            retire_prior_to: 0,
            connection_id: ConnectionId::with_sequence(Bytes::from_static(&[5; 8]), 1).unwrap(),
            stateless_reset_token: [5; 16],
        };
        conn.apply_frame(&Frame::NewConnectionId(frame)).unwrap();
        assert_eq!(conn.connection_ids().peer_ids().count(), 1);

        assert_eq!(
            conn.apply_frame(&Frame::RetireConnectionId(4)),
            transport(TransportError::ProtocolViolation)
        );
        conn.apply_frame(&Frame::RetireConnectionId(0)).unwrap();
        assert_eq!(conn.connection_ids().local_ids().count(), 0);
    }
}

// ============================================================================
// Shared Handle Tests
// ============================================================================

mod shared_tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_concurrent_writers_serialize() {
        let shared = SharedConnection::new(state(Side::Server));
        let handles: Vec<_> = (0..4u64)
            .map(|i| {
                let shared = shared.clone();
                thread::spawn(move || {
                    shared
                        .apply_frames(&[stream(i * 4, 0, 100, false)])
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        shared.with(|conn| {
            assert_eq!(conn.recv_credit().transferred(), 400);
            assert_eq!(conn.streams().len(), 4);
        });
    }

    #[test]
    fn test_batch_stops_at_first_error() {
        let shared = SharedConnection::new(state(Side::Server));
        let result = shared.apply_frames(&[
            stream(0, 0, 10, false),
            Frame::HandshakeDone,
            stream(4, 0, 10, false),
        ]);
        assert_eq!(result, transport(TransportError::ProtocolViolation));
        shared.with(|conn| assert_eq!(conn.recv_credit().transferred(), 10));
    }
}

//! # Connection ID Lifecycle (RFC 9000 Section 5.1)
//!
//! Two independent sequences:
//! - **local**: ids this endpoint issued to the peer via NEW_CONNECTION_ID,
//!   retired when the peer sends RETIRE_CONNECTION_ID
//! - **peer**: ids the peer issued to us, retired when a NEW_CONNECTION_ID
//!   raises Retire Prior To
//!
//! Retirement is always explicit; nothing expires on its own.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{Error, Result, TransportError};
use crate::frames::NewConnectionIdFrame;
use crate::types::{ConnectionId, StatelessResetToken};

/// Default active_connection_id_limit (RFC 9000 Section 18.2).
pub const DEFAULT_ACTIVE_CID_LIMIT: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
struct IssuedId {
    connection_id: ConnectionId,
    reset_token: StatelessResetToken,
}

/// Connection ID Registry
#[derive(Debug, Clone)]
pub struct ConnectionIdRegistry {
    local: BTreeMap<u64, IssuedId>,
    next_local_sequence: u64,

    peer: BTreeMap<u64, IssuedId>,
    peer_retire_prior_to: u64,
    /// Peer sequence numbers we must send RETIRE_CONNECTION_ID for.
    pending_retirements: Vec<u64>,

    /// How many peer ids we are willing to store.
    active_limit: u64,
}

impl ConnectionIdRegistry {
    /// `initial_local` is the id chosen during the handshake (sequence 0).
    pub fn new(initial_local: ConnectionId, active_limit: u64) -> Self {
        let mut local = BTreeMap::new();
        local.insert(
            0,
            IssuedId {
                connection_id: initial_local,
                reset_token: [0; 16],
            },
        );
        Self {
            local,
            next_local_sequence: 1,
            peer: BTreeMap::new(),
            peer_retire_prior_to: 0,
            pending_retirements: Vec::new(),
            active_limit: active_limit.max(DEFAULT_ACTIVE_CID_LIMIT),
        }
    }

    /// Record the peer's handshake connection id as its sequence 0.
    pub fn set_initial_peer(&mut self, cid: ConnectionId) {
        self.peer.insert(
            0,
            IssuedId {
                connection_id: cid,
                reset_token: [0; 16],
            },
        );
    }

    /// Issue a new local id, producing the frame that announces it.
    pub fn issue(
        &mut self,
        cid: ConnectionId,
        reset_token: StatelessResetToken,
        retire_prior_to: u64,
    ) -> Result<NewConnectionIdFrame> {
        let sequence = self.next_local_sequence;
        if retire_prior_to > sequence {
            return Err(Error::Transport(TransportError::ProtocolViolation));
        }
        let connection_id = ConnectionId::with_sequence(cid.to_bytes(), sequence)
            .ok_or(Error::ConnectionIdTooLong(cid.len()))?;
        self.local.insert(
            sequence,
            IssuedId {
                connection_id: connection_id.clone(),
                reset_token,
            },
        );
        self.next_local_sequence += 1;
        Ok(NewConnectionIdFrame {
            retire_prior_to,
            connection_id,
            stateless_reset_token: reset_token,
        })
    }

    /// RETIRE_CONNECTION_ID from the peer.
    pub fn on_retire_connection_id(&mut self, sequence: u64) -> Result<()> {
        if sequence >= self.next_local_sequence {
            return Err(Error::Transport(TransportError::ProtocolViolation));
        }
        if self.local.remove(&sequence).is_some() {
            debug!(sequence, "peer retired local connection id");
        }
        Ok(())
    }

    /// NEW_CONNECTION_ID from the peer.
    pub fn on_new_connection_id(&mut self, frame: &NewConnectionIdFrame) -> Result<()> {
        let sequence = frame.sequence_number();
        if frame.retire_prior_to > sequence {
            return Err(Error::Transport(TransportError::FrameEncodingError));
        }

        let entry = IssuedId {
            connection_id: frame.connection_id.clone(),
            reset_token: frame.stateless_reset_token,
        };
        match self.peer.get(&sequence) {
            Some(existing) if *existing != entry => {
                return Err(Error::Transport(TransportError::ProtocolViolation));
            }
            Some(_) => return Ok(()),
            None => {}
        }

        if sequence < self.peer_retire_prior_to {
            // already retired, just confirm the retirement again
            self.pending_retirements.push(sequence);
            return Ok(());
        }

        // check the limit on the outcome before touching anything
        let retire_prior_to = self.peer_retire_prior_to.max(frame.retire_prior_to);
        let active_after = self.peer.range(retire_prior_to..).count() as u64 + 1;
        if active_after > self.active_limit {
            return Err(Error::Transport(TransportError::ConnectionIdLimitError));
        }

        self.peer.insert(sequence, entry);

        if frame.retire_prior_to > self.peer_retire_prior_to {
            self.peer_retire_prior_to = frame.retire_prior_to;
            let retired: Vec<u64> = self
                .peer
                .range(..frame.retire_prior_to)
                .map(|(seq, _)| *seq)
                .collect();
            for seq in retired {
                self.peer.remove(&seq);
                self.pending_retirements.push(seq);
            }
        }
        Ok(())
    }

    /// Sequence numbers awaiting a RETIRE_CONNECTION_ID, oldest first.
    pub fn take_pending_retirements(&mut self) -> Vec<u64> {
        core::mem::take(&mut self.pending_retirements)
    }

    pub fn local_ids(&self) -> impl Iterator<Item = &ConnectionId> {
        self.local.values().map(|e| &e.connection_id)
    }

    pub fn peer_ids(&self) -> impl Iterator<Item = &ConnectionId> {
        self.peer.values().map(|e| &e.connection_id)
    }

    /// Peer id with the highest sequence number, the one to send with.
    pub fn current_peer_id(&self) -> Option<&ConnectionId> {
        self.peer.values().next_back().map(|e| &e.connection_id)
    }

    /// Reset token the peer registered for `cid`.
    pub fn peer_reset_token(&self, cid: &ConnectionId) -> Option<StatelessResetToken> {
        self.peer
            .values()
            .find(|e| e.connection_id == *cid)
            .map(|e| e.reset_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn cid(b: u8) -> ConnectionId {
        ConnectionId::from_slice(&[b; 8]).unwrap()
    }

    fn new_cid(seq: u64, retire_prior_to: u64) -> NewConnectionIdFrame {
        NewConnectionIdFrame {
            retire_prior_to,
            connection_id: ConnectionId::with_sequence(Bytes::from(vec![seq as u8 + 0x10; 8]), seq)
                .unwrap(),
            stateless_reset_token: [seq as u8; 16],
        }
    }

    #[test]
    fn test_issue_assigns_sequence_numbers() {
        let mut reg = ConnectionIdRegistry::new(cid(1), 4);
        let f1 = reg.issue(cid(2), [2; 16], 0).unwrap();
        let f2 = reg.issue(cid(3), [3; 16], 1).unwrap();
        assert_eq!(f1.sequence_number(), 1);
        assert_eq!(f2.sequence_number(), 2);
        assert_eq!(reg.local_ids().count(), 3);

        reg.on_retire_connection_id(0).unwrap();
        assert_eq!(reg.local_ids().count(), 2);
        assert_eq!(
            reg.on_retire_connection_id(3),
            Err(Error::Transport(TransportError::ProtocolViolation))
        );
    }

    #[test]
    fn test_retire_prior_to_retires_peer_ids() {
        let mut reg = ConnectionIdRegistry::new(cid(1), 4);
        reg.set_initial_peer(cid(9));
        reg.on_new_connection_id(&new_cid(1, 0)).unwrap();
        reg.on_new_connection_id(&new_cid(2, 2)).unwrap();

        assert_eq!(reg.take_pending_retirements(), vec![0, 1]);
        assert_eq!(reg.peer_ids().count(), 1);
        assert_eq!(reg.current_peer_id().map(ConnectionId::sequence), Some(2));
        assert!(reg.take_pending_retirements().is_empty());
    }

    #[test]
    fn test_duplicate_sequence_must_match() {
        let mut reg = ConnectionIdRegistry::new(cid(1), 4);
        let frame = new_cid(1, 0);
        reg.on_new_connection_id(&frame).unwrap();
        reg.on_new_connection_id(&frame).unwrap();

        let mut conflicting = frame.clone();
        conflicting.stateless_reset_token = [0xff; 16];
        assert_eq!(
            reg.on_new_connection_id(&conflicting),
            Err(Error::Transport(TransportError::ProtocolViolation))
        );
    }

    #[test]
    fn test_active_limit() {
        let mut reg = ConnectionIdRegistry::new(cid(1), 2);
        reg.set_initial_peer(cid(9));
        reg.on_new_connection_id(&new_cid(1, 0)).unwrap();
        assert_eq!(
            reg.on_new_connection_id(&new_cid(2, 0)),
            Err(Error::Transport(TransportError::ConnectionIdLimitError))
        );
        // a rejected frame leaves the registry as it was
        assert_eq!(reg.peer_ids().count(), 2);
        assert_eq!(reg.current_peer_id().map(ConnectionId::sequence), Some(1));
        assert!(reg.take_pending_retirements().is_empty());

        // retiring older ids makes room
        reg.on_new_connection_id(&new_cid(2, 1)).unwrap();
        assert_eq!(reg.take_pending_retirements(), vec![0]);
        assert_eq!(reg.peer_ids().count(), 2);
    }

    #[test]
    fn test_reset_token_lookup() {
        let mut reg = ConnectionIdRegistry::new(cid(1), 4);
        let frame = new_cid(1, 0);
        reg.on_new_connection_id(&frame).unwrap();
        assert_eq!(reg.peer_reset_token(&frame.connection_id), Some([1; 16]));
        assert_eq!(reg.peer_reset_token(&cid(7)), None);
    }
}

//! # Stream ID Allocation (RFC 9000 Section 2.1)
//!
//! Stream ids of one (initiator, directionality) class are opened in
//! increasing order. When a frame names id N of a peer class, every lower
//! id of that class is implicitly opened too, even if the frames naming
//! them arrive later.
//!
//! ```text
//! id = index << 2 | uni << 1 | initiator
//! ```

#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use tracing::trace;

use crate::error::{Error, Result};
use crate::types::{Side, StreamId, StreamType};

/// Known stream ids plus the next unused index of each class.
///
/// Not synchronized; owned by one connection.
#[derive(Debug, Clone)]
pub struct StreamIdContext {
    side: Side,
    next_index: [u64; 4],
    known: BTreeSet<StreamId>,
}

impl StreamIdContext {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            next_index: [0; 4],
            known: BTreeSet::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Open the next local stream of the requested directionality.
    pub fn create_new_id(&mut self, unidirectional: bool) -> Result<StreamId> {
        let first_of_class = StreamId::from_parts(self.side, unidirectional, 0)
            .ok_or(Error::InvalidStreamId(0))?;
        let slot = &mut self.next_index[first_of_class.stream_type().index()];
        let id = StreamId::from_parts(self.side, unidirectional, *slot)
            .ok_or(Error::InvalidStreamId(*slot))?;
        *slot += 1;
        self.known.insert(id);
        trace!(stream_id = id.value(), "opened local stream");
        Ok(id)
    }

    /// Register a stream id the peer referenced.
    ///
    /// Returns `None` for ids out of range or belonging to a local class.
    /// Every lower id of the same class that was not yet known is recorded
    /// as well.
    pub fn notify_about_new_id(&mut self, raw: u64) -> Option<StreamId> {
        let id = StreamId::new(raw)?;
        if id.initiator() == self.side {
            return None;
        }

        let class = id.stream_type().index();
        let start = self.next_index[class];
        if id.index() >= start {
            let unidirectional = id.is_unidirectional();
            for index in start..=id.index() {
                if let Some(gap) = StreamId::from_parts(id.initiator(), unidirectional, index) {
                    self.known.insert(gap);
                }
            }
            self.next_index[class] = id.index() + 1;
            trace!(
                stream_id = id.value(),
                opened = id.index() + 1 - start,
                "peer opened streams"
            );
        }
        Some(id)
    }

    pub fn contains(&self, id: StreamId) -> bool {
        self.known.contains(&id)
    }

    /// Number of streams opened so far in `class`.
    pub fn opened(&self, class: StreamType) -> u64 {
        self.next_index[class.index()]
    }

    /// All known ids in ascending order.
    pub fn known_ids(&self) -> impl Iterator<Item = StreamId> + '_ {
        self.known.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(ctx: &StreamIdContext) -> Vec<u64> {
        ctx.known_ids().map(StreamId::value).collect()
    }

    #[test]
    fn test_gap_fill_same_class() {
        let mut ctx = StreamIdContext::new(Side::Client);
        let id = ctx.notify_about_new_id(0b001011).unwrap();
        assert_eq!(id.value(), 11);
        assert_eq!(ids(&ctx), vec![0b000011, 0b000111, 0b001011]);
        assert_eq!(ctx.opened(StreamType::ServerUnidirectional), 3);
        assert_eq!(ctx.opened(StreamType::ServerBidirectional), 0);
    }

    #[test]
    fn test_lower_id_after_gap_fill_is_known() {
        let mut ctx = StreamIdContext::new(Side::Client);
        ctx.notify_about_new_id(13).unwrap();
        assert_eq!(ctx.notify_about_new_id(5).map(StreamId::value), Some(5));
        assert_eq!(ids(&ctx), vec![1, 5, 9, 13]);
    }

    #[test]
    fn test_peer_cannot_use_local_class() {
        let mut ctx = StreamIdContext::new(Side::Server);
        assert_eq!(ctx.notify_about_new_id(1), None);
        assert_eq!(ctx.notify_about_new_id(3), None);
        assert!(ctx.notify_about_new_id(0).is_some());
        assert_eq!(ctx.notify_about_new_id(1 << 62), None);
    }

    #[test]
    fn test_create_new_id_counts_per_class() {
        let mut ctx = StreamIdContext::new(Side::Server);
        assert_eq!(ctx.create_new_id(false).unwrap().value(), 1);
        assert_eq!(ctx.create_new_id(false).unwrap().value(), 5);
        assert_eq!(ctx.create_new_id(true).unwrap().value(), 3);
        assert_eq!(ctx.create_new_id(true).unwrap().value(), 7);
        assert_eq!(ctx.len(), 4);
        assert!(ctx.contains(StreamId::new(5).unwrap()));
    }

    #[test]
    fn test_classes_are_independent() {
        let mut ctx = StreamIdContext::new(Side::Server);
        ctx.notify_about_new_id(8).unwrap();
        ctx.notify_about_new_id(2).unwrap();
        assert_eq!(ids(&ctx), vec![0, 2, 4, 8]);
        assert_eq!(ctx.create_new_id(false).unwrap().value(), 1);
    }
}

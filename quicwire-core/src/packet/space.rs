//! # Packet Number Space State (RFC 9000 Section 12.3)
//!
//! Each space (Initial, Handshake, ApplicationData) keeps an independent
//! packet number sequence. The decoder only reads the largest number
//! received in a space; the caller records a packet once it has been
//! accepted, so decoding the same bytes twice gives the same result.

#![forbid(unsafe_code)]

use crate::types::{PacketNumber, PacketNumberSpace};

/// Largest received packet number per space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketNumberSpaces {
    largest: [Option<PacketNumber>; 3],
}

impl PacketNumberSpaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Largest packet number received in `space`, `None` before the first.
    pub fn largest(&self, space: PacketNumberSpace) -> Option<PacketNumber> {
        self.largest[space.index()]
    }

    /// Record an accepted packet. Returns true if it raised the largest.
    pub fn on_packet_received(&mut self, space: PacketNumberSpace, pn: PacketNumber) -> bool {
        let slot = &mut self.largest[space.index()];
        match slot {
            Some(largest) if *largest >= pn => false,
            _ => {
                *slot = Some(pn);
                true
            }
        }
    }

    /// Forget a space, e.g. after its keys are discarded.
    pub fn reset(&mut self, space: PacketNumberSpace) {
        self.largest[space.index()] = None;
    }
}

//! # Packet Number Encoding/Decoding (RFC 9000 Section 17.1)
//!
//! Packet numbers use **truncated encoding** to minimize overhead. Instead of sending
//! the full 62-bit value, QUIC encodes only the least significant bits needed to
//! disambiguate the packet number from recently received packets.
//!
//! ## Encoding Algorithm (RFC 9000 Section A.2)
//!
//! ```text
//! The sender picks the smallest of 1-4 bytes whose range is more than
//! twice the number of packets in flight (full_pn - largest_acked).
//! ```
//!
//! ## Decoding Algorithm (RFC 9000 Section A.3)
//!
//! ```text
//! expected  = largest + 1
//! window    = 1 << bits
//! candidate = (expected & !(window - 1)) | truncated
//! if candidate <= expected - window/2 and candidate < 2^62 - window:
//!     candidate + window
//! elif candidate > expected + window/2 and candidate >= window:
//!     candidate - window
//! ```

#![forbid(unsafe_code)]

use crate::types::{PacketNumber, MAX_PACKET_NUMBER};

/// Number of bytes (1-4) to send `full_pn` with.
///
/// `largest_acked` is `None` before the peer has acknowledged anything in
/// this space, in which case the whole number counts as in flight.
pub fn encode_length(full_pn: PacketNumber, largest_acked: Option<PacketNumber>) -> usize {
    let num_unacked = match largest_acked {
        Some(acked) => full_pn.saturating_sub(acked),
        None => full_pn.saturating_add(1),
    };

    // range must exceed twice the gap: one extra bit
    let min_bits = (64 - num_unacked.leading_zeros()) as usize + 1;

    match min_bits {
        0..=8 => 1,
        9..=16 => 2,
        17..=24 => 3,
        _ => 4,
    }
}

/// Low `len` bytes of `full_pn`.
pub fn truncate(full_pn: PacketNumber, len: usize) -> u64 {
    let bits = (len.clamp(1, 4) * 8) as u32;
    full_pn & ((1u64 << bits) - 1)
}

/// Reconstruct a full packet number (RFC 9000 Appendix A.3)
///
/// `largest` is the largest packet number received so far in this space,
/// `None` if nothing was received yet (expected = 0). `bits` is 8, 16, 24
/// or 32.
pub fn decode_packet_number(truncated: u64, largest: Option<PacketNumber>, bits: u32) -> PacketNumber {
    let expected = largest.map_or(0, |pn| pn.saturating_add(1));
    let window = 1u64 << bits;
    let half = window / 2;
    let mask = window - 1;

    let candidate = (expected & !mask) | (truncated & mask);

    if candidate.saturating_add(half) <= expected && candidate < (MAX_PACKET_NUMBER + 1) - window {
        candidate + window
    } else if candidate > expected.saturating_add(half) && candidate >= window {
        candidate - window
    } else {
        candidate
    }
}

//! # Header Protection Application (RFC 9001 Section 5.4)
//!
//! ```text
//! mask = header_protection(hp_key, sample)
//! pn_length = (packet[0] & 0x03) + 1
//! if (packet[0] & 0x80) == 0x80:
//!    packet[0] ^= mask[0] & 0x0f      # Long header: 4 bits masked
//! else:
//!    packet[0] ^= mask[0] & 0x1f      # Short header: 5 bits masked
//! packet[pn_offset:pn_offset+pn_length] ^= mask[1:1+pn_length]
//! ```
//!
//! The sample always starts four bytes after the start of the packet
//! number field, whatever the true packet number length is.

#![forbid(unsafe_code)]

use super::header::{HEADER_FORM_BIT, LONG_PROTECTED_BITS, PACKET_NUMBER_LENGTH_MASK, SHORT_PROTECTED_BITS};
use crate::crypto::{HeaderProtector, SAMPLE_LEN};
use crate::error::{Error, Result};

/// Offset of the sample relative to the packet number field.
pub const SAMPLE_OFFSET: usize = 4;

/// Copy the 16-byte sample out of `packet`.
///
/// `packet_end` bounds the current packet inside a coalesced datagram.
pub fn sample(packet: &[u8], pn_offset: usize, packet_end: usize) -> Result<[u8; SAMPLE_LEN]> {
    let start = pn_offset + SAMPLE_OFFSET;
    let end = start + SAMPLE_LEN;
    if end > packet_end || end > packet.len() {
        return Err(Error::SampleOutOfBounds);
    }
    let mut out = [0u8; SAMPLE_LEN];
    out.copy_from_slice(&packet[start..end]);
    Ok(out)
}

fn protected_bits(first: u8) -> u8 {
    if first & HEADER_FORM_BIT != 0 {
        LONG_PROTECTED_BITS
    } else {
        SHORT_PROTECTED_BITS
    }
}

/// Unmask the first byte; the result reveals the packet number length.
pub fn unmask_first_byte(first: u8, mask: &[u8; 16]) -> u8 {
    first ^ (mask[0] & protected_bits(first))
}

/// Unmask `pn_len` packet number bytes into a truncated packet number.
pub fn unmask_packet_number(protected: &[u8], mask: &[u8; 16]) -> u64 {
    protected
        .iter()
        .zip(&mask[1..])
        .fold(0u64, |acc, (b, m)| (acc << 8) | (b ^ m) as u64)
}

/// Packet number length (1-4) encoded in an unprotected first byte.
pub fn packet_number_len(unprotected_first: u8) -> usize {
    (unprotected_first & PACKET_NUMBER_LENGTH_MASK) as usize + 1
}

/// Protect a fully assembled packet in place.
///
/// `packet[0]` must still be unprotected so the packet number length can
/// be read from it; the payload after the packet number is the sample
/// source.
pub fn apply_header_protection(
    packet: &mut [u8],
    pn_offset: usize,
    hp: &dyn HeaderProtector,
) -> Result<()> {
    let first = *packet.first().ok_or(Error::BufferTooShort)?;
    let pn_len = packet_number_len(first);
    let sample = sample(packet, pn_offset, packet.len())?;
    let mask = hp.mask(&sample);

    packet[0] = first ^ (mask[0] & protected_bits(first));
    for (i, byte) in packet[pn_offset..pn_offset + pn_len].iter_mut().enumerate() {
        *byte ^= mask[1 + i];
    }
    Ok(())
}

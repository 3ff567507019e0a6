//! # Variable-Length Integer Encoding (RFC 9000 Section 16)
//!
//! The two most significant bits of the first byte carry the base-2
//! logarithm of the encoded length:
//!
//! ```text
//! +------+--------+-------------+-----------------------+
//! | 2MSB | Length | Usable Bits | Range                 |
//! +------+--------+-------------+-----------------------+
//! | 00   | 1      | 6           | 0-63                  |
//! | 01   | 2      | 14          | 0-16383               |
//! | 10   | 4      | 30          | 0-1073741823          |
//! | 11   | 8      | 62          | 0-4611686018427387903 |
//! +------+--------+-------------+-----------------------+
//! ```
//!
//! The codec works on `bytes::Buf` / `bytes::BufMut` so the same code serves
//! the datagram reader and every encoder. Shortage of input or output space
//! is reported as `None` and never consumes or writes anything.

#![forbid(unsafe_code)]

use bytes::{Buf, BufMut};
use core::fmt;

/// Maximum value for VarInt (2^62 - 1)
pub const VARINT_MAX: u64 = (1u64 << 62) - 1;

/// A non-negative integer in `[0, 2^62 - 1]` together with its minimal
/// encoded length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarInt(u64);

impl VarInt {
    pub const MAX: VarInt = VarInt(VARINT_MAX);
    pub const ZERO: VarInt = VarInt(0);

    /// Returns `None` if `value` exceeds 2^62 - 1.
    pub fn new(value: u64) -> Option<Self> {
        if value > VARINT_MAX {
            return None;
        }
        Some(Self(value))
    }

    /// Infallible constructor for values known to fit in 32 bits.
    pub const fn from_u32(value: u32) -> Self {
        Self(value as u64)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }

    /// Minimal encoded length in bytes: 1, 2, 4 or 8.
    pub fn encoded_len(self) -> usize {
        // always Some: the constructor bounds the value
        VarIntCodec::length_for(self.0).unwrap_or(8) as usize
    }

    pub fn encode<B: BufMut>(self, buf: &mut B) -> Option<u8> {
        VarIntCodec::encode(self.0, buf)
    }

    pub fn decode<B: Buf>(buf: &mut B) -> Option<Self> {
        VarIntCodec::decode(buf).map(Self)
    }
}

impl From<u8> for VarInt {
    fn from(v: u8) -> Self {
        Self(v as u64)
    }
}

impl From<u16> for VarInt {
    fn from(v: u16) -> Self {
        Self(v as u64)
    }
}

impl From<u32> for VarInt {
    fn from(v: u32) -> Self {
        Self(v as u64)
    }
}

impl TryFrom<u64> for VarInt {
    type Error = crate::error::Error;

    fn try_from(v: u64) -> Result<Self, Self::Error> {
        Self::new(v).ok_or(crate::error::Error::VarIntOutOfRange(v))
    }
}

impl From<VarInt> for u64 {
    fn from(v: VarInt) -> u64 {
        v.0
    }
}

impl fmt::Display for VarInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// VarInt encoding and decoding utilities
pub struct VarIntCodec;

impl VarIntCodec {
    /// Minimal encoded length for `value`, `None` if out of range.
    pub fn length_for(value: u64) -> Option<u8> {
        match value {
            0..=0x3f => Some(1),
            0x40..=0x3fff => Some(2),
            0x4000..=0x3fff_ffff => Some(4),
            0x4000_0000..=VARINT_MAX => Some(8),
            _ => None,
        }
    }

    /// Encoded size for a value already known to be in range.
    pub fn size(value: u64) -> usize {
        Self::length_for(value).unwrap_or(8) as usize
    }

    /// Encoded length implied by a first byte.
    pub fn length_from_first_byte(first: u8) -> usize {
        1 << (first >> 6)
    }

    /// Write the minimal big-endian form of `value`.
    ///
    /// Returns the number of bytes written, or `None` (nothing written) if
    /// the value is out of range or `buf` lacks capacity.
    pub fn encode<B: BufMut>(value: u64, buf: &mut B) -> Option<u8> {
        let len = Self::length_for(value)?;
        if buf.remaining_mut() < len as usize {
            return None;
        }

        match len {
            1 => buf.put_u8(value as u8),
            2 => buf.put_u16(0x4000 | value as u16),
            4 => buf.put_u32(0x8000_0000 | value as u32),
            _ => buf.put_u64(0xc000_0000_0000_0000 | value),
        }
        Some(len)
    }

    /// Read one VarInt and advance past it.
    ///
    /// Fails without consuming anything if the buffer is shorter than the
    /// length announced by the first byte.
    pub fn decode<B: Buf>(buf: &mut B) -> Option<u64> {
        if !buf.has_remaining() {
            return None;
        }

        let first = buf.chunk()[0];
        let len = Self::length_from_first_byte(first);
        if buf.remaining() < len {
            return None;
        }

        let value = match len {
            1 => buf.get_u8() as u64,
            2 => (buf.get_u16() & 0x3fff) as u64,
            4 => (buf.get_u32() & 0x3fff_ffff) as u64,
            _ => buf.get_u64() & VARINT_MAX,
        };
        Some(value)
    }

    /// Decode from a slice, returning `(value, bytes_consumed)`.
    pub fn decode_slice(mut slice: &[u8]) -> Option<(u64, usize)> {
        let before = slice.len();
        let value = Self::decode(&mut slice)?;
        Some((value, before - slice.len()))
    }
}

//! Datagram read cursor.
//!
//! A [`Reader`] owns a cheap clone of the datagram (`Bytes`) and an absolute
//! position into it. Sub-readers created with [`Reader::take`] share the
//! same backing buffer and keep absolute positions, so every error can be
//! reported as an offset into the original datagram.

#![forbid(unsafe_code)]

use crate::varint::VarIntCodec;
use bytes::{Buf, Bytes};

#[derive(Debug, Clone)]
pub struct Reader {
    data: Bytes,
    pos: usize,
}

impl Reader {
    pub fn new(data: Bytes) -> Self {
        Self { data, pos: 0 }
    }

    /// Absolute offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The full buffer this reader walks, independent of position.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        let b = self.peek_u8()?;
        self.pos += 1;
        Some(b)
    }

    pub fn read_u32(&mut self) -> Option<u32> {
        if self.remaining() < 4 {
            return None;
        }
        Some(self.get_u32())
    }

    /// Big-endian unsigned integer of `len` bytes (1..=8).
    pub fn read_uint(&mut self, len: usize) -> Option<u64> {
        if len == 0 || len > 8 || self.remaining() < len {
            return None;
        }
        Some(self.get_uint(len))
    }

    pub fn read_varint(&mut self) -> Option<u64> {
        VarIntCodec::decode(self)
    }

    /// Zero-copy slice of the next `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Option<Bytes> {
        if self.remaining() < len {
            return None;
        }
        Some(self.copy_to_bytes(len))
    }

    pub fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        if self.remaining() < N {
            return None;
        }
        let mut out = [0u8; N];
        self.copy_to_slice(&mut out);
        Some(out)
    }

    /// Split off a reader over the next `len` bytes and skip them here.
    pub fn take(&mut self, len: usize) -> Option<Reader> {
        if self.remaining() < len {
            return None;
        }
        let sub = Reader {
            data: self.data.slice(..self.pos + len),
            pos: self.pos,
        };
        self.pos += len;
        Some(sub)
    }

    /// Everything from `start` up to the current position.
    pub fn consumed_since(&self, start: usize) -> Bytes {
        self.data.slice(start.min(self.pos)..self.pos)
    }

    /// Remaining unread bytes as one slice, leaving the cursor at the end.
    pub fn read_rest(&mut self) -> Bytes {
        let rest = self.data.slice(self.pos..);
        self.pos = self.data.len();
        rest
    }
}

impl Buf for Reader {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn chunk(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    fn advance(&mut self, cnt: usize) {
        assert!(cnt <= self.remaining(), "advance past end of datagram");
        self.pos += cnt;
    }

    fn copy_to_bytes(&mut self, len: usize) -> Bytes {
        assert!(len <= self.remaining(), "copy_to_bytes past end of datagram");
        let out = self.data.slice(self.pos..self.pos + len);
        self.pos += len;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_are_absolute() {
        let mut rd = Reader::new(Bytes::from_static(&[1, 2, 3, 4, 5, 6]));
        assert_eq!(rd.read_u8(), Some(1));
        let mut sub = Reader::take(&mut rd, 3).unwrap();
        assert_eq!(rd.position(), 4);
        assert_eq!(sub.position(), 1);
        assert_eq!(sub.remaining(), 3);
        assert_eq!(sub.read_bytes(2).unwrap(), Bytes::from_static(&[2, 3]));
        assert_eq!(sub.position(), 3);
        assert_eq!(sub.read_bytes(2), None);
        assert_eq!(rd.read_rest(), Bytes::from_static(&[5, 6]));
    }

    #[test]
    fn test_short_reads_do_not_move() {
        let mut rd = Reader::new(Bytes::from_static(&[0xff, 0x00]));
        assert_eq!(rd.read_u32(), None);
        assert_eq!(rd.read_uint(3), None);
        assert_eq!(rd.read_varint(), None);
        assert_eq!(rd.position(), 0);
        assert_eq!(rd.read_uint(2), Some(0xff00));
    }
}

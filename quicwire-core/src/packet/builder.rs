//! # Packet Assembly
//!
//! Serializes frames into a protected packet: header, truncated packet
//! number, payload, padding, then header protection over the result.
//! Payload AEAD is not applied here, the payload stays plaintext.

#![forbid(unsafe_code)]

use bytes::{BufMut, Bytes, BytesMut};

use super::header::*;
use super::number::{encode_length, truncate};
use super::protection::{apply_header_protection, SAMPLE_OFFSET};
use crate::crypto::{HeaderProtector, SAMPLE_LEN};
use crate::error::{Error, Result};
use crate::frames::Frame;
use crate::types::{ConnectionId, PacketNumber};
use crate::varint::VarIntCodec;
use crate::version::{Version, VERSION_NEGOTIATION};

#[derive(Debug, Clone)]
enum Form {
    Long {
        type_bits: u8,
        version: Version,
        scid: ConnectionId,
        token: Option<Bytes>,
    },
    Short {
        spin: bool,
        key_phase: bool,
    },
}

/// Builder for Initial, 0-RTT, Handshake and 1-RTT packets.
#[derive(Debug, Clone)]
pub struct PacketBuilder {
    form: Form,
    dcid: ConnectionId,
    packet_number: PacketNumber,
    largest_acked: Option<PacketNumber>,
    frames: Vec<Frame>,
    pad_to: Option<usize>,
}

fn put_varint(buf: &mut BytesMut, value: u64) -> Result<()> {
    VarIntCodec::encode(value, buf)
        .map(|_| ())
        .ok_or(Error::VarIntOutOfRange(value))
}

impl PacketBuilder {
    fn long(type_bits: u8, version: Version, dcid: ConnectionId, scid: ConnectionId) -> Self {
        Self {
            form: Form::Long {
                type_bits,
                version,
                scid,
                token: None,
            },
            dcid,
            packet_number: 0,
            largest_acked: None,
            frames: Vec::new(),
            pad_to: None,
        }
    }

    pub fn initial(version: Version, dcid: ConnectionId, scid: ConnectionId, token: Bytes) -> Self {
        let mut builder = Self::long(LONG_PACKET_TYPE_INITIAL, version, dcid, scid);
        if let Form::Long { token: t, .. } = &mut builder.form {
            *t = Some(token);
        }
        builder
    }

    pub fn zero_rtt(version: Version, dcid: ConnectionId, scid: ConnectionId) -> Self {
        Self::long(LONG_PACKET_TYPE_0RTT, version, dcid, scid)
    }

    pub fn handshake(version: Version, dcid: ConnectionId, scid: ConnectionId) -> Self {
        Self::long(LONG_PACKET_TYPE_HANDSHAKE, version, dcid, scid)
    }

    pub fn short(dcid: ConnectionId) -> Self {
        Self {
            form: Form::Short {
                spin: false,
                key_phase: false,
            },
            dcid,
            packet_number: 0,
            largest_acked: None,
            frames: Vec::new(),
            pad_to: None,
        }
    }

    /// Full packet number plus the largest number the peer acknowledged,
    /// which decides the encoded length.
    pub fn packet_number(mut self, pn: PacketNumber, largest_acked: Option<PacketNumber>) -> Self {
        self.packet_number = pn;
        self.largest_acked = largest_acked;
        self
    }

    pub fn frame(mut self, frame: Frame) -> Self {
        self.frames.push(frame);
        self
    }

    pub fn frames(mut self, frames: impl IntoIterator<Item = Frame>) -> Self {
        self.frames.extend(frames);
        self
    }

    /// Pad with PADDING frames until the packet is at least `len` bytes.
    pub fn pad_to(mut self, len: usize) -> Self {
        self.pad_to = Some(len);
        self
    }

    pub fn spin(mut self, spin: bool) -> Self {
        if let Form::Short { spin: s, .. } = &mut self.form {
            *s = spin;
        }
        self
    }

    pub fn key_phase(mut self, key_phase: bool) -> Self {
        if let Form::Short { key_phase: k, .. } = &mut self.form {
            *k = key_phase;
        }
        self
    }

    pub fn packet_type(&self) -> PacketType {
        match &self.form {
            Form::Long { type_bits, .. } => PacketType::from_long_first_byte(*type_bits),
            Form::Short { .. } => PacketType::OneRtt,
        }
    }

    /// Header bytes before the Length field (long) or packet number (short).
    fn prefix_len(&self) -> usize {
        match &self.form {
            Form::Long { scid, token, .. } => {
                let token = token
                    .as_ref()
                    .map(|t| VarIntCodec::size(t.len() as u64) + t.len())
                    .unwrap_or(0);
                1 + 4 + 1 + self.dcid.len() + 1 + scid.len() + token
            }
            Form::Short { .. } => 1 + self.dcid.len(),
        }
    }

    /// Serialize and protect the packet.
    pub fn build(&self, hp: &dyn HeaderProtector) -> Result<Bytes> {
        let pn_len = encode_length(self.packet_number, self.largest_acked);
        let truncated = truncate(self.packet_number, pn_len);

        let mut payload = BytesMut::new();
        for frame in &self.frames {
            frame.encode(&mut payload)?;
        }

        // the sample must fit behind a packet number of any length
        let min_payload = (SAMPLE_OFFSET + SAMPLE_LEN).saturating_sub(pn_len);
        let mut padding = min_payload.saturating_sub(payload.len());

        let is_long = matches!(self.form, Form::Long { .. });
        let total_len = |padding: usize| {
            let length = (pn_len + payload.len() + padding) as u64;
            let length_field = if is_long { VarIntCodec::size(length) } else { 0 };
            self.prefix_len() + length_field + length as usize
        };
        if let Some(target) = self.pad_to {
            // a longer Length field may push the total past the target
            while total_len(padding) < target {
                padding += target - total_len(padding);
            }
        }

        let length = (pn_len + payload.len() + padding) as u64;
        let mut buf = BytesMut::with_capacity(total_len(padding));
        let pn_bits = (pn_len - 1) as u8;

        match &self.form {
            Form::Long {
                type_bits,
                version,
                scid,
                token,
            } => {
                buf.put_u8(HEADER_FORM_BIT | FIXED_BIT | type_bits | pn_bits);
                buf.put_u32(version.to_wire());
                buf.put_u8(self.dcid.len() as u8);
                buf.put_slice(self.dcid.as_bytes());
                buf.put_u8(scid.len() as u8);
                buf.put_slice(scid.as_bytes());
                if let Some(token) = token {
                    put_varint(&mut buf, token.len() as u64)?;
                    buf.put_slice(token);
                }
                put_varint(&mut buf, length)?;
            }
            Form::Short { spin, key_phase } => {
                let mut first = FIXED_BIT | pn_bits;
                if *spin {
                    first |= SPIN_BIT;
                }
                if *key_phase {
                    first |= KEY_PHASE_BIT;
                }
                buf.put_u8(first);
                buf.put_slice(self.dcid.as_bytes());
            }
        }

        let pn_offset = buf.len();
        buf.put_uint(truncated, pn_len);
        buf.put_slice(&payload);
        buf.put_bytes(0x00, padding);

        apply_header_protection(&mut buf, pn_offset, hp)?;
        Ok(buf.freeze())
    }

    /// Serialize a Version Negotiation packet (never protected).
    pub fn build_version_negotiation(
        dcid: &ConnectionId,
        scid: &ConnectionId,
        versions: &[u32],
    ) -> Bytes {
        let mut buf = BytesMut::with_capacity(7 + dcid.len() + scid.len() + 4 * versions.len());
        buf.put_u8(HEADER_FORM_BIT | FIXED_BIT);
        buf.put_u32(VERSION_NEGOTIATION);
        buf.put_u8(dcid.len() as u8);
        buf.put_slice(dcid.as_bytes());
        buf.put_u8(scid.len() as u8);
        buf.put_slice(scid.as_bytes());
        for version in versions {
            buf.put_u32(*version);
        }
        buf.freeze()
    }

    /// Serialize a Retry packet with a precomputed integrity tag.
    pub fn build_retry(
        version: Version,
        dcid: &ConnectionId,
        scid: &ConnectionId,
        token: &[u8],
        integrity_tag: &[u8; RETRY_INTEGRITY_TAG_LEN],
    ) -> Bytes {
        let mut buf = BytesMut::with_capacity(7 + dcid.len() + scid.len() + token.len() + 16);
        buf.put_u8(HEADER_FORM_BIT | FIXED_BIT | LONG_PACKET_TYPE_RETRY);
        buf.put_u32(version.to_wire());
        buf.put_u8(dcid.len() as u8);
        buf.put_slice(dcid.as_bytes());
        buf.put_u8(scid.len() as u8);
        buf.put_slice(scid.as_bytes());
        buf.put_slice(token);
        buf.put_slice(integrity_tag);
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Aes128HeaderProtection;
    use crate::frames::CryptoFrame;
    use crate::types::MIN_INITIAL_PACKET_SIZE;

    fn hp() -> Aes128HeaderProtection {
        Aes128HeaderProtection::new(&[3u8; 16]).unwrap()
    }

    fn cid(b: u8) -> ConnectionId {
        ConnectionId::from_slice(&[b; 8]).unwrap()
    }

    #[test]
    fn test_initial_padded_to_minimum_size() {
        let packet = PacketBuilder::initial(Version::V1, cid(1), cid(2), Bytes::new())
            .frame(Frame::Crypto(CryptoFrame {
                offset: 0,
                data: Bytes::from_static(&[0x16; 300]),
            }))
            .pad_to(MIN_INITIAL_PACKET_SIZE)
            .build(&hp())
            .unwrap();
        assert_eq!(packet.len(), MIN_INITIAL_PACKET_SIZE);
        assert_eq!(packet[0] & 0xf0, 0xc0);
        assert_eq!(&packet[1..5], &[0, 0, 0, 1]);
    }

    #[test]
    fn test_short_payload_padded_for_sample() {
        let packet = PacketBuilder::short(cid(1))
            .frame(Frame::Ping)
            .build(&hp())
            .unwrap();
        // first byte + dcid + 1-byte pn + 19 bytes of payload
        assert_eq!(packet.len(), 1 + 8 + 1 + 19);
        assert_eq!(packet[0] & 0xc0, 0x40);
    }

    #[test]
    fn test_spin_bit_is_not_protected() {
        let packet = PacketBuilder::short(cid(1))
            .spin(true)
            .frame(Frame::Ping)
            .build(&hp())
            .unwrap();
        assert_eq!(packet[0] & SPIN_BIT, SPIN_BIT);
    }

    #[test]
    fn test_version_negotiation_layout() {
        let packet = PacketBuilder::build_version_negotiation(&cid(1), &cid(2), &[1]);
        assert_eq!(packet.len(), 7 + 16 + 4);
        assert_eq!(&packet[1..5], &[0, 0, 0, 0]);
        assert_eq!(&packet[packet.len() - 4..], &[0, 0, 0, 1]);
    }
}

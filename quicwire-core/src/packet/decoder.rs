//! # Datagram Decoder (RFC 9000 Section 12.2, 17)
//!
//! Splits one UDP datagram into its coalesced packets, removes header
//! protection, reconstructs packet numbers and decodes each payload into
//! frames.
//!
//! ```text
//! +-----------+-----------+-----------+
//! | Initial   | Handshake | 1-RTT     |   one datagram
//! +-----------+-----------+-----------+
//!   Length ---^  Length --^  (rest of datagram)
//! ```
//!
//! Failure handling per datagram:
//! - missing keys: [`DatagramOutcome::KeysUnavailable`], the caller may
//!   retry the whole datagram later
//! - clear fixed bit, or a DCID differing from the first packet's: every
//!   packet is discarded
//! - any other failure: packets decoded before the failing one are kept,
//!   the rest of the datagram is abandoned

#![forbid(unsafe_code)]

use bytes::{Buf, Bytes};
use tracing::{debug, trace, warn};

use super::context::{KeyLookup, ParseContext};
use super::header::*;
use super::number::decode_packet_number;
use super::protection::{packet_number_len, sample, unmask_first_byte, unmask_packet_number};
use super::types::*;
use crate::crypto::EncryptionLevel;
use crate::error::{Error, ParseError};
use crate::frames::{decode_frames, Frame};
use crate::reader::Reader;
use crate::types::{ConnectionId, PacketNumber, MAX_CID_LENGTH};
use crate::version::{negotiate, Version, VERSION_NEGOTIATION};

type PacketResult<T> = core::result::Result<T, ParseError>;

/// Result of decoding one datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatagramOutcome {
    /// Every byte was consumed by valid packets.
    Complete(Vec<Packet>),
    /// Keys for packet `error.packet_index` are not installed yet.
    KeysUnavailable {
        parsed: Vec<Packet>,
        error: ParseError,
    },
    /// Decoding stopped at `error`; `parsed` holds the packets kept.
    Dropped {
        parsed: Vec<Packet>,
        error: ParseError,
    },
}

impl DatagramOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, DatagramOutcome::Complete(_))
    }

    pub fn packets(&self) -> &[Packet] {
        match self {
            DatagramOutcome::Complete(p)
            | DatagramOutcome::KeysUnavailable { parsed: p, .. }
            | DatagramOutcome::Dropped { parsed: p, .. } => p,
        }
    }

    pub fn into_packets(self) -> Vec<Packet> {
        match self {
            DatagramOutcome::Complete(p)
            | DatagramOutcome::KeysUnavailable { parsed: p, .. }
            | DatagramOutcome::Dropped { parsed: p, .. } => p,
        }
    }

    pub fn error(&self) -> Option<&ParseError> {
        match self {
            DatagramOutcome::Complete(_) => None,
            DatagramOutcome::KeysUnavailable { error, .. }
            | DatagramOutcome::Dropped { error, .. } => Some(error),
        }
    }
}

/// Errors after which no packet of the datagram may be delivered.
fn discards_datagram(error: &Error) -> bool {
    matches!(error, Error::FixedBitNotSet | Error::ConnectionIdMismatch)
}

/// Decode every packet coalesced in `data`.
///
/// Decoding is pure: `ctx` is only read, so the same bytes and the same
/// context always give the same outcome.
pub fn decode_datagram<C: ParseContext + ?Sized>(data: Bytes, ctx: &C) -> DatagramOutcome {
    let mut rd = Reader::new(data);
    let mut packets: Vec<Packet> = Vec::new();

    while rd.has_remaining() {
        let index = packets.len();
        let first_dcid = packets.first().map(Packet::dcid);

        match decode_packet(&mut rd, index, first_dcid, ctx) {
            Ok(packet) => {
                trace!(
                    packet_index = index,
                    packet_type = ?packet.packet_type(),
                    packet_number = ?packet.packet_number(),
                    length = packet.packet_length(),
                    frames = packet.frames().len(),
                    "decoded packet"
                );
                packets.push(packet);
            }
            Err(error) if error.error.is_keys_unavailable() => {
                debug!(%error, "header protection keys not yet available");
                return DatagramOutcome::KeysUnavailable {
                    parsed: packets,
                    error,
                };
            }
            Err(error) if discards_datagram(&error.error) => {
                warn!(%error, discarded = packets.len(), "discarding whole datagram");
                return DatagramOutcome::Dropped {
                    parsed: Vec::new(),
                    error,
                };
            }
            Err(error) => {
                debug!(%error, kept = packets.len(), "dropping rest of datagram");
                return DatagramOutcome::Dropped {
                    parsed: packets,
                    error,
                };
            }
        }
    }

    DatagramOutcome::Complete(packets)
}

/// Decode one packet at the reader's position.
///
/// On success the reader sits at the start of the next coalesced packet.
pub fn decode_packet<C: ParseContext + ?Sized>(
    rd: &mut Reader,
    index: usize,
    first_dcid: Option<&ConnectionId>,
    ctx: &C,
) -> PacketResult<Packet> {
    let start = rd.position();
    let fail = |offset: usize, error: Error| ParseError::new(index, offset, error);

    if rd.remaining() < 2 {
        return Err(fail(start, Error::BufferTooShort));
    }
    let first = rd.read_u8().ok_or_else(|| fail(start, Error::BufferTooShort))?;
    if first & FIXED_BIT == 0 {
        return Err(fail(start, Error::FixedBitNotSet));
    }

    if first & HEADER_FORM_BIT != 0 {
        decode_long(rd, index, start, first, first_dcid, ctx)
    } else {
        decode_short(rd, index, start, first, first_dcid, ctx)
    }
}

fn read_cid(rd: &mut Reader, index: usize) -> PacketResult<ConnectionId> {
    let offset = rd.position();
    let len = rd
        .read_u8()
        .ok_or(ParseError::new(index, offset, Error::BufferTooShort))? as usize;
    if len > MAX_CID_LENGTH {
        return Err(ParseError::new(index, offset, Error::ConnectionIdTooLong(len)));
    }
    let bytes = rd
        .read_bytes(len)
        .ok_or(ParseError::new(index, offset + 1, Error::BufferTooShort))?;
    ConnectionId::new(bytes).ok_or(ParseError::new(index, offset, Error::ConnectionIdTooLong(len)))
}

fn check_coalesced_dcid(
    dcid: &ConnectionId,
    first_dcid: Option<&ConnectionId>,
    index: usize,
    offset: usize,
) -> PacketResult<()> {
    match first_dcid {
        Some(first) if first != dcid => Err(ParseError::new(
            index,
            offset,
            Error::ConnectionIdMismatch,
        )),
        _ => Ok(()),
    }
}

fn decode_long<C: ParseContext + ?Sized>(
    rd: &mut Reader,
    index: usize,
    start: usize,
    first: u8,
    first_dcid: Option<&ConnectionId>,
    ctx: &C,
) -> PacketResult<Packet> {
    let fail = |offset: usize, error: Error| ParseError::new(index, offset, error);

    let version_offset = rd.position();
    let raw_version = rd
        .read_u32()
        .ok_or_else(|| fail(version_offset, Error::BufferTooShort))?;

    // RFC 8999: CID length limits belong to the version
    let version = if raw_version == VERSION_NEGOTIATION {
        None
    } else {
        Some(negotiate(raw_version, ctx.supported_versions()).map_err(|e| fail(version_offset, e))?)
    };

    let dcid_offset = rd.position();
    let dcid = read_cid(rd, index)?;
    check_coalesced_dcid(&dcid, first_dcid, index, dcid_offset)?;
    let scid = read_cid(rd, index)?;

    let Some(version) = version else {
        let list_offset = rd.position();
        let list = rd.read_rest();
        if list.is_empty() || list.len() % 4 != 0 {
            return Err(fail(list_offset, Error::InvalidVersionList));
        }
        let versions = list
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        return Ok(Packet::VersionNegotiation(VersionNegotiationPacket {
            dcid,
            scid,
            versions,
        }));
    };

    let header = LongHeader {
        version,
        dcid,
        scid,
    };

    let packet_type = PacketType::from_long_first_byte(first);
    let level = match packet_type {
        PacketType::Initial => EncryptionLevel::Initial,
        PacketType::ZeroRtt => EncryptionLevel::ZeroRtt,
        PacketType::Handshake => EncryptionLevel::Handshake,
        _ => return decode_retry(rd, index, header),
    };

    let token = if packet_type == PacketType::Initial {
        let token_offset = rd.position();
        let len = rd
            .read_varint()
            .ok_or_else(|| fail(token_offset, Error::BufferTooShort))?;
        if len > rd.remaining() as u64 {
            return Err(fail(token_offset, Error::BufferTooShort));
        }
        Some(
            rd.read_bytes(len as usize)
                .ok_or_else(|| fail(token_offset, Error::BufferTooShort))?,
        )
    } else {
        None
    };

    let length_offset = rd.position();
    let length = rd
        .read_varint()
        .ok_or_else(|| fail(length_offset, Error::BufferTooShort))?;
    let length_len = rd.position() - length_offset;
    if length > rd.remaining() as u64 {
        return Err(fail(
            length_offset,
            Error::PacketLengthExceeded {
                declared: length,
                available: rd.remaining(),
            },
        ));
    }

    let body = rd
        .take(length as usize)
        .ok_or_else(|| fail(length_offset, Error::BufferTooShort))?;

    let unprotected = remove_header_protection(
        &body,
        index,
        start,
        first,
        LONG_RESERVED_BITS,
        &header.dcid,
        level,
        Some(version),
        ctx,
    )?;
    let payload = decode_payload(body, index, &header.dcid, level, packet_type, &unprotected, ctx)?;

    let packet = LongPacket {
        header,
        token,
        packet_number: payload.packet_number,
        packet_number_len: unprotected.pn_len,
        length,
        length_len,
        frames: payload.frames,
        frame_wire_lengths: payload.frame_wire_lengths,
    };
    Ok(match packet_type {
        PacketType::Initial => Packet::Initial(packet),
        PacketType::ZeroRtt => Packet::ZeroRtt(packet),
        _ => Packet::Handshake(packet),
    })
}

fn decode_retry(rd: &mut Reader, index: usize, header: LongHeader) -> PacketResult<Packet> {
    let offset = rd.position();
    if rd.remaining() < RETRY_INTEGRITY_TAG_LEN {
        return Err(ParseError::new(index, offset, Error::BufferTooShort));
    }
    let token_len = rd.remaining() - RETRY_INTEGRITY_TAG_LEN;
    let token = rd
        .read_bytes(token_len)
        .ok_or(ParseError::new(index, offset, Error::BufferTooShort))?;
    let integrity_tag = rd
        .read_array::<RETRY_INTEGRITY_TAG_LEN>()
        .ok_or(ParseError::new(index, offset, Error::BufferTooShort))?;
    Ok(Packet::Retry(RetryPacket {
        header,
        token,
        integrity_tag,
    }))
}

fn decode_short<C: ParseContext + ?Sized>(
    rd: &mut Reader,
    index: usize,
    start: usize,
    first: u8,
    first_dcid: Option<&ConnectionId>,
    ctx: &C,
) -> PacketResult<Packet> {
    let fail = |offset: usize, error: Error| ParseError::new(index, offset, error);

    let dcid_offset = rd.position();
    let dcid_len = ctx
        .short_header_dcid_len()
        .ok_or_else(|| fail(dcid_offset, Error::UnknownConnectionIdLength))?;
    let dcid = rd
        .read_bytes(dcid_len)
        .and_then(ConnectionId::new)
        .ok_or_else(|| fail(dcid_offset, Error::BufferTooShort))?;
    check_coalesced_dcid(&dcid, first_dcid, index, dcid_offset)?;

    let rest = rd.remaining();
    let body = rd
        .take(rest)
        .ok_or_else(|| fail(rd.position(), Error::BufferTooShort))?;
    let level = EncryptionLevel::OneRtt;
    let unprotected = remove_header_protection(
        &body,
        index,
        start,
        first,
        SHORT_RESERVED_BITS,
        &dcid,
        level,
        None,
        ctx,
    )?;
    let payload = decode_payload(body, index, &dcid, level, PacketType::OneRtt, &unprotected, ctx)?;

    Ok(Packet::Short(ShortPacket {
        dcid,
        spin: unprotected.first & SPIN_BIT != 0,
        key_phase: unprotected.first & KEY_PHASE_BIT != 0,
        packet_number: payload.packet_number,
        packet_number_len: unprotected.pn_len,
        payload_len: payload.payload_len,
        frames: payload.frames,
        frame_wire_lengths: payload.frame_wire_lengths,
    }))
}

/// Header fields revealed by removing protection.
struct Unprotected {
    first: u8,
    pn_len: usize,
    truncated: u64,
}

/// Unmask the first byte and the packet number of the packet whose
/// packet number starts at `body`'s position and ends with `body`.
#[allow(clippy::too_many_arguments)]
fn remove_header_protection<C: ParseContext + ?Sized>(
    body: &Reader,
    index: usize,
    start: usize,
    first: u8,
    reserved_bits: u8,
    dcid: &ConnectionId,
    level: EncryptionLevel,
    version: Option<Version>,
    ctx: &C,
) -> PacketResult<Unprotected> {
    let hp = match ctx.header_protection(dcid, level, version) {
        KeyLookup::Ready(hp) => hp,
        KeyLookup::NotYetAvailable => {
            return Err(ParseError::new(index, start, Error::KeysUnavailable(level)));
        }
    };

    let pn_offset = body.position();
    let data = body.data();
    let sample = sample(data, pn_offset, data.len())
        .map_err(|e| ParseError::new(index, pn_offset, e))?;
    let mask = hp.mask(&sample);

    let first = unmask_first_byte(first, &mask);
    let pn_len = packet_number_len(first);
    let truncated = unmask_packet_number(&data[pn_offset..pn_offset + pn_len], &mask);

    if first & reserved_bits != 0 {
        return Err(ParseError::new(index, start, Error::ReservedBitsSet));
    }

    Ok(Unprotected {
        first,
        pn_len,
        truncated,
    })
}

/// Everything decoded after the header.
struct DecodedPayload {
    packet_number: PacketNumber,
    frames: Vec<Frame>,
    frame_wire_lengths: Vec<usize>,
    payload_len: usize,
}

/// Reconstruct the packet number and decode the frames after it.
fn decode_payload<C: ParseContext + ?Sized>(
    mut body: Reader,
    index: usize,
    dcid: &ConnectionId,
    level: EncryptionLevel,
    packet_type: PacketType,
    unprotected: &Unprotected,
    ctx: &C,
) -> PacketResult<DecodedPayload> {
    let largest = ctx.largest_packet_number(dcid, level.packet_number_space());
    let packet_number =
        decode_packet_number(unprotected.truncated, largest, (unprotected.pn_len * 8) as u32);

    body.advance(unprotected.pn_len);
    let payload_offset = body.position();
    let mut payload = ctx
        .open_payload(dcid, level, packet_number, body)
        .map_err(|e| ParseError::new(index, payload_offset, e))?;
    let payload_len = payload.remaining();
    let (frames, frame_wire_lengths) = decode_frames(&mut payload, index, packet_type)?;
    Ok(DecodedPayload {
        packet_number,
        frames,
        frame_wire_lengths,
        payload_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Aes128HeaderProtection, HeaderProtector};
    use crate::packet::builder::PacketBuilder;
    use crate::packet::context::EndpointContext;
    use crate::frames::CryptoFrame;
    use crate::types::{PacketNumberSpace, Side};
    use std::sync::Arc;

    fn cid(b: u8, len: usize) -> ConnectionId {
        ConnectionId::from_slice(&vec![b; len]).unwrap()
    }

    fn hp() -> Arc<dyn HeaderProtector> {
        Arc::new(Aes128HeaderProtection::new(&[7u8; 16]).unwrap())
    }

    fn client_ctx() -> EndpointContext {
        let mut ctx = EndpointContext::new(Side::Client, 4, vec![Version::V1]);
        for level in [
            EncryptionLevel::Initial,
            EncryptionLevel::Handshake,
            EncryptionLevel::OneRtt,
        ] {
            ctx.install_header_protection(cid(1, 4), level, hp());
        }
        ctx
    }

    fn crypto(data: &'static [u8]) -> Frame {
        Frame::Crypto(CryptoFrame {
            offset: 0,
            data: Bytes::from_static(data),
        })
    }

    fn initial(pn: u64) -> Vec<u8> {
        PacketBuilder::initial(Version::V1, cid(1, 4), cid(2, 8), Bytes::new())
            .packet_number(pn, None)
            .frame(crypto(b"server hello"))
            .build(hp().as_ref())
            .unwrap()
            .to_vec()
    }

    fn handshake(dcid: ConnectionId, pn: u64) -> Vec<u8> {
        PacketBuilder::handshake(Version::V1, dcid, cid(2, 8))
            .packet_number(pn, None)
            .frame(crypto(b"encrypted extensions"))
            .build(hp().as_ref())
            .unwrap()
            .to_vec()
    }

    mod coalescing_tests {
        use super::*;

        #[test]
        fn test_coalesced_packets_decode_in_order() {
            let mut datagram = initial(0);
            datagram.extend(handshake(cid(1, 4), 0));
            datagram.extend(
                PacketBuilder::short(cid(1, 4))
                    .packet_number(3, None)
                    .frame(Frame::Ping)
                    .build(hp().as_ref())
                    .unwrap(),
            );

            let outcome = decode_datagram(Bytes::from(datagram.clone()), &client_ctx());
            let packets = match outcome {
                DatagramOutcome::Complete(p) => p,
                other => panic!("unexpected {other:?}"),
            };
            assert_eq!(packets.len(), 3);
            assert_eq!(packets[0].packet_type(), PacketType::Initial);
            assert_eq!(packets[1].packet_type(), PacketType::Handshake);
            assert_eq!(packets[2].packet_type(), PacketType::OneRtt);
            assert_eq!(packets[2].packet_number(), Some(3));
            let total: usize = packets.iter().map(Packet::packet_length).sum();
            assert_eq!(total, datagram.len());
            assert!(packets.iter().all(Packet::is_deep_valid));
        }

        #[test]
        fn test_dcid_mismatch_discards_everything() {
            let mut datagram = initial(0);
            datagram.extend(handshake(cid(9, 4), 0));

            let mut ctx = client_ctx();
            ctx.install_header_protection(cid(9, 4), EncryptionLevel::Handshake, hp());
            let outcome = decode_datagram(Bytes::from(datagram), &ctx);
            match outcome {
                DatagramOutcome::Dropped { parsed, error } => {
                    assert!(parsed.is_empty());
                    assert_eq!(error.packet_index, 1);
                    assert_eq!(error.error, Error::ConnectionIdMismatch);
                }
                other => panic!("unexpected {other:?}"),
            }
        }

        #[test]
        fn test_trailing_garbage_keeps_prefix() {
            let mut datagram = initial(0);
            let first_len = datagram.len();
            // fixed bit set, long header, unknown version
            datagram.extend([0xc0, 0x0a, 0x0a, 0x0a, 0x0a, 0, 0]);
            let outcome = decode_datagram(Bytes::from(datagram), &client_ctx());
            match outcome {
                DatagramOutcome::Dropped { parsed, error } => {
                    assert_eq!(parsed.len(), 1);
                    assert_eq!(error.offset, first_len + 1);
                    assert_eq!(error.error, Error::UnsupportedVersion(0x0a0a_0a0a));
                }
                other => panic!("unexpected {other:?}"),
            }
        }

        #[test]
        fn test_fixed_bit_clear_discards_everything() {
            let mut datagram = initial(0);
            datagram.extend([0x00; 24]);
            let outcome = decode_datagram(Bytes::from(datagram), &client_ctx());
            assert!(outcome.packets().is_empty());
            assert_eq!(outcome.error().unwrap().error, Error::FixedBitNotSet);
        }
    }

    mod key_availability_tests {
        use super::*;

        #[test]
        fn test_missing_handshake_keys_defers() {
            let mut datagram = initial(0);
            datagram.extend(handshake(cid(1, 4), 0));

            let mut ctx = client_ctx();
            ctx.discard_keys(&cid(1, 4), EncryptionLevel::Handshake);
            match decode_datagram(Bytes::from(datagram), &ctx) {
                DatagramOutcome::KeysUnavailable { parsed, error } => {
                    assert_eq!(parsed.len(), 1);
                    assert_eq!(error.error, Error::KeysUnavailable(EncryptionLevel::Handshake));
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    mod header_tests {
        use super::*;

        fn first_error(datagram: Vec<u8>) -> ParseError {
            decode_datagram(Bytes::from(datagram), &client_ctx())
                .error()
                .cloned()
                .unwrap()
        }

        #[test]
        fn test_unknown_version_before_cid_bounds() {
            // RFC 8999: a 21-byte DCID is legal in some other version
            let mut datagram = vec![0xc0, 0x0a, 0x0a, 0x0a, 0x0a, 21];
            datagram.extend([0x11; 21]);
            datagram.extend([0x00; 24]);
            let error = first_error(datagram);
            assert_eq!(error.error, Error::UnsupportedVersion(0x0a0a_0a0a));
            assert_eq!(error.offset, 1);
        }

        #[test]
        fn test_truncated_unknown_version_header() {
            let error = first_error(vec![0xc0, 0x0a, 0x0a, 0x0a, 0x0a, 0x08, 0x01, 0x02]);
            assert_eq!(error.error, Error::UnsupportedVersion(0x0a0a_0a0a));
        }

        #[test]
        fn test_oversized_cid_in_supported_version() {
            let mut datagram = vec![0xc0, 0x00, 0x00, 0x00, 0x01, 21];
            datagram.extend([0x11; 21]);
            datagram.extend([0x00; 24]);
            let error = first_error(datagram);
            assert_eq!(error.error, Error::ConnectionIdTooLong(21));
            assert_eq!(error.offset, 5);
        }

        #[test]
        fn test_packet_number_uses_largest_received() {
            let mut ctx = client_ctx();
            ctx.record_packet(&cid(1, 4), PacketNumberSpace::Initial, 0x1_0000);
            let datagram = PacketBuilder::initial(Version::V1, cid(1, 4), cid(2, 8), Bytes::new())
                .packet_number(0x1_0001, Some(0x1_0000))
                .frame(Frame::Ping)
                .build(hp().as_ref())
                .unwrap();
            let packets = decode_datagram(datagram, &ctx).into_packets();
            assert_eq!(packets[0].packet_number(), Some(0x1_0001));
            assert_eq!(packets[0].packet_number_len(), Some(1));
        }

        #[test]
        fn test_length_beyond_datagram() {
            let mut datagram = initial(0);
            datagram.truncate(datagram.len() - 1);
            let outcome = decode_datagram(Bytes::from(datagram), &client_ctx());
            assert!(matches!(
                outcome.error().map(|e| &e.error),
                Some(Error::PacketLengthExceeded { .. })
            ));
        }

        #[test]
        fn test_connection_id_too_long() {
            let mut datagram = vec![0xc0, 0, 0, 0, 1, 21];
            datagram.extend([0u8; 40]);
            let outcome = decode_datagram(Bytes::from(datagram), &client_ctx());
            let error = outcome.error().unwrap();
            assert_eq!(error.offset, 5);
            assert_eq!(error.error, Error::ConnectionIdTooLong(21));
        }

        #[test]
        fn test_single_byte_datagram() {
            let outcome = decode_datagram(Bytes::from_static(&[0x40]), &client_ctx());
            assert_eq!(outcome.error().unwrap().error, Error::BufferTooShort);
        }

        #[test]
        fn test_version_negotiation() {
            let datagram = PacketBuilder::build_version_negotiation(
                &cid(1, 4),
                &cid(2, 8),
                &[Version::V1.to_wire(), 0x1a2a_3a4a],
            );
            let packets = decode_datagram(datagram, &client_ctx()).into_packets();
            match &packets[..] {
                [Packet::VersionNegotiation(vn)] => {
                    assert_eq!(vn.versions, vec![1, 0x1a2a_3a4a]);
                    assert_eq!(vn.scid, cid(2, 8));
                }
                other => panic!("unexpected {other:?}"),
            }
        }

        #[test]
        fn test_retry() {
            let datagram = PacketBuilder::build_retry(
                Version::V1,
                &cid(1, 4),
                &cid(2, 8),
                b"retry token",
                &[0xee; 16],
            );
            let packets = decode_datagram(datagram.clone(), &client_ctx()).into_packets();
            match &packets[..] {
                [p @ Packet::Retry(retry)] => {
                    assert_eq!(&retry.token[..], b"retry token");
                    assert_eq!(retry.integrity_tag, [0xee; 16]);
                    assert_eq!(p.packet_length(), datagram.len());
                }
                other => panic!("unexpected {other:?}"),
            }
        }

        #[test]
        fn test_decoding_is_idempotent() {
            let datagram = Bytes::from(initial(5));
            let ctx = client_ctx();
            assert_eq!(
                decode_datagram(datagram.clone(), &ctx),
                decode_datagram(datagram, &ctx)
            );
        }
    }
}

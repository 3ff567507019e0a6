//! End-to-end datagram decoding with real Initial header protection:
//! a client flight is built with keys derived from its DCID and decoded by
//! a server context that derives the same keys on its own.

use bytes::{Bytes, BytesMut};
use quicwire_core::crypto::{EncryptionLevel, HeaderProtector, InitialKeySchedule, InitialKeys};
use quicwire_core::error::Error;
use quicwire_core::frames::{CryptoFrame, Frame, StreamFrame};
use quicwire_core::packet::protection::apply_header_protection;
use quicwire_core::packet::{
    decode_datagram, ContextUpdate, DatagramOutcome, EndpointContext, Packet, PacketBuilder,
    PacketType,
};
use quicwire_core::types::{ConnectionId, PacketNumberSpace, Side, StreamId, MIN_INITIAL_PACKET_SIZE};
use quicwire_core::version::Version;
use std::sync::Arc;

fn client_dcid() -> ConnectionId {
    ConnectionId::from_slice(&hex::decode("8394c8f03e515708").unwrap()).unwrap()
}

fn client_scid() -> ConnectionId {
    ConnectionId::from_slice(&[0xc1; 5]).unwrap()
}

fn keys(version: Version) -> InitialKeys {
    InitialKeySchedule::new(version).initialize(&client_dcid()).unwrap()
}

fn client_hello() -> Frame {
    Frame::Crypto(CryptoFrame {
        offset: 0,
        data: Bytes::from(vec![0x01; 245]),
    })
}

fn client_initial(version: Version, pn: u64) -> Bytes {
    let keys = keys(version);
    PacketBuilder::initial(version, client_dcid(), client_scid(), Bytes::new())
        .packet_number(pn, None)
        .frame(client_hello())
        .pad_to(MIN_INITIAL_PACKET_SIZE)
        .build(keys.client.header_protection().as_ref())
        .unwrap()
}

fn zero_rtt_hp() -> Arc<dyn HeaderProtector> {
    // any installed key works, the 0-RTT secret comes from the handshake
    keys(Version::V1).client.next_generation().unwrap().header_protection()
}

fn zero_rtt(pn: u64) -> Bytes {
    PacketBuilder::zero_rtt(Version::V1, client_dcid(), client_scid())
        .packet_number(pn, None)
        .frame(Frame::Stream(StreamFrame {
            stream_id: StreamId::new(0).unwrap(),
            offset: 0,
            data: Bytes::from_static(b"GET /index.html\r\n"),
            fin: true,
            has_offset: false,
            has_length: true,
        }))
        .build(zero_rtt_hp().as_ref())
        .unwrap()
}

fn server() -> EndpointContext {
    EndpointContext::new(Side::Server, 8, Version::ALL.to_vec())
}

fn concat(parts: &[&Bytes]) -> Bytes {
    let mut out = BytesMut::new();
    for p in parts {
        out.extend_from_slice(p);
    }
    out.freeze()
}

#[test]
fn test_server_decodes_client_initial_for_every_version() {
    for version in Version::ALL {
        let datagram = client_initial(version, 0);
        assert_eq!(datagram.len(), MIN_INITIAL_PACKET_SIZE);

        let outcome = decode_datagram(datagram.clone(), &server());
        let DatagramOutcome::Complete(packets) = outcome else {
            panic!("{version:?}: {outcome:?}");
        };
        let [Packet::Initial(initial)] = &packets[..] else {
            panic!("{version:?}: {packets:?}");
        };
        assert_eq!(initial.header.version, version);
        assert_eq!(initial.header.dcid, client_dcid());
        assert_eq!(initial.header.scid, client_scid());
        assert_eq!(initial.packet_number, 0);
        assert_eq!(initial.frames[0], client_hello());
        assert_eq!(packets[0].packet_length(), datagram.len());
        assert!(packets[0].is_deep_valid());
    }
}

#[test]
fn test_declared_length_matches_frames() {
    let packets = decode_datagram(client_initial(Version::V1, 7), &server()).into_packets();
    let Packet::Initial(initial) = &packets[0] else {
        panic!("expected an Initial packet");
    };
    let frame_bytes: usize = initial.frame_wire_lengths.iter().sum();
    assert_eq!(initial.length, (initial.packet_number_len + frame_bytes) as u64);
}

#[test]
fn test_non_minimal_crypto_offset_keeps_length_accounting() {
    // CRYPTO offset 0 on two bytes, then 20 bytes of padding
    let mut payload = vec![0x06, 0x40, 0x00, 0x01, 0xaa];
    payload.extend([0x00; 20]);

    let mut packet = vec![0xc0, 0x00, 0x00, 0x00, 0x01];
    packet.push(8);
    packet.extend_from_slice(client_dcid().as_bytes());
    packet.push(5);
    packet.extend_from_slice(client_scid().as_bytes());
    packet.push(0x00); // token length
    packet.push(1 + payload.len() as u8); // Length
    let pn_offset = packet.len();
    packet.push(0x00);
    packet.extend_from_slice(&payload);
    let hp = keys(Version::V1).client.header_protection();
    apply_header_protection(&mut packet, pn_offset, hp.as_ref()).unwrap();

    let outcome = decode_datagram(Bytes::from(packet), &server());
    assert!(outcome.is_complete(), "{outcome:?}");
    let packet = &outcome.packets()[0];
    assert_eq!(packet.frame_wire_lengths(), &[5, 20]);
    assert_eq!(packet.frames()[0].frame_length(), 4);
    let Packet::Initial(initial) = packet else {
        panic!("expected an Initial packet");
    };
    assert_eq!(initial.length, 26);
    assert!(packet.is_deep_valid());
}

#[test]
fn test_zero_rtt_waits_for_keys() {
    let initial = client_initial(Version::V1, 0);
    let datagram = concat(&[&initial, &zero_rtt(0)]);
    let mut ctx = server();

    let outcome = decode_datagram(datagram.clone(), &ctx);
    let DatagramOutcome::KeysUnavailable { parsed, error } = outcome else {
        panic!("expected deferral, got {outcome:?}");
    };
    assert_eq!(parsed.len(), 1);
    assert_eq!(error.packet_index, 1);
    assert_eq!(error.offset, initial.len());
    assert_eq!(error.error, Error::KeysUnavailable(EncryptionLevel::ZeroRtt));

    ctx.apply(ContextUpdate::InstallHeaderProtection {
        dcid: client_dcid(),
        level: EncryptionLevel::ZeroRtt,
        hp: zero_rtt_hp(),
    });
    let packets = decode_datagram(datagram, &ctx).into_packets();
    assert_eq!(packets.len(), 2);
    assert_eq!(packets[1].packet_type(), PacketType::ZeroRtt);
    assert!(packets[1].is_ack_eliciting());
}

#[test]
fn test_mismatched_dcid_drops_valid_first_packet() {
    let other = PacketBuilder::handshake(
        Version::V1,
        ConnectionId::from_slice(&[0xdd; 8]).unwrap(),
        client_scid(),
    )
    .frame(Frame::Ping)
    .build(zero_rtt_hp().as_ref())
    .unwrap();
    let datagram = concat(&[&client_initial(Version::V1, 0), &other]);

    let outcome = decode_datagram(datagram, &server());
    assert!(outcome.packets().is_empty());
    assert_eq!(outcome.error().unwrap().error, Error::ConnectionIdMismatch);
}

#[test]
fn test_packet_number_reconstructed_from_space() {
    let mut ctx = server();
    ctx.record_packet(&client_dcid(), PacketNumberSpace::Initial, 0x1ff);
    let keys = keys(Version::V1);
    let datagram = PacketBuilder::initial(Version::V1, client_dcid(), client_scid(), Bytes::new())
        .packet_number(0x200, Some(0x1ff))
        .frame(Frame::Ping)
        .pad_to(MIN_INITIAL_PACKET_SIZE)
        .build(keys.client.header_protection().as_ref())
        .unwrap();
    let packets = decode_datagram(datagram, &ctx).into_packets();
    assert_eq!(packets[0].packet_number(), Some(0x200));
    assert_eq!(packets[0].packet_number_len(), Some(1));
}

#[test]
fn test_decoding_twice_is_identical() {
    let datagram = client_initial(Version::Draft32, 3);
    let ctx = server();
    let first = decode_datagram(datagram.clone(), &ctx);
    let second = decode_datagram(datagram, &ctx);
    assert!(first.is_complete());
    assert_eq!(first, second);
}

#[test]
fn test_unsupported_version_rejected() {
    let ctx = EndpointContext::new(Side::Server, 8, vec![Version::V1]);
    let outcome = decode_datagram(client_initial(Version::Draft29, 0), &ctx);
    assert_eq!(
        outcome.error().unwrap().error,
        Error::UnsupportedVersion(0xff00_001d)
    );
    assert_eq!(outcome.error().unwrap().offset, 1);
}

#[test]
fn test_short_header_after_handshake() {
    let hp = zero_rtt_hp();
    let local = ConnectionId::from_slice(&[0x5e; 8]).unwrap();
    let mut ctx = server();
    ctx.install_header_protection(local.clone(), EncryptionLevel::OneRtt, hp.clone());

    let datagram = PacketBuilder::short(local.clone())
        .packet_number(9, Some(8))
        .key_phase(true)
        .spin(true)
        .frame(Frame::MaxData(4096))
        .build(hp.as_ref())
        .unwrap();
    let packets = decode_datagram(datagram.clone(), &ctx).into_packets();
    let [Packet::Short(short)] = &packets[..] else {
        panic!("{packets:?}");
    };
    assert_eq!(short.dcid, local);
    assert!(short.key_phase);
    assert!(short.spin);
    assert_eq!(short.packet_number, 9);
    assert_eq!(short.frames[0], Frame::MaxData(4096));
    assert_eq!(packets[0].packet_length(), datagram.len());
}

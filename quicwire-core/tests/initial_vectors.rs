//! Initial key schedule and header protection against the published
//! RFC 9001 Appendix A and draft-ietf-quic-tls-29 Appendix A vectors.

use quicwire_core::crypto::{InitialKeySchedule, SAMPLE_LEN};
use quicwire_core::packet::protection::{
    apply_header_protection, packet_number_len, sample, unmask_first_byte, unmask_packet_number,
};
use quicwire_core::types::{ConnectionId, Side};
use quicwire_core::version::Version;

fn dcid() -> ConnectionId {
    ConnectionId::from_slice(&hex::decode("8394c8f03e515708").unwrap()).unwrap()
}

fn sample16(s: &str) -> [u8; SAMPLE_LEN] {
    hex::decode(s).unwrap().try_into().unwrap()
}

/// Unprotected header followed by four zero bytes and the sample, so the
/// sample sits four bytes after the packet number field.
fn header_with_sample(header: &str, sample: &str) -> (Vec<u8>, usize) {
    let mut packet = hex::decode(header).unwrap();
    let pn_offset = packet.len() - 4;
    packet.extend_from_slice(&[0; 4]);
    packet.extend_from_slice(&hex::decode(sample).unwrap());
    (packet, pn_offset)
}

mod draft29 {
    use super::*;

    #[test]
    fn test_secrets() {
        let keys = InitialKeySchedule::new(Version::Draft29)
            .initialize(&dcid())
            .unwrap();
        assert_eq!(
            hex::encode(keys.initial_secret),
            "1e7e7764529715b1e0ddc8e9753c61576769605187793ed366f8bbf8c9e986eb"
        );
        assert_eq!(
            hex::encode(keys.client.secret),
            "0088119288f1d866733ceeed15ff9d50902cf82952eee27e9d4d4918ea371d87"
        );
        assert_eq!(hex::encode(keys.client.key), "175257a31eb09dea9366d8bb79ad80ba");
        assert_eq!(hex::encode(keys.client.iv), "6b26114b9cba2b63a9e8dd4f");
        assert_eq!(hex::encode(keys.client.hp_key), "9ddd12c994c0698b89374a9c077a3077");
        assert_eq!(hex::encode(keys.server.hp_key), "c0c499a65a60024a18a250974ea01dfa");
    }

    #[test]
    fn test_drafts_share_salt() {
        let d29 = InitialKeySchedule::new(Version::Draft29).initialize(&dcid()).unwrap();
        for version in [Version::Draft30, Version::Draft31, Version::Draft32] {
            let keys = InitialKeySchedule::new(version).initialize(&dcid()).unwrap();
            assert_eq!(keys.client.hp_key, d29.client.hp_key);
        }
    }

    #[test]
    fn test_client_initial_mask_and_header() {
        let keys = InitialKeySchedule::new(Version::Draft29)
            .initialize(&dcid())
            .unwrap();
        let mask = keys
            .derive_header_protection_mask(Side::Client, &sample16("fb66bc6a93032b50dd8973972d149421"));
        assert_eq!(hex::encode(&mask[..5]), "1e9cdb9909");

        let (mut packet, pn_offset) = header_with_sample(
            "c3ff00001d088394c8f03e5157080000449e00000002",
            "fb66bc6a93032b50dd8973972d149421",
        );
        let hp = keys.sent_by(Side::Client).header_protection();
        apply_header_protection(&mut packet, pn_offset, hp.as_ref()).unwrap();
        assert_eq!(
            hex::encode(&packet[..pn_offset + 4]),
            "cdff00001d088394c8f03e5157080000449e9cdb990b"
        );
    }
}

mod v1 {
    use super::*;

    #[test]
    fn test_server_keys() {
        let keys = InitialKeySchedule::new(Version::V1).initialize(&dcid()).unwrap();
        assert_eq!(hex::encode(keys.server.key), "cf3a5331653c364c88f0f379b6067e37");
        assert_eq!(hex::encode(keys.server.iv), "0ac1493ca1905853b0bba03e");
    }

    #[test]
    fn test_client_initial_header_roundtrip() {
        let keys = InitialKeySchedule::new(Version::V1).initialize(&dcid()).unwrap();
        let (mut packet, pn_offset) = header_with_sample(
            "c300000001088394c8f03e5157080000449e00000002",
            "d1b1c98dd7689fb8ec11d242b123dc9b",
        );
        let hp = keys.client.header_protection();
        apply_header_protection(&mut packet, pn_offset, hp.as_ref()).unwrap();
        assert_eq!(
            hex::encode(&packet[..pn_offset + 4]),
            "c000000001088394c8f03e5157080000449e7b9aec34"
        );

        // and back
        let mask = hp.mask(&sample(&packet, pn_offset, packet.len()).unwrap());
        assert_eq!(hex::encode(&mask[..5]), "437b9aec36");
        let first = unmask_first_byte(packet[0], &mask);
        assert_eq!(first, 0xc3);
        let pn_len = packet_number_len(first);
        assert_eq!(unmask_packet_number(&packet[pn_offset..pn_offset + pn_len], &mask), 2);
    }

    #[test]
    fn test_dcid_changes_every_key() {
        let a = InitialKeySchedule::new(Version::V1).initialize(&dcid()).unwrap();
        let other = ConnectionId::from_slice(&[0; 8]).unwrap();
        let b = InitialKeySchedule::new(Version::V1).initialize(&other).unwrap();
        assert_ne!(a.client.hp_key, b.client.hp_key);
        assert_ne!(a.server.key, b.server.key);
    }
}

//! # Packet Protection Keys (RFC 9001)
//!
//! Only the pieces needed to *read* a header live here: the Initial key
//! schedule and header-protection mask derivation. Payload AEAD is an
//! external collaborator reached through [`crate::packet::ParseContext`].

#![forbid(unsafe_code)]

pub mod header_protection;
pub mod initial;

pub use header_protection::{Aes128HeaderProtection, HeaderProtector, SAMPLE_LEN};
pub use initial::{
    hkdf_expand_label, next_generation_secret, DirectionalKeys, InitialKeySchedule, InitialKeys,
};

use crate::types::PacketNumberSpace;

/// Encryption Level (RFC 9001 Section 4)
///
/// Corresponds to TLS encryption levels and packet number spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncryptionLevel {
    /// Initial packets (keys derived from the client's first DCID)
    Initial,
    /// 0-RTT packets
    ZeroRtt,
    /// Handshake packets
    Handshake,
    /// 1-RTT (short header) packets
    OneRtt,
}

impl EncryptionLevel {
    pub fn packet_number_space(self) -> PacketNumberSpace {
        match self {
            EncryptionLevel::Initial => PacketNumberSpace::Initial,
            EncryptionLevel::Handshake => PacketNumberSpace::Handshake,
            EncryptionLevel::ZeroRtt | EncryptionLevel::OneRtt => {
                PacketNumberSpace::ApplicationData
            }
        }
    }
}

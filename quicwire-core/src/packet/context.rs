//! # Parse Context
//!
//! Everything the datagram decoder needs to know about the local endpoint:
//! its role, the versions it speaks, the header-protection keys installed
//! per (connection id, encryption level), the largest packet number seen
//! per space, and the length of the connection ids it issues (short
//! headers do not encode it).

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::crypto::{EncryptionLevel, HeaderProtector, InitialKeySchedule, InitialKeys};
use crate::error::Result;
use crate::reader::Reader;
use crate::types::{ConnectionId, PacketNumber, PacketNumberSpace, Side};
use crate::version::Version;

use super::space::PacketNumberSpaces;

/// Outcome of a header-protection key lookup.
///
/// Missing keys are never an error: the datagram may simply have arrived
/// before the handshake produced them.
#[derive(Debug, Clone)]
pub enum KeyLookup {
    Ready(Arc<dyn HeaderProtector>),
    NotYetAvailable,
}

/// Read-only view of endpoint state consulted while decoding.
pub trait ParseContext {
    fn side(&self) -> Side;

    fn supported_versions(&self) -> &[Version];

    /// Header-protection keys for packets arriving on `dcid` at `level`.
    ///
    /// `version` is the long-header version, `None` for short headers.
    fn header_protection(
        &self,
        dcid: &ConnectionId,
        level: EncryptionLevel,
        version: Option<Version>,
    ) -> KeyLookup;

    /// Largest packet number accepted so far in `space` on `dcid`.
    fn largest_packet_number(
        &self,
        dcid: &ConnectionId,
        space: PacketNumberSpace,
    ) -> Option<PacketNumber>;

    /// DCID length of incoming short-header packets, if known.
    fn short_header_dcid_len(&self) -> Option<usize>;

    /// Remove payload protection. Plaintext payloads pass through.
    fn open_payload(
        &self,
        _dcid: &ConnectionId,
        _level: EncryptionLevel,
        _packet_number: PacketNumber,
        payload: Reader,
    ) -> Result<Reader> {
        Ok(payload)
    }
}

/// Key and packet-number state change, applied between datagrams.
#[derive(Debug, Clone)]
pub enum ContextUpdate {
    InstallHeaderProtection {
        dcid: ConnectionId,
        level: EncryptionLevel,
        hp: Arc<dyn HeaderProtector>,
    },
    /// Install Initial keys for packets arriving on `dcid`.
    InstallInitial { dcid: ConnectionId, keys: InitialKeys },
    Discard {
        dcid: ConnectionId,
        level: EncryptionLevel,
    },
}

/// [`ParseContext`] for one local endpoint.
///
/// A server derives Initial header protection from the DCID of the
/// client's first flight on demand; anything installed explicitly wins.
#[derive(Debug)]
pub struct EndpointContext {
    side: Side,
    local_cid_len: usize,
    supported_versions: Vec<Version>,
    keys: HashMap<(ConnectionId, EncryptionLevel), Arc<dyn HeaderProtector>>,
    spaces: HashMap<ConnectionId, PacketNumberSpaces>,
}

impl EndpointContext {
    pub fn new(side: Side, local_cid_len: usize, supported_versions: Vec<Version>) -> Self {
        Self {
            side,
            local_cid_len,
            supported_versions,
            keys: HashMap::new(),
            spaces: HashMap::new(),
        }
    }

    pub fn local_cid_len(&self) -> usize {
        self.local_cid_len
    }

    pub fn install_header_protection(
        &mut self,
        dcid: ConnectionId,
        level: EncryptionLevel,
        hp: Arc<dyn HeaderProtector>,
    ) {
        debug!(%dcid, ?level, "installed header protection keys");
        self.keys.insert((dcid, level), hp);
    }

    /// Install the Initial keys protecting packets the peer sends to `dcid`.
    pub fn install_initial_keys(&mut self, dcid: ConnectionId, keys: &InitialKeys) {
        let hp = keys.sent_by(self.side.opposite()).header_protection();
        self.install_header_protection(dcid, EncryptionLevel::Initial, hp);
    }

    pub fn discard_keys(&mut self, dcid: &ConnectionId, level: EncryptionLevel) {
        if self.keys.remove(&(dcid.clone(), level)).is_some() {
            debug!(%dcid, ?level, "discarded header protection keys");
        }
    }

    /// Record a packet accepted on `dcid`.
    pub fn record_packet(&mut self, dcid: &ConnectionId, space: PacketNumberSpace, pn: PacketNumber) {
        self.spaces
            .entry(dcid.clone())
            .or_default()
            .on_packet_received(space, pn);
    }

    pub fn apply(&mut self, update: ContextUpdate) {
        match update {
            ContextUpdate::InstallHeaderProtection { dcid, level, hp } => {
                self.install_header_protection(dcid, level, hp)
            }
            ContextUpdate::InstallInitial { dcid, keys } => self.install_initial_keys(dcid, &keys),
            ContextUpdate::Discard { dcid, level } => self.discard_keys(&dcid, level),
        }
    }
}

impl ParseContext for EndpointContext {
    fn side(&self) -> Side {
        self.side
    }

    fn supported_versions(&self) -> &[Version] {
        &self.supported_versions
    }

    fn header_protection(
        &self,
        dcid: &ConnectionId,
        level: EncryptionLevel,
        version: Option<Version>,
    ) -> KeyLookup {
        if let Some(hp) = self.keys.get(&(dcid.clone(), level)) {
            return KeyLookup::Ready(hp.clone());
        }

        match (self.side, level, version) {
            (Side::Server, EncryptionLevel::Initial, Some(version)) => {
                match InitialKeySchedule::new(version).initialize(dcid) {
                    Ok(keys) => {
                        trace!(%dcid, "derived initial keys from client dcid");
                        KeyLookup::Ready(keys.client.header_protection())
                    }
                    Err(error) => {
                        debug!(%dcid, %error, "initial key derivation failed");
                        KeyLookup::NotYetAvailable
                    }
                }
            }
            _ => KeyLookup::NotYetAvailable,
        }
    }

    fn largest_packet_number(
        &self,
        dcid: &ConnectionId,
        space: PacketNumberSpace,
    ) -> Option<PacketNumber> {
        self.spaces.get(dcid).and_then(|s| s.largest(space))
    }

    fn short_header_dcid_len(&self) -> Option<usize> {
        Some(self.local_cid_len)
    }
}

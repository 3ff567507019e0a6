//! # Initial Secrets (RFC 9001 Section 5.2)
//!
//! ```text
//! initial_secret        = HKDF-Extract(initial_salt, client_dst_connection_id)
//! client_initial_secret = HKDF-Expand-Label(initial_secret, "client in", "", 32)
//! server_initial_secret = HKDF-Expand-Label(initial_secret, "server in", "", 32)
//! key = HKDF-Expand-Label(secret, "quic key", "", 16)
//! iv  = HKDF-Expand-Label(secret, "quic iv",  "", 12)
//! hp  = HKDF-Expand-Label(secret, "quic hp",  "", 16)
//! ```
//!
//! [`InitialKeySchedule`] is the uninitialised half: it only knows the
//! version (and therefore the salt). [`InitialKeySchedule::initialize`]
//! consumes it and yields immutable [`InitialKeys`], which are the only
//! value able to produce a header-protection mask.

#![forbid(unsafe_code)]

use std::sync::Arc;

use hkdf::Hkdf;
use sha2::Sha256;
use tracing::trace;

use super::header_protection::{Aes128HeaderProtection, HeaderProtector, SAMPLE_LEN};
use crate::error::{Error, Result};
use crate::types::{ConnectionId, Side};
use crate::version::Version;

const LABEL_PREFIX: &[u8] = b"tls13 ";

pub const SECRET_LEN: usize = 32;
pub const KEY_LEN: usize = 16;
pub const IV_LEN: usize = 12;
pub const HP_KEY_LEN: usize = 16;

/// HKDF-Expand-Label (RFC 8446 Section 7.1) over SHA-256.
///
/// ```text
/// struct {
///     uint16 length = Length;
///     opaque label<7..255> = "tls13 " + Label;
///     opaque context<0..255> = Context;
/// } HkdfLabel;
/// ```
pub fn hkdf_expand_label(secret: &[u8], label: &[u8], context: &[u8], out: &mut [u8]) -> Result<()> {
    let label_len = LABEL_PREFIX.len() + label.len();
    if out.len() > u16::MAX as usize || label_len > u8::MAX as usize || context.len() > u8::MAX as usize {
        return Err(Error::CryptoSetup("hkdf label field too long"));
    }

    let mut info = Vec::with_capacity(2 + 1 + label_len + 1 + context.len());
    info.extend_from_slice(&(out.len() as u16).to_be_bytes());
    info.push(label_len as u8);
    info.extend_from_slice(LABEL_PREFIX);
    info.extend_from_slice(label);
    info.push(context.len() as u8);
    info.extend_from_slice(context);

    let hk = Hkdf::<Sha256>::from_prk(secret)
        .map_err(|_| Error::CryptoSetup("hkdf secret shorter than hash length"))?;
    hk.expand(&info, out)
        .map_err(|_| Error::CryptoSetup("hkdf output too long"))
}

fn expand<const N: usize>(secret: &[u8], label: &[u8]) -> Result<[u8; N]> {
    let mut out = [0u8; N];
    hkdf_expand_label(secret, label, &[], &mut out)?;
    Ok(out)
}

/// Secret for the next key phase (RFC 9001 Section 6.1).
pub fn next_generation_secret(secret: &[u8; SECRET_LEN]) -> Result<[u8; SECRET_LEN]> {
    expand(secret, b"quic ku")
}

/// Key material for packets sent by one side.
#[derive(Clone)]
pub struct DirectionalKeys {
    pub secret: [u8; SECRET_LEN],
    pub key: [u8; KEY_LEN],
    pub iv: [u8; IV_LEN],
    pub hp_key: [u8; HP_KEY_LEN],
    hp: Arc<Aes128HeaderProtection>,
}

impl DirectionalKeys {
    pub fn from_secret(secret: [u8; SECRET_LEN]) -> Result<Self> {
        let key = expand::<KEY_LEN>(&secret, b"quic key")?;
        let iv = expand::<IV_LEN>(&secret, b"quic iv")?;
        let hp_key = expand::<HP_KEY_LEN>(&secret, b"quic hp")?;
        let hp = Arc::new(Aes128HeaderProtection::new(&hp_key)?);
        Ok(Self {
            secret,
            key,
            iv,
            hp_key,
            hp,
        })
    }

    pub fn header_protection(&self) -> Arc<dyn HeaderProtector> {
        self.hp.clone()
    }

    pub fn derive_header_protection_mask(&self, sample: &[u8; SAMPLE_LEN]) -> [u8; 16] {
        self.hp.mask(sample)
    }

    /// Keys for the next key phase. The header-protection key is not
    /// updated (RFC 9001 Section 6).
    pub fn next_generation(&self) -> Result<Self> {
        let secret = next_generation_secret(&self.secret)?;
        let key = expand::<KEY_LEN>(&secret, b"quic key")?;
        let iv = expand::<IV_LEN>(&secret, b"quic iv")?;
        Ok(Self {
            secret,
            key,
            iv,
            hp_key: self.hp_key,
            hp: self.hp.clone(),
        })
    }
}

impl core::fmt::Debug for DirectionalKeys {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DirectionalKeys").finish_non_exhaustive()
    }
}

/// Uninitialised Initial key schedule for one version.
#[derive(Debug, Clone, Copy, Default)]
pub struct InitialKeySchedule {
    version: Version,
}

impl InitialKeySchedule {
    pub fn new(version: Version) -> Self {
        Self { version }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Derive every Initial secret from the client's first DCID.
    pub fn initialize(self, client_dcid: &ConnectionId) -> Result<InitialKeys> {
        let (prk, _) = Hkdf::<Sha256>::extract(Some(&self.version.initial_salt()[..]), client_dcid.as_bytes());
        let mut initial_secret = [0u8; SECRET_LEN];
        initial_secret.copy_from_slice(&prk);

        let client = DirectionalKeys::from_secret(expand(&initial_secret, b"client in")?)?;
        let server = DirectionalKeys::from_secret(expand(&initial_secret, b"server in")?)?;

        trace!(version = self.version.name(), dcid = %client_dcid, "derived initial keys");

        Ok(InitialKeys {
            version: self.version,
            initial_secret,
            client,
            server,
        })
    }
}

/// Ready Initial keys for both directions.
#[derive(Debug, Clone)]
pub struct InitialKeys {
    pub version: Version,
    pub initial_secret: [u8; SECRET_LEN],
    pub client: DirectionalKeys,
    pub server: DirectionalKeys,
}

impl InitialKeys {
    /// Keys protecting packets sent by `sender`.
    pub fn sent_by(&self, sender: Side) -> &DirectionalKeys {
        match sender {
            Side::Client => &self.client,
            Side::Server => &self.server,
        }
    }

    pub fn derive_header_protection_mask(&self, sender: Side, sample: &[u8; SAMPLE_LEN]) -> [u8; 16] {
        self.sent_by(sender).derive_header_protection_mask(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dcid() -> ConnectionId {
        ConnectionId::from_slice(&hex::decode("8394c8f03e515708").unwrap()).unwrap()
    }

    #[test]
    fn test_expand_label_info_layout() {
        // "client in" from the RFC 9001 appendix, checked through the output
        let keys = InitialKeySchedule::new(Version::V1).initialize(&dcid()).unwrap();
        let mut out = [0u8; 32];
        hkdf_expand_label(&keys.initial_secret, b"client in", &[], &mut out).unwrap();
        assert_eq!(out, keys.client.secret);
    }

    #[test]
    fn test_v1_initial_secrets() {
        let keys = InitialKeySchedule::new(Version::V1).initialize(&dcid()).unwrap();
        assert_eq!(
            hex::encode(keys.initial_secret),
            "7db5df06e7a69e432496adedb00851923595221596ae2ae9fb8115c1e9ed0a44"
        );
        assert_eq!(
            hex::encode(keys.client.secret),
            "c00cf151ca5be075ed0ebfb5c80323c42d6b7db67881289af4008f1f6c357aea"
        );
        assert_eq!(hex::encode(keys.client.key), "1f369613dd76d5467730efcbe3b1a22d");
        assert_eq!(hex::encode(keys.client.iv), "fa044b2f42a3fd3b46fb255c");
        assert_eq!(hex::encode(keys.client.hp_key), "9f50449e04a0e810283a1e9933adedd2");
        assert_eq!(
            hex::encode(keys.server.secret),
            "3c199828fd139efd216c155ad844cc81fb82fa8d7446fa7d78be803acdda951b"
        );
        assert_eq!(hex::encode(keys.server.hp_key), "c206b8d9b9f0f37644430b490eeaa314");
    }

    #[test]
    fn test_key_update_keeps_hp() {
        let keys = InitialKeySchedule::new(Version::V1).initialize(&dcid()).unwrap();
        let next = keys.client.next_generation().unwrap();
        assert_ne!(next.secret, keys.client.secret);
        assert_ne!(next.key, keys.client.key);
        assert_eq!(next.hp_key, keys.client.hp_key);
        assert_eq!(next.secret, next_generation_secret(&keys.client.secret).unwrap());
    }

    #[test]
    fn test_rejects_short_secret() {
        let mut out = [0u8; 16];
        assert!(hkdf_expand_label(&[0u8; 8], b"quic hp", &[], &mut out).is_err());
    }
}

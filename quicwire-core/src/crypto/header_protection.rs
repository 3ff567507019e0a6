//! # Header Protection (RFC 9001 Section 5.4)
//!
//! A [`HeaderProtector`] turns a 16-byte ciphertext sample into a mask.
//! Applying and removing the mask is the same XOR and lives in
//! [`crate::packet::protection`].

#![forbid(unsafe_code)]

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;

use crate::error::{Error, Result};

/// Bytes sampled from the protected payload.
pub const SAMPLE_LEN: usize = 16;

/// Header-protection mask source for one direction at one encryption level.
pub trait HeaderProtector: Send + Sync + core::fmt::Debug {
    /// Derive the 16-byte mask for `sample`.
    fn mask(&self, sample: &[u8; SAMPLE_LEN]) -> [u8; 16];
}

/// AES-128-ECB header protection (RFC 9001 Section 5.4.3)
///
/// Built only from a 16-byte key; there is no uninitialised state.
#[derive(Clone)]
pub struct Aes128HeaderProtection {
    cipher: Aes128,
}

impl Aes128HeaderProtection {
    pub fn new(key: &[u8]) -> Result<Self> {
        let cipher = Aes128::new_from_slice(key)
            .map_err(|_| Error::CryptoSetup("header protection key must be 16 bytes"))?;
        Ok(Self { cipher })
    }
}

impl HeaderProtector for Aes128HeaderProtection {
    fn mask(&self, sample: &[u8; SAMPLE_LEN]) -> [u8; 16] {
        let mut block = aes::Block::clone_from_slice(sample);
        self.cipher.encrypt_block(&mut block);
        let mut out = [0u8; 16];
        out.copy_from_slice(&block);
        out
    }
}

impl core::fmt::Debug for Aes128HeaderProtection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Aes128HeaderProtection")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arr16(s: &str) -> [u8; 16] {
        hex::decode(s).unwrap().try_into().unwrap()
    }

    #[test]
    fn test_rfc9001_client_mask() {
        let hp = Aes128HeaderProtection::new(&arr16("9f50449e04a0e810283a1e9933adedd2")).unwrap();
        let mask = hp.mask(&arr16("d1b1c98dd7689fb8ec11d242b123dc9b"));
        assert_eq!(hex::encode(&mask[..5]), "437b9aec36");
    }

    #[test]
    fn test_rejects_wrong_key_length() {
        assert!(matches!(
            Aes128HeaderProtection::new(&[0u8; 15]),
            Err(Error::CryptoSetup(_))
        ));
    }
}

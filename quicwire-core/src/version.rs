//! # QUIC Versions (RFC 8999, RFC 9000 Section 6)
//!
//! The engine speaks QUIC v1 and the late IETF drafts 29 through 32, which
//! share the v1 wire image and differ only in the Initial salt. Version 0 is
//! reserved for Version Negotiation packets.

#![forbid(unsafe_code)]

use crate::error::{Error, Result};

// ============================================================================
// QUIC Version Constants
// ============================================================================

/// QUIC Version 1 (RFC 9000)
pub const VERSION_1: u32 = 0x0000_0001;

/// Version used in Version Negotiation packets (RFC 9000 Section 6)
pub const VERSION_NEGOTIATION: u32 = 0x0000_0000;

pub const DRAFT_29: u32 = 0xff00_001d;
pub const DRAFT_30: u32 = 0xff00_001e;
pub const DRAFT_31: u32 = 0xff00_001f;
pub const DRAFT_32: u32 = 0xff00_0020;

/// Initial salt for QUIC v1 (RFC 9001 Section 5.2)
pub const INITIAL_SALT_V1: [u8; 20] = [
    0x38, 0x76, 0x2c, 0xf7, 0xf5, 0x59, 0x34, 0xb3, 0x4d, 0x17, 0x9a, 0xe6, 0xa4, 0xc8, 0x0c, 0xad,
    0xcc, 0xbb, 0x7f, 0x0a,
];

/// Initial salt shared by draft-ietf-quic-tls-29 through -32
pub const INITIAL_SALT_DRAFT_29: [u8; 20] = [
    0xaf, 0xbf, 0xec, 0x28, 0x99, 0x93, 0xd2, 0x4c, 0x9e, 0x97, 0x86, 0xf1, 0x9c, 0x61, 0x11, 0xe0,
    0x43, 0x90, 0xa8, 0x99,
];

/// Reserved versions have the form 0x?a?a?a?a (RFC 9000 Section 15)
pub fn is_reserved_version(version: u32) -> bool {
    (version & 0x0f0f_0f0f) == 0x0a0a_0a0a
}

/// A version this endpoint can parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Version {
    V1,
    Draft29,
    Draft30,
    Draft31,
    #[default]
    Draft32,
}

impl Version {
    pub const ALL: [Version; 5] = [
        Version::V1,
        Version::Draft29,
        Version::Draft30,
        Version::Draft31,
        Version::Draft32,
    ];

    /// `None` for version 0, reserved versions and anything unknown.
    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            VERSION_1 => Some(Version::V1),
            DRAFT_29 => Some(Version::Draft29),
            DRAFT_30 => Some(Version::Draft30),
            DRAFT_31 => Some(Version::Draft31),
            DRAFT_32 => Some(Version::Draft32),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u32 {
        match self {
            Version::V1 => VERSION_1,
            Version::Draft29 => DRAFT_29,
            Version::Draft30 => DRAFT_30,
            Version::Draft31 => DRAFT_31,
            Version::Draft32 => DRAFT_32,
        }
    }

    /// Salt for HKDF-Extract of the Initial secret (RFC 9001 Section 5.2)
    pub fn initial_salt(self) -> &'static [u8; 20] {
        match self {
            Version::V1 => &INITIAL_SALT_V1,
            _ => &INITIAL_SALT_DRAFT_29,
        }
    }

    /// Parse a configuration name such as `"v1"` or `"draft-32"`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "v1" | "1" => Some(Version::V1),
            "draft-29" | "draft29" => Some(Version::Draft29),
            "draft-30" | "draft30" => Some(Version::Draft30),
            "draft-31" | "draft31" => Some(Version::Draft31),
            "draft-32" | "draft32" => Some(Version::Draft32),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Version::V1 => "v1",
            Version::Draft29 => "draft-29",
            Version::Draft30 => "draft-30",
            Version::Draft31 => "draft-31",
            Version::Draft32 => "draft-32",
        }
    }
}

/// Resolve a wire version against an allow-list.
pub fn negotiate(value: u32, supported: &[Version]) -> Result<Version> {
    match Version::from_wire(value) {
        Some(v) if supported.contains(&v) => Ok(v),
        _ => Err(Error::UnsupportedVersion(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_roundtrip() {
        for v in Version::ALL {
            assert_eq!(Version::from_wire(v.to_wire()), Some(v));
            assert_eq!(Version::from_name(v.name()), Some(v));
        }
        assert_eq!(Version::from_wire(VERSION_NEGOTIATION), None);
        assert_eq!(Version::from_wire(0xff00_001c), None);
        assert_eq!(Version::default(), Version::Draft32);
    }

    #[test]
    fn test_salts() {
        assert_eq!(
            hex::encode(Version::Draft29.initial_salt()),
            "afbfec289993d24c9e9786f19c6111e04390a899"
        );
        assert_eq!(
            hex::encode(Version::V1.initial_salt()),
            "38762cf7f55934b34d179ae6a4c80cadccbb7f0a"
        );
        assert_eq!(Version::Draft32.initial_salt(), Version::Draft29.initial_salt());
    }

    #[test]
    fn test_reserved_versions() {
        assert!(is_reserved_version(0x0a0a_0a0a));
        assert!(is_reserved_version(0xfafa_fafa));
        assert!(!is_reserved_version(VERSION_1));
    }

    #[test]
    fn test_negotiate_respects_allow_list() {
        assert_eq!(negotiate(DRAFT_29, &Version::ALL), Ok(Version::Draft29));
        assert_eq!(
            negotiate(DRAFT_29, &[Version::V1]),
            Err(Error::UnsupportedVersion(DRAFT_29))
        );
    }
}

// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The 64-byte / 128-hex fingerprint identifying a party (§3, GLOSSARY).

use std::{fmt, str::FromStr};

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Sha3_512};
use thiserror::Error;

pub const FINGERPRINT_LEN: usize = 64;

/// `SHA3-512(dsa_public_key)`, the primary key of an identity record.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("fingerprint must be exactly {FINGERPRINT_LEN} bytes, got {0}")]
    WrongLength(usize),
    #[error("fingerprint hex string must be {} lowercase hex chars", FINGERPRINT_LEN * 2)]
    InvalidHex,
}

impl Fingerprint {
    /// Derive a fingerprint from a DSA-87 public key, per §3's invariant
    /// `fingerprint == SHA3-512(dsa_public_key)`.
    pub fn of_dsa_public_key(dsa_public_key: &[u8]) -> Self {
        let digest = Sha3_512::digest(dsa_public_key);
        let mut bytes = [0u8; FINGERPRINT_LEN];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FingerprintError> {
        if bytes.len() != FINGERPRINT_LEN {
            return Err(FingerprintError::WrongLength(bytes.len()));
        }
        let mut out = [0u8; FINGERPRINT_LEN];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != FINGERPRINT_LEN * 2 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(FingerprintError::InvalidHex);
        }
        let bytes = hex::decode(s).map_err(|_| FingerprintError::InvalidHex)?;
        Self::from_bytes(&bytes)
    }
}

/// `true` iff `s` is a well-formed 128-char lowercase-hex fingerprint,
/// used by the keyserver to decide "fingerprint vs. name" lookups (§4.5).
pub fn looks_like_fingerprint(s: &str) -> bool {
    s.len() == FINGERPRINT_LEN * 2 && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_hex() {
        let fp = Fingerprint::of_dsa_public_key(b"a dsa public key");
        let hex = fp.to_hex();
        assert_eq!(hex.len(), 128);
        let parsed: Fingerprint = hex.parse().unwrap();
        assert_eq!(fp, parsed);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Fingerprint::from_bytes(&[0u8; 10]).is_err());
    }

    #[test]
    fn looks_like_fingerprint_rejects_names() {
        let fp = Fingerprint::of_dsa_public_key(b"x");
        assert!(looks_like_fingerprint(&fp.to_hex()));
        assert!(!looks_like_fingerprint("alice"));
    }
}

// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! HKDF and PBKDF2 (§4.1, §4.2): `hkdf`, `pbkdf2_sha256` (210,000 rounds,
//! used to derive the at-rest key-encryption-key, §4.2), and
//! `pbkdf2_hmac_sha512` (2,048 rounds, used for mnemonic-to-master-seed
//! derivation, §4.2).

use hkdf::Hkdf;
use pbkdf2::pbkdf2_hmac;
use sha2::{Sha256, Sha512};

use crate::error::PrimitiveError;

pub const PBKDF2_SHA256_AT_REST_ITERS: u32 = 210_000;
pub const PBKDF2_SHA512_MNEMONIC_ITERS: u32 = 2_048;

/// HKDF-SHA3-512 expand (and implicit extract) of `ikm`/`salt` into
/// `out_len` bytes under `info`.
pub fn hkdf_sha3_512(
    salt: &[u8],
    ikm: &[u8],
    info: &[u8],
    out_len: usize,
) -> Result<Vec<u8>, PrimitiveError> {
    let hk = Hkdf::<sha3::Sha3_512>::new(Some(salt), ikm);
    let mut out = vec![0u8; out_len];
    hk.expand(info, &mut out)
        .map_err(|_| PrimitiveError::WrongLength {
            expected: 0,
            got: out_len,
        })?;
    Ok(out)
}

/// Derive a 32-byte at-rest key-encryption-key from `password`/`salt`
/// (§4.2 `save_encrypted`).
pub fn pbkdf2_sha256(password: &[u8], salt: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password, salt, PBKDF2_SHA256_AT_REST_ITERS, &mut out);
    out
}

/// Derive a 64-byte master seed from a mnemonic + passphrase (§4.2
/// `generate_from_mnemonic`): PBKDF2-HMAC-SHA512 over
/// `mnemonic` with salt `"mnemonic" || passphrase`.
pub fn pbkdf2_hmac_sha512_mnemonic(mnemonic: &str, passphrase: &str) -> [u8; 64] {
    let mut salt = Vec::with_capacity(8 + passphrase.len());
    salt.extend_from_slice(b"mnemonic");
    salt.extend_from_slice(passphrase.as_bytes());

    let mut out = [0u8; 64];
    pbkdf2_hmac::<Sha512>(
        mnemonic.as_bytes(),
        &salt,
        PBKDF2_SHA512_MNEMONIC_ITERS,
        &mut out,
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pbkdf2_sha256_is_deterministic() {
        let a = pbkdf2_sha256(b"password", b"salt");
        let b = pbkdf2_sha256(b"password", b"salt");
        assert_eq!(a, b);
    }

    #[test]
    fn mnemonic_seed_changes_with_passphrase() {
        let a = pbkdf2_hmac_sha512_mnemonic("abandon abandon about", "");
        let b = pbkdf2_hmac_sha512_mnemonic("abandon abandon about", "trezor");
        assert_ne!(a, b);
    }

    #[test]
    fn hkdf_expand_respects_out_len() {
        let out = hkdf_sha3_512(b"salt", b"ikm", b"info", 48).unwrap();
        assert_eq!(out.len(), 48);
    }
}

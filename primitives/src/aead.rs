// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! AES-256-GCM AEAD (§4.1): `aead_seal`, `aead_open`, with the tag split
//! out as its own field to match the Seal wire format (§6.1), which
//! stores `ciphertext` and `tag` as separate fixed/variable-length runs.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce,
};

use crate::error::PrimitiveError;

pub const AEAD_KEY_LEN: usize = 32;
pub const AEAD_NONCE_LEN: usize = 12;
pub const AEAD_TAG_LEN: usize = 16;

/// Seal `plaintext` under `key`/`nonce`, authenticating `aad`. Returns
/// `(ciphertext, tag)` with the tag split into its own 16-byte output.
pub fn aead_seal(
    key: &[u8; AEAD_KEY_LEN],
    nonce: &[u8; AEAD_NONCE_LEN],
    aad: &[u8],
    plaintext: &[u8],
) -> (Vec<u8>, [u8; AEAD_TAG_LEN]) {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut combined = cipher
        .encrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .expect("AES-256-GCM encryption with a valid 12-byte nonce cannot fail");

    let tag_start = combined.len() - AEAD_TAG_LEN;
    let mut tag = [0u8; AEAD_TAG_LEN];
    tag.copy_from_slice(&combined[tag_start..]);
    combined.truncate(tag_start);
    (combined, tag)
}

/// Open a ciphertext/tag pair sealed by [`aead_seal`]. Performs a
/// constant-time tag check internally (the `aead`/RustCrypto backends
/// compare tags in constant time); on mismatch returns
/// [`PrimitiveError::DecryptionFailed`] without leaking which byte
/// differed.
pub fn aead_open(
    key: &[u8; AEAD_KEY_LEN],
    nonce: &[u8; AEAD_NONCE_LEN],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8; AEAD_TAG_LEN],
) -> Result<Vec<u8>, PrimitiveError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut combined = Vec::with_capacity(ciphertext.len() + AEAD_TAG_LEN);
    combined.extend_from_slice(ciphertext);
    combined.extend_from_slice(tag);

    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: &combined,
                aad,
            },
        )
        .map_err(|_| PrimitiveError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_round_trip() {
        let key = [1u8; AEAD_KEY_LEN];
        let nonce = [2u8; AEAD_NONCE_LEN];
        let (ct, tag) = aead_seal(&key, &nonce, b"header", b"hello world");
        let pt = aead_open(&key, &nonce, b"header", &ct, &tag).unwrap();
        assert_eq!(pt, b"hello world");
    }

    #[test]
    fn open_rejects_tampered_ciphertext() {
        let key = [1u8; AEAD_KEY_LEN];
        let nonce = [2u8; AEAD_NONCE_LEN];
        let (mut ct, tag) = aead_seal(&key, &nonce, b"header", b"hello world");
        ct[0] ^= 0xff;
        assert_eq!(
            aead_open(&key, &nonce, b"header", &ct, &tag).unwrap_err(),
            PrimitiveError::DecryptionFailed
        );
    }

    #[test]
    fn open_rejects_wrong_aad() {
        let key = [1u8; AEAD_KEY_LEN];
        let nonce = [2u8; AEAD_NONCE_LEN];
        let (ct, tag) = aead_seal(&key, &nonce, b"header", b"hello world");
        assert!(aead_open(&key, &nonce, b"different-header", &ct, &tag).is_err());
    }
}

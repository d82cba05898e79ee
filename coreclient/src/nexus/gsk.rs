// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The Group Shared Key (GSK) table (§4.7, §6.5): each version of a
//! group's symmetric key, self-encrypted at rest under the owning
//! party's own KEM keypair so the on-disk blob carries no plaintext key
//! material.
//!
//! Blob layout: `kem_ciphertext[1568] || nonce[12] || tag[16] ||
//! ciphertext[32] || created_at_be_u64[8] || expires_at_be_u64[8]`, 1644
//! bytes total (this is engine-local persistent state, §6.5, not a wire
//! format — the timestamp tail is free to add to). AEAD aad is
//! `group_uuid || version_be_u32 || created_at_be_u64 ||
//! expires_at_be_u64`, binding the blob to the group, version, and
//! validity window it was written for; tampering with either timestamp
//! invalidates the tag. `expires_at` is always `created_at +
//! GSK_TTL_SECS` (§4.7 forward-secrecy rotation window).

use uuid::Uuid;

use dna_primitives::{
    aead_open, aead_seal, kem_decaps, kem_encaps, rng, KemCiphertext, KemPublicKey, KemSecretKey,
    AEAD_NONCE_LEN, KEM_CIPHERTEXT_LEN,
};

use super::error::NexusError;

pub const GSK_BLOB_LEN: usize = KEM_CIPHERTEXT_LEN + 12 + 16 + 32 + 8 + 8;
pub const GSK_TTL_SECS: u64 = 7 * 24 * 60 * 60;

fn gsk_aad(group_uuid: Uuid, version: u32, created_at: u64, expires_at: u64) -> Vec<u8> {
    let mut aad = Vec::with_capacity(16 + 4 + 8 + 8);
    aad.extend_from_slice(group_uuid.as_bytes());
    aad.extend_from_slice(&version.to_be_bytes());
    aad.extend_from_slice(&created_at.to_be_bytes());
    aad.extend_from_slice(&expires_at.to_be_bytes());
    aad
}

/// Draw a fresh random 32-byte group key.
pub fn generate_gsk_bytes() -> Result<[u8; 32], NexusError> {
    let bytes = rng(32)?;
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}

/// Self-encrypt `gsk` for storage at `(group_uuid, version)`, valid from
/// `created_at` until `created_at + GSK_TTL_SECS`.
pub fn seal_gsk_blob(
    own_kem_pk: &KemPublicKey,
    group_uuid: Uuid,
    version: u32,
    gsk: &[u8; 32],
    created_at: u64,
) -> Result<Vec<u8>, NexusError> {
    let expires_at = created_at + GSK_TTL_SECS;
    let (kem_ciphertext, shared_secret) = kem_encaps(own_kem_pk)?;
    let nonce_bytes = rng(AEAD_NONCE_LEN)?;
    let mut nonce = [0u8; AEAD_NONCE_LEN];
    nonce.copy_from_slice(&nonce_bytes);

    let aad = gsk_aad(group_uuid, version, created_at, expires_at);
    let (ciphertext, tag) = aead_seal(&shared_secret.0, &nonce, &aad, gsk);

    let mut blob = Vec::with_capacity(GSK_BLOB_LEN);
    blob.extend_from_slice(&kem_ciphertext.0);
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&tag);
    blob.extend_from_slice(&ciphertext);
    blob.extend_from_slice(&created_at.to_be_bytes());
    blob.extend_from_slice(&expires_at.to_be_bytes());
    Ok(blob)
}

struct BlobFields<'a> {
    kem_ct: [u8; KEM_CIPHERTEXT_LEN],
    nonce: [u8; 12],
    tag: [u8; 16],
    ciphertext: &'a [u8],
    created_at: u64,
    expires_at: u64,
}

fn split_blob(blob: &[u8]) -> Option<BlobFields<'_>> {
    if blob.len() != GSK_BLOB_LEN {
        return None;
    }
    let mut kem_ct = [0u8; KEM_CIPHERTEXT_LEN];
    kem_ct.copy_from_slice(&blob[0..KEM_CIPHERTEXT_LEN]);
    let nonce: [u8; 12] = blob[KEM_CIPHERTEXT_LEN..KEM_CIPHERTEXT_LEN + 12]
        .try_into()
        .unwrap();
    let tag: [u8; 16] = blob[KEM_CIPHERTEXT_LEN + 12..KEM_CIPHERTEXT_LEN + 28]
        .try_into()
        .unwrap();
    let ciphertext = &blob[KEM_CIPHERTEXT_LEN + 28..KEM_CIPHERTEXT_LEN + 28 + 32];
    let tail = &blob[KEM_CIPHERTEXT_LEN + 28 + 32..];
    let created_at = u64::from_be_bytes(tail[0..8].try_into().unwrap());
    let expires_at = u64::from_be_bytes(tail[8..16].try_into().unwrap());
    Some(BlobFields {
        kem_ct,
        nonce,
        tag,
        ciphertext,
        created_at,
        expires_at,
    })
}

/// Read `(created_at, expires_at)` from a blob without decrypting it —
/// used by `active_gsk` to pick a version before spending a KEM
/// decapsulation on it.
pub fn blob_expiry(group_uuid: Uuid, version: u32, blob: &[u8]) -> Result<(u64, u64), NexusError> {
    let fields = split_blob(blob).ok_or(NexusError::GskNotFoundForVersion(version, group_uuid))?;
    Ok((fields.created_at, fields.expires_at))
}

/// Recover the group key from a blob written by [`seal_gsk_blob`].
pub fn open_gsk_blob(
    own_kem_sk: &KemSecretKey,
    group_uuid: Uuid,
    version: u32,
    blob: &[u8],
) -> Result<[u8; 32], NexusError> {
    let fields = split_blob(blob).ok_or(NexusError::GskNotFoundForVersion(version, group_uuid))?;

    let shared_secret = kem_decaps(own_kem_sk, &KemCiphertext(fields.kem_ct))?;
    let aad = gsk_aad(group_uuid, version, fields.created_at, fields.expires_at);
    let plaintext = aead_open(&shared_secret.0, &fields.nonce, &aad, fields.ciphertext, &fields.tag)?;
    let mut gsk = [0u8; 32];
    gsk.copy_from_slice(&plaintext);
    Ok(gsk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dna_primitives::kem_keypair_from_seed;

    #[test]
    fn gsk_blob_round_trips() {
        let (pk, sk) = kem_keypair_from_seed([7u8; 32]);
        let group_uuid = Uuid::new_v4();
        let gsk = generate_gsk_bytes().unwrap();

        let blob = seal_gsk_blob(&pk, group_uuid, 1, &gsk, 1_700_000_000).unwrap();
        assert_eq!(blob.len(), GSK_BLOB_LEN);
        let recovered = open_gsk_blob(&sk, group_uuid, 1, &blob).unwrap();
        assert_eq!(recovered, gsk);
    }

    #[test]
    fn gsk_blob_bound_to_version() {
        let (pk, sk) = kem_keypair_from_seed([8u8; 32]);
        let group_uuid = Uuid::new_v4();
        let gsk = generate_gsk_bytes().unwrap();

        let blob = seal_gsk_blob(&pk, group_uuid, 1, &gsk, 1_700_000_000).unwrap();
        assert!(open_gsk_blob(&sk, group_uuid, 2, &blob).is_err());
    }

    #[test]
    fn expiry_is_created_at_plus_ttl_and_readable_without_decrypting() {
        let (pk, _sk) = kem_keypair_from_seed([9u8; 32]);
        let group_uuid = Uuid::new_v4();
        let gsk = generate_gsk_bytes().unwrap();

        let blob = seal_gsk_blob(&pk, group_uuid, 1, &gsk, 1_700_000_000).unwrap();
        let (created_at, expires_at) = blob_expiry(group_uuid, 1, &blob).unwrap();
        assert_eq!(created_at, 1_700_000_000);
        assert_eq!(expires_at, 1_700_000_000 + GSK_TTL_SECS);
    }

    #[test]
    fn tampered_expiry_fails_open() {
        let (pk, sk) = kem_keypair_from_seed([10u8; 32]);
        let group_uuid = Uuid::new_v4();
        let gsk = generate_gsk_bytes().unwrap();

        let mut blob = seal_gsk_blob(&pk, group_uuid, 1, &gsk, 1_700_000_000).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        assert!(open_gsk_blob(&sk, group_uuid, 1, &blob).is_err());
    }
}

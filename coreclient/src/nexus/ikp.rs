// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The Invitation Key Packet (IKP, §6.3): the owner-signed, per-member
//! wrapping of a group's GSK that republishes whenever membership
//! changes.
//!
//! Wire format: `magic[4]="NXIP" || version:u32be || member_count:u16be
//! || created_at:u64be`, then for each member (sorted by fingerprint):
//! `fingerprint[64] || kem_ciphertext[1568] || wrapped_entry[60]` where
//! `wrapped_entry = nonce[12] || tag[16] || ciphertext[32]`. Finally
//! `owner_fingerprint[64] || sig_len:u16be || owner_signature`. The
//! owner's signature covers every byte preceding it.

use uuid::Uuid;

use dna_common::codec::{ByteReader, ByteWriter};
use dna_common::Fingerprint;
use dna_primitives::{
    aead_open, aead_seal, dsa_sign, dsa_verify, kem_decaps, kem_encaps, rng, sha3_512,
    DsaPublicKey, DsaSecretKey, KemCiphertext, KemPublicKey, KemSecretKey, AEAD_NONCE_LEN,
    DSA_PUBLIC_KEY_LEN, KEM_CIPHERTEXT_LEN,
};

use super::error::NexusError;

pub const MAGIC: &[u8; 4] = b"NXIP";
const WRAPPED_ENTRY_LEN: usize = 12 + 16 + 32;
const MEMBER_ENTRY_LEN: usize = 64 + KEM_CIPHERTEXT_LEN + WRAPPED_ENTRY_LEN;

fn entry_aad(group_uuid: Uuid, version: u32) -> Vec<u8> {
    let mut aad = Vec::with_capacity(16 + 4);
    aad.extend_from_slice(group_uuid.as_bytes());
    aad.extend_from_slice(&version.to_be_bytes());
    aad
}

/// Build a fresh IKP. `members` pairs each recipient's fingerprint with
/// their published KEM public key; a member whose key could not be
/// resolved is skipped (logged by the caller) rather than aborting the
/// whole publication.
pub fn build_ikp(
    group_uuid: Uuid,
    version: u32,
    gsk: &[u8; 32],
    members: &[(Fingerprint, KemPublicKey)],
    owner_fingerprint: Fingerprint,
    owner_sk_dsa: &DsaSecretKey,
    created_at: u64,
) -> Result<Vec<u8>, NexusError> {
    let mut sorted: Vec<&(Fingerprint, KemPublicKey)> = members.iter().collect();
    sorted.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    let mut w = ByteWriter::new();
    w.push_bytes(MAGIC);
    w.push_u32_be(version);
    w.push_u16_be(sorted.len() as u16);
    w.push_u64_be(created_at);

    let aad = entry_aad(group_uuid, version);
    for (fp, kem_pk) in &sorted {
        let (kem_ciphertext, shared_secret) = kem_encaps(kem_pk)?;
        let nonce_bytes = rng(AEAD_NONCE_LEN)?;
        let mut nonce = [0u8; AEAD_NONCE_LEN];
        nonce.copy_from_slice(&nonce_bytes);
        let (ciphertext, tag) = aead_seal(&shared_secret.0, &nonce, &aad, gsk);

        w.push_bytes(fp.as_bytes());
        w.push_bytes(&kem_ciphertext.0);
        w.push_bytes(&nonce);
        w.push_bytes(&tag);
        w.push_bytes(&ciphertext);
    }

    w.push_bytes(owner_fingerprint.as_bytes());
    let mut out = w.into_vec();
    let signature = dsa_sign(owner_sk_dsa, &out);
    out.extend_from_slice(&(signature.len() as u16).to_be_bytes());
    out.extend_from_slice(&signature);

    Ok(out)
}

pub struct ParsedIkp {
    pub version: u32,
    pub created_at: u64,
    pub member_fingerprints: Vec<Fingerprint>,
    pub owner_fingerprint: Fingerprint,
    entries_start: usize,
    owner_fp_offset: usize,
    raw: Vec<u8>,
}

/// Parse and authenticate an IKP's envelope: magic, structure, and the
/// owner's signature. Does not unwrap any member's GSK entry.
pub fn verify_ikp(bytes: &[u8], owner_dsa_public_key: &[u8]) -> Result<ParsedIkp, NexusError> {
    let mut r = ByteReader::new(bytes);
    let magic = r
        .read_array::<4>()
        .map_err(|_| NexusError::IkpSignatureInvalid)?;
    if &magic != MAGIC {
        return Err(NexusError::IkpSignatureInvalid);
    }
    let version = r.read_u32_be()?;
    let member_count = r.read_u16_be()? as usize;
    let created_at = r.read_u64_be()?;

    let entries_start = 4 + 4 + 2 + 8;
    let mut member_fingerprints = Vec::with_capacity(member_count);
    for _ in 0..member_count {
        let fp_bytes = r.read_bytes(64)?;
        member_fingerprints.push(
            Fingerprint::from_bytes(fp_bytes).map_err(|_| NexusError::IkpSignatureInvalid)?,
        );
        r.read_bytes(KEM_CIPHERTEXT_LEN)?;
        r.read_bytes(WRAPPED_ENTRY_LEN)?;
    }

    let owner_fp_offset = entries_start + member_count * MEMBER_ENTRY_LEN;
    let owner_fp_bytes = r.read_bytes(64)?;
    let owner_fingerprint =
        Fingerprint::from_bytes(owner_fp_bytes).map_err(|_| NexusError::IkpSignatureInvalid)?;
    if owner_fingerprint != Fingerprint::of_dsa_public_key(owner_dsa_public_key) {
        return Err(NexusError::IkpSignatureInvalid);
    }

    let sig_len = r.read_u16_be()? as usize;
    let signature = r.read_bytes(sig_len)?;

    let signed_region = &bytes[..owner_fp_offset + 64];
    let mut pk_bytes = [0u8; DSA_PUBLIC_KEY_LEN];
    if owner_dsa_public_key.len() != DSA_PUBLIC_KEY_LEN {
        return Err(NexusError::IkpSignatureInvalid);
    }
    pk_bytes.copy_from_slice(owner_dsa_public_key);
    dsa_verify(&DsaPublicKey(pk_bytes), signed_region, signature)
        .map_err(|_| NexusError::IkpSignatureInvalid)?;

    Ok(ParsedIkp {
        version,
        created_at,
        member_fingerprints,
        owner_fingerprint,
        entries_start,
        owner_fp_offset,
        raw: bytes.to_vec(),
    })
}

impl ParsedIkp {
    /// Locate and unwrap `self_fingerprint`'s entry, recovering the GSK.
    pub fn extract_for(
        &self,
        self_fingerprint: Fingerprint,
        self_kem_sk: &KemSecretKey,
        group_uuid: Uuid,
    ) -> Result<[u8; 32], NexusError> {
        let _ = self.owner_fp_offset;
        for (i, fp) in self.member_fingerprints.iter().enumerate() {
            if *fp != self_fingerprint {
                continue;
            }
            let offset = self.entries_start + i * MEMBER_ENTRY_LEN;
            let entry = &self.raw[offset..offset + MEMBER_ENTRY_LEN];
            let kem_ct_bytes = &entry[64..64 + KEM_CIPHERTEXT_LEN];
            let wrapped = &entry[64 + KEM_CIPHERTEXT_LEN..];
            let nonce: [u8; 12] = wrapped[0..12].try_into().unwrap();
            let tag: [u8; 16] = wrapped[12..28].try_into().unwrap();
            let ciphertext = &wrapped[28..];

            let mut kem_ct = [0u8; KEM_CIPHERTEXT_LEN];
            kem_ct.copy_from_slice(kem_ct_bytes);
            let shared_secret = kem_decaps(self_kem_sk, &KemCiphertext(kem_ct))
                .map_err(|_| NexusError::IkpUnwrapFailed)?;

            let aad = entry_aad(group_uuid, self.version);
            let plaintext = aead_open(&shared_secret.0, &nonce, &aad, ciphertext, &tag)
                .map_err(|_| NexusError::IkpUnwrapFailed)?;
            let mut gsk = [0u8; 32];
            gsk.copy_from_slice(&plaintext);
            return Ok(gsk);
        }
        Err(NexusError::IkpNoEntryForSelf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dna_primitives::{dsa_keypair_from_seed, kem_keypair_from_seed};

    fn fp(b: u8) -> Fingerprint {
        Fingerprint::from_bytes(&[b; 64]).unwrap()
    }

    #[test]
    fn build_verify_extract_round_trip() {
        let (owner_pk, owner_sk) = dsa_keypair_from_seed([1u8; 32]);
        let owner_fp = Fingerprint::of_dsa_public_key(&owner_pk.0);

        let (member_kem_pk, member_kem_sk) = kem_keypair_from_seed([2u8; 32]);
        let member_fp = fp(9);

        let group_uuid = Uuid::new_v4();
        let gsk = [0x42u8; 32];

        let ikp = build_ikp(
            group_uuid,
            1,
            &gsk,
            &[(member_fp, member_kem_pk)],
            owner_fp,
            &owner_sk,
            1_700_000_000,
        )
        .unwrap();

        let parsed = verify_ikp(&ikp, &owner_pk.0).unwrap();
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.owner_fingerprint, owner_fp);
        assert_eq!(parsed.member_fingerprints, vec![member_fp]);

        let recovered = parsed.extract_for(member_fp, &member_kem_sk, group_uuid).unwrap();
        assert_eq!(recovered, gsk);
    }

    #[test]
    fn extract_fails_for_absent_member() {
        let (owner_pk, owner_sk) = dsa_keypair_from_seed([3u8; 32]);
        let owner_fp = Fingerprint::of_dsa_public_key(&owner_pk.0);
        let (member_kem_pk, _member_kem_sk) = kem_keypair_from_seed([4u8; 32]);
        let group_uuid = Uuid::new_v4();

        let ikp = build_ikp(
            group_uuid,
            1,
            &[0x11u8; 32],
            &[(fp(5), member_kem_pk)],
            owner_fp,
            &owner_sk,
            1_700_000_000,
        )
        .unwrap();

        let parsed = verify_ikp(&ikp, &owner_pk.0).unwrap();
        let (_, outsider_kem_sk) = kem_keypair_from_seed([6u8; 32]);
        let err = parsed.extract_for(fp(7), &outsider_kem_sk, group_uuid).unwrap_err();
        assert!(matches!(err, NexusError::IkpNoEntryForSelf));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let (owner_pk, owner_sk) = dsa_keypair_from_seed([10u8; 32]);
        let owner_fp = Fingerprint::of_dsa_public_key(&owner_pk.0);
        let (member_kem_pk, _) = kem_keypair_from_seed([11u8; 32]);
        let group_uuid = Uuid::new_v4();

        let mut ikp = build_ikp(
            group_uuid,
            1,
            &[0x22u8; 32],
            &[(fp(12), member_kem_pk)],
            owner_fp,
            &owner_sk,
            1_700_000_000,
        )
        .unwrap();
        let last = ikp.len() - 1;
        ikp[last] ^= 0xff;

        assert!(verify_ikp(&ikp, &owner_pk.0).is_err());
    }
}

// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Seal (§4.6): the per-message encrypted envelope. Two variants share
//! one wire format (§6.1) — a per-recipient KEM-wrapped DEK (`msg_type =
//! 0`), or a single entry wrapped under a Nexus group key (`msg_type =
//! 1`, `kem_ciphertext` left zeroed since there is no recipient KEM
//! ciphertext to carry). A Nexus envelope names no GSK version on the
//! wire; the opener tries its locally known GSKs newest-first (the same
//! first-success-wins shape `open` uses across multi-recipient entries)
//! rather than trusting a sender-supplied version number.

mod error;
mod wire;

pub use error::SealError;
pub use wire::DEFAULT_MAX_ENVELOPE_LEN;

use dna_common::Fingerprint;
use dna_primitives::{
    aead_open, aead_seal, aes_keyunwrap, aes_keywrap, dsa_sign, dsa_verify, kem_decaps, kem_encaps,
    sha3_512, DsaPublicKey, DsaSecretKey, KemPublicKey, KemSecretKey, AEAD_NONCE_LEN, DEK_LEN,
};

use wire::{
    Header, HEADER_LEN, KEM_CIPHERTEXT_LEN, MAX_RECIPIENTS, MSG_TYPE_NEXUS, MSG_TYPE_SEAL,
    NONCE_LEN, RECIPIENT_ENTRY_LEN, TAG_LEN, WRAPPED_DEK_LEN,
};

struct RecipientEntry {
    kem_ciphertext: [u8; KEM_CIPHERTEXT_LEN],
    wrapped_dek: [u8; WRAPPED_DEK_LEN],
}

fn build_payload(sender_fp: Fingerprint, timestamp: u64, plaintext: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(64 + 8 + plaintext.len());
    payload.extend_from_slice(sender_fp.as_bytes());
    payload.extend_from_slice(&timestamp.to_be_bytes());
    payload.extend_from_slice(plaintext);
    payload
}

fn assemble(header: Header, entries: &[RecipientEntry], nonce: [u8; NONCE_LEN], ciphertext: &[u8], tag: [u8; TAG_LEN], signature: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(wire::expected_total_len(&header));
    out.extend_from_slice(&header.encode());
    for entry in entries {
        out.extend_from_slice(&entry.kem_ciphertext);
        out.extend_from_slice(&entry.wrapped_dek);
    }
    out.extend_from_slice(&nonce);
    out.extend_from_slice(ciphertext);
    out.extend_from_slice(&tag);
    out.extend_from_slice(signature);
    out
}

/// Encode a per-recipient Seal envelope (`msg_type = 0`, §4.6 steps 1-7).
pub fn seal(
    plaintext: &[u8],
    recipients: &[KemPublicKey],
    sender_sk_dsa: &DsaSecretKey,
    sender_fp: Fingerprint,
    timestamp: u64,
) -> Result<Vec<u8>, SealError> {
    if recipients.is_empty() || recipients.len() > MAX_RECIPIENTS {
        return Err(SealError::InvalidRecipientCount);
    }

    let dek_bytes = dna_primitives::rng(DEK_LEN)?;
    let mut dek = [0u8; DEK_LEN];
    dek.copy_from_slice(&dek_bytes);
    let nonce_bytes = dna_primitives::rng(AEAD_NONCE_LEN)?;
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&nonce_bytes);

    let payload = build_payload(sender_fp, timestamp, plaintext);
    let signature = dsa_sign(sender_sk_dsa, plaintext);

    let mut entries = Vec::with_capacity(recipients.len());
    for pk in recipients {
        let (ct, ss) = kem_encaps(pk)?;
        let wrapped = aes_keywrap(&ss.0, &dek);
        entries.push(RecipientEntry {
            kem_ciphertext: ct.0,
            wrapped_dek: wrapped,
        });
    }

    let header = Header {
        rcpt_count: recipients.len() as u8,
        msg_type: MSG_TYPE_SEAL,
        encrypted_size: payload.len() as u32,
        signature_size: signature.len() as u32,
    };
    let (ciphertext, tag) = aead_seal(&dek, &nonce, &header.encode(), &payload);

    Ok(assemble(
        header,
        &entries,
        nonce,
        &ciphertext,
        tag,
        signature.as_slice(),
    ))
}

/// Encode a Nexus group envelope (`msg_type = 1`): a single entry,
/// wrapped under the group's GSK rather than a per-recipient KEM
/// ciphertext. `kem_ciphertext` is left zeroed per §6.1 — there is no
/// recipient KEM ciphertext in the Nexus variant, and the version the
/// opener should try isn't carried on the wire at all (see [`open_nexus`]).
pub fn seal_nexus(
    plaintext: &[u8],
    gsk: &[u8; 32],
    sender_sk_dsa: &DsaSecretKey,
    sender_fp: Fingerprint,
    timestamp: u64,
) -> Result<Vec<u8>, SealError> {
    let dek_bytes = dna_primitives::rng(DEK_LEN)?;
    let mut dek = [0u8; DEK_LEN];
    dek.copy_from_slice(&dek_bytes);
    let nonce_bytes = dna_primitives::rng(AEAD_NONCE_LEN)?;
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&nonce_bytes);

    let payload = build_payload(sender_fp, timestamp, plaintext);
    let signature = dsa_sign(sender_sk_dsa, plaintext);

    let kem_ciphertext = [0u8; KEM_CIPHERTEXT_LEN];
    let wrapped = aes_keywrap(gsk, &dek);

    let header = Header {
        rcpt_count: 1,
        msg_type: MSG_TYPE_NEXUS,
        encrypted_size: payload.len() as u32,
        signature_size: signature.len() as u32,
    };
    let (ciphertext, tag) = aead_seal(&dek, &nonce, &header.encode(), &payload);

    Ok(assemble(
        header,
        &[RecipientEntry {
            kem_ciphertext,
            wrapped_dek: wrapped,
        }],
        nonce,
        &ciphertext,
        tag,
        signature.as_slice(),
    ))
}

/// Parse the header and validate declared sizes without touching the
/// signed/encrypted body. Used by callers that need to branch on
/// `msg_type` (e.g. the pipeline routing to Nexus) before fully opening.
pub fn peek_header(envelope: &[u8], max_len: usize) -> Result<Header, SealError> {
    if envelope.len() > max_len {
        return Err(SealError::EnvelopeTooLarge {
            size: envelope.len(),
            cap: max_len,
        });
    }
    let header = Header::decode(envelope)?;
    if header.rcpt_count == 0 || header.rcpt_count as usize > MAX_RECIPIENTS {
        return Err(SealError::InvalidRecipientCount);
    }
    let expected = wire::expected_total_len(&header);
    if expected > max_len {
        return Err(SealError::EnvelopeTooLarge {
            size: expected,
            cap: max_len,
        });
    }
    if expected != envelope.len() {
        return Err(SealError::Malformed(format!(
            "declared size {expected} does not match envelope length {}",
            envelope.len()
        )));
    }
    Ok(header)
}

fn finish_open(
    header: &Header,
    nonce: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
    signature: &[u8],
    dek: &[u8; 32],
    sender_pk_dsa: &DsaPublicKey,
) -> Result<(Fingerprint, u64, Vec<u8>), SealError> {
    let header_bytes = header.encode();
    let mut nonce_arr = [0u8; NONCE_LEN];
    nonce_arr.copy_from_slice(nonce);
    let mut tag_arr = [0u8; TAG_LEN];
    tag_arr.copy_from_slice(tag);

    let payload = aead_open(dek, &nonce_arr, &header_bytes, ciphertext, &tag_arr)
        .map_err(|_| SealError::DecryptionFailed)?;
    if payload.len() < 64 + 8 {
        return Err(SealError::Malformed("payload too short".into()));
    }
    let sender_fp_bytes = &payload[0..64];
    let timestamp = u64::from_be_bytes(payload[64..72].try_into().unwrap());
    let plaintext = payload[72..].to_vec();

    if sender_fp_bytes != sha3_512(&sender_pk_dsa.0).as_slice() {
        return Err(SealError::IdentityMismatch);
    }
    dsa_verify(sender_pk_dsa, &plaintext, signature).map_err(|_| SealError::SignatureInvalid)?;

    let sender_fp = Fingerprint::from_bytes(sender_fp_bytes)
        .map_err(|_| SealError::Malformed("bad sender fingerprint".into()))?;
    Ok((sender_fp, timestamp, plaintext))
}

/// Decode a per-recipient Seal envelope. Tries `my_sk_kem` against every
/// recipient entry until one decapsulates and unwraps; the first success
/// wins (duplicate entries are simply redundant).
pub fn open(
    envelope: &[u8],
    my_sk_kem: &KemSecretKey,
    sender_pk_dsa: &DsaPublicKey,
    max_len: usize,
) -> Result<(Fingerprint, u64, Vec<u8>), SealError> {
    let header = peek_header(envelope, max_len)?;
    if header.msg_type != MSG_TYPE_SEAL {
        return Err(SealError::Malformed("not a seal envelope".into()));
    }

    let entries_len = header.rcpt_count as usize * RECIPIENT_ENTRY_LEN;
    let entries_bytes = &envelope[HEADER_LEN..HEADER_LEN + entries_len];
    let after_entries = HEADER_LEN + entries_len;
    let nonce = &envelope[after_entries..after_entries + NONCE_LEN];
    let ct_start = after_entries + NONCE_LEN;
    let ciphertext = &envelope[ct_start..ct_start + header.encrypted_size as usize];
    let tag_start = ct_start + header.encrypted_size as usize;
    let tag = &envelope[tag_start..tag_start + TAG_LEN];
    let sig_start = tag_start + TAG_LEN;
    let signature = &envelope[sig_start..sig_start + header.signature_size as usize];

    for chunk in entries_bytes.chunks_exact(RECIPIENT_ENTRY_LEN) {
        let mut ct_bytes = [0u8; KEM_CIPHERTEXT_LEN];
        ct_bytes.copy_from_slice(&chunk[0..KEM_CIPHERTEXT_LEN]);
        let wrapped: [u8; WRAPPED_DEK_LEN] = chunk[KEM_CIPHERTEXT_LEN..].try_into().unwrap();

        let ct = dna_primitives::KemCiphertext(ct_bytes);
        let Ok(ss) = kem_decaps(my_sk_kem, &ct) else {
            continue;
        };
        let Ok(dek) = aes_keyunwrap(&ss.0, &wrapped) else {
            continue;
        };

        return finish_open(&header, nonce, ciphertext, tag, signature, &dek, sender_pk_dsa);
    }

    Err(SealError::NoMatchingRecipient)
}

/// Decode a Nexus envelope under a single candidate `gsk`. The caller
/// (Nexus) is responsible for trying whichever locally known group keys
/// are plausible; a wrong `gsk` simply fails AEAD verification here.
pub fn open_nexus(
    envelope: &[u8],
    gsk: &[u8; 32],
    sender_pk_dsa: &DsaPublicKey,
    max_len: usize,
) -> Result<(Fingerprint, u64, Vec<u8>), SealError> {
    let header = peek_header(envelope, max_len)?;
    if header.msg_type != MSG_TYPE_NEXUS {
        return Err(SealError::Malformed("not a nexus envelope".into()));
    }

    let entries_len = RECIPIENT_ENTRY_LEN;
    let entry = &envelope[HEADER_LEN..HEADER_LEN + entries_len];
    let wrapped: [u8; WRAPPED_DEK_LEN] = entry[KEM_CIPHERTEXT_LEN..].try_into().unwrap();
    let dek = aes_keyunwrap(gsk, &wrapped).map_err(|_| SealError::DecryptionFailed)?;

    let after_entries = HEADER_LEN + entries_len;
    let nonce = &envelope[after_entries..after_entries + NONCE_LEN];
    let ct_start = after_entries + NONCE_LEN;
    let ciphertext = &envelope[ct_start..ct_start + header.encrypted_size as usize];
    let tag_start = ct_start + header.encrypted_size as usize;
    let tag = &envelope[tag_start..tag_start + TAG_LEN];
    let sig_start = tag_start + TAG_LEN;
    let signature = &envelope[sig_start..sig_start + header.signature_size as usize];

    finish_open(&header, nonce, ciphertext, tag, signature, &dek, sender_pk_dsa)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dna_primitives::{dsa_keypair_from_seed, kem_keypair_from_seed};

    fn fp_of(bytes: &[u8]) -> Fingerprint {
        Fingerprint::of_dsa_public_key(bytes)
    }

    #[test]
    fn seal_open_round_trip_single_recipient() {
        let (dsa_pk, dsa_sk) = dsa_keypair_from_seed([1u8; 32]);
        let (kem_pk, kem_sk) = kem_keypair_from_seed([2u8; 32]);
        let sender_fp = fp_of(&dsa_pk.0);

        let env = seal(b"hi", &[kem_pk], &dsa_sk, sender_fp, 1_700_000_000).unwrap();
        let (fp, ts, pt) = open(&env, &kem_sk, &dsa_pk, DEFAULT_MAX_ENVELOPE_LEN).unwrap();
        assert_eq!(fp, sender_fp);
        assert_eq!(ts, 1_700_000_000);
        assert_eq!(pt, b"hi");
    }

    #[test]
    fn seal_open_round_trip_multi_recipient_each_can_open() {
        let (dsa_pk, dsa_sk) = dsa_keypair_from_seed([3u8; 32]);
        let sender_fp = fp_of(&dsa_pk.0);
        let (kem_pk_a, kem_sk_a) = kem_keypair_from_seed([4u8; 32]);
        let (kem_pk_b, kem_sk_b) = kem_keypair_from_seed([5u8; 32]);

        let env = seal(
            b"group hello",
            &[kem_pk_a, kem_pk_b],
            &dsa_sk,
            sender_fp,
            1_700_000_001,
        )
        .unwrap();

        let (_, _, pt_a) = open(&env, &kem_sk_a, &dsa_pk, DEFAULT_MAX_ENVELOPE_LEN).unwrap();
        let (_, _, pt_b) = open(&env, &kem_sk_b, &dsa_pk, DEFAULT_MAX_ENVELOPE_LEN).unwrap();
        assert_eq!(pt_a, b"group hello");
        assert_eq!(pt_b, b"group hello");
    }

    #[test]
    fn recipient_not_addressed_cannot_open() {
        let (dsa_pk, dsa_sk) = dsa_keypair_from_seed([6u8; 32]);
        let sender_fp = fp_of(&dsa_pk.0);
        let (kem_pk, _kem_sk) = kem_keypair_from_seed([7u8; 32]);
        let (_, other_sk) = kem_keypair_from_seed([8u8; 32]);

        let env = seal(b"secret", &[kem_pk], &dsa_sk, sender_fp, 1_700_000_002).unwrap();
        let err = open(&env, &other_sk, &dsa_pk, DEFAULT_MAX_ENVELOPE_LEN).unwrap_err();
        assert!(matches!(err, SealError::NoMatchingRecipient));
    }

    #[test]
    fn tampering_each_section_breaks_open() {
        let (dsa_pk, dsa_sk) = dsa_keypair_from_seed([9u8; 32]);
        let sender_fp = fp_of(&dsa_pk.0);
        let (kem_pk, kem_sk) = kem_keypair_from_seed([10u8; 32]);
        let env = seal(b"tamper me", &[kem_pk], &dsa_sk, sender_fp, 1_700_000_003).unwrap();

        for i in 0..env.len() {
            let mut tampered = env.clone();
            tampered[i] ^= 0x01;
            let result = open(&tampered, &kem_sk, &dsa_pk, DEFAULT_MAX_ENVELOPE_LEN);
            assert!(result.is_err(), "byte {i} tamper did not break open()");
        }
    }

    #[test]
    fn zero_recipients_is_rejected() {
        let (dsa_pk, dsa_sk) = dsa_keypair_from_seed([11u8; 32]);
        let sender_fp = fp_of(&dsa_pk.0);
        let err = seal(b"x", &[], &dsa_sk, sender_fp, 0).unwrap_err();
        assert!(matches!(err, SealError::InvalidRecipientCount));
    }

    #[test]
    fn empty_plaintext_is_legal() {
        let (dsa_pk, dsa_sk) = dsa_keypair_from_seed([12u8; 32]);
        let sender_fp = fp_of(&dsa_pk.0);
        let (kem_pk, kem_sk) = kem_keypair_from_seed([13u8; 32]);
        let env = seal(b"", &[kem_pk], &dsa_sk, sender_fp, 0).unwrap();
        let (_, _, pt) = open(&env, &kem_sk, &dsa_pk, DEFAULT_MAX_ENVELOPE_LEN).unwrap();
        assert!(pt.is_empty());
    }

    #[test]
    fn nexus_round_trip_leaves_kem_ciphertext_zeroed() {
        let (dsa_pk, dsa_sk) = dsa_keypair_from_seed([14u8; 32]);
        let sender_fp = fp_of(&dsa_pk.0);
        let gsk = [0x42u8; 32];

        let env = seal_nexus(b"group msg", &gsk, &dsa_sk, sender_fp, 1_700_000_004).unwrap();
        assert_eq!(&env[HEADER_LEN..HEADER_LEN + KEM_CIPHERTEXT_LEN], &[0u8; KEM_CIPHERTEXT_LEN][..]);

        let (fp, _, pt) = open_nexus(&env, &gsk, &dsa_pk, DEFAULT_MAX_ENVELOPE_LEN).unwrap();
        assert_eq!(fp, sender_fp);
        assert_eq!(pt, b"group msg");
    }

    #[test]
    fn nexus_wrong_gsk_fails() {
        let (dsa_pk, dsa_sk) = dsa_keypair_from_seed([15u8; 32]);
        let sender_fp = fp_of(&dsa_pk.0);
        let gsk = [0x11u8; 32];
        let wrong_gsk = [0x22u8; 32];
        let env = seal_nexus(b"secret", &gsk, &dsa_sk, sender_fp, 0).unwrap();
        assert!(open_nexus(&env, &wrong_gsk, &dsa_pk, DEFAULT_MAX_ENVELOPE_LEN).is_err());
    }

    #[test]
    fn oversized_declared_length_is_rejected_before_parsing_body() {
        let (dsa_pk, dsa_sk) = dsa_keypair_from_seed([16u8; 32]);
        let sender_fp = fp_of(&dsa_pk.0);
        let (kem_pk, kem_sk) = kem_keypair_from_seed([17u8; 32]);
        let mut env = seal(b"hi", &[kem_pk], &dsa_sk, sender_fp, 0).unwrap();
        // Corrupt the declared encrypted_size (bytes 12..16, little-endian)
        // to something absurd.
        env[12..16].copy_from_slice(&(DEFAULT_MAX_ENVELOPE_LEN as u32).to_le_bytes());
        let err = open(&env, &kem_sk, &dsa_pk, DEFAULT_MAX_ENVELOPE_LEN).unwrap_err();
        assert!(matches!(
            err,
            SealError::EnvelopeTooLarge { .. } | SealError::Malformed(_)
        ));
    }
}

// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Anchor (§4.2): a party's own keypairs, the signed identity record
//! that represents them on the DHT, and at-rest encryption of both.

mod error;
mod record;

pub use error::IdentityError;
pub use record::{sign_record, verify_record, IdentityRecord, MAX_AVATAR_B64_LEN};

use std::path::Path;

use bip39::Mnemonic;
use zeroize::Zeroizing;

use dna_common::Fingerprint;
use dna_primitives::{
    aead_open, aead_seal, dsa_keypair_from_seed, kem_keypair_from_seed, pbkdf2_hmac_sha512_mnemonic,
    pbkdf2_sha256, rng, DsaSecretKey, KemSecretKey, DSA_SECRET_KEY_LEN, KEM_SECRET_KEY_LEN,
};

const PLAIN_MAGIC: &[u8; 4] = b"DNAP";
const ENCRYPTED_MAGIC: &[u8; 4] = b"DNAK";
const SALT_LEN: usize = 32;

/// A party's full identity: private keys plus the public, signed
/// record derived from them.
pub struct Identity {
    pub dsa_sk: DsaSecretKey,
    pub kem_sk: KemSecretKey,
    pub record: IdentityRecord,
    mnemonic: Zeroizing<String>,
}

impl Identity {
    pub fn fingerprint(&self) -> Fingerprint {
        self.record.fingerprint
    }
}

/// Derive a full identity from a BIP-39 mnemonic and optional passphrase
/// (§4.2): PBKDF2-HMAC-SHA512 (2048 iterations) over the mnemonic with
/// salt `"mnemonic" || passphrase` produces a 64-byte master, split into
/// two 32-byte seeds for the DSA and KEM keypairs.
pub fn generate_from_mnemonic(
    mnemonic: &str,
    passphrase: &str,
    now: u64,
) -> Result<Identity, IdentityError> {
    Mnemonic::parse(mnemonic).map_err(|_| IdentityError::MnemonicInvalid)?;

    let master = pbkdf2_hmac_sha512_mnemonic(mnemonic, passphrase);
    let mut dsa_seed = [0u8; 32];
    let mut kem_seed = [0u8; 32];
    dsa_seed.copy_from_slice(&master[0..32]);
    kem_seed.copy_from_slice(&master[32..64]);

    let (dsa_pk, dsa_sk) = dsa_keypair_from_seed(dsa_seed);
    let (kem_pk, kem_sk) = kem_keypair_from_seed(kem_seed);
    let fingerprint = Fingerprint::of_dsa_public_key(&dsa_pk.0);

    let mut record = IdentityRecord {
        fingerprint,
        dsa_public_key: dsa_pk.0.to_vec(),
        kem_public_key: kem_pk.0.to_vec(),
        name: None,
        name_registered_at: None,
        name_expires_at: None,
        name_version: None,
        display_name: None,
        bio: None,
        avatar_base64: None,
        location: None,
        website: None,
        wallet_addresses: vec![],
        social_handles: vec![],
        created_at: now,
        updated_at: now,
        timestamp: now,
        version: 1,
        signature: None,
    };
    sign_record(&dsa_sk, &mut record)?;

    Ok(Identity {
        dsa_sk,
        kem_sk,
        record,
        mnemonic: Zeroizing::new(mnemonic.to_string()),
    })
}

fn seal_one(kek: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, IdentityError> {
    let nonce_bytes = rng(12)?;
    let mut nonce = [0u8; 12];
    nonce.copy_from_slice(&nonce_bytes);
    let (ciphertext, tag) = aead_seal(kek, &nonce, b"", plaintext);

    let mut out = Vec::with_capacity(12 + 4 + ciphertext.len() + 16);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&(ciphertext.len() as u32).to_be_bytes());
    out.extend_from_slice(&ciphertext);
    out.extend_from_slice(&tag);
    Ok(out)
}

fn open_one(kek: &[u8; 32], framed: &[u8]) -> Result<Vec<u8>, IdentityError> {
    if framed.len() < 12 + 4 + 16 {
        return Err(IdentityError::Corrupt("entry too short".to_string()));
    }
    let nonce: [u8; 12] = framed[0..12].try_into().unwrap();
    let ct_len = u32::from_be_bytes(framed[12..16].try_into().unwrap()) as usize;
    if framed.len() != 12 + 4 + ct_len + 16 {
        return Err(IdentityError::Corrupt("entry length mismatch".to_string()));
    }
    let ciphertext = &framed[16..16 + ct_len];
    let tag: [u8; 16] = framed[16 + ct_len..].try_into().unwrap();
    aead_open(kek, &nonce, b"", ciphertext, &tag).map_err(|_| IdentityError::PasswordIncorrect)
}

/// Persist `identity` to `path`. If `password` is given, a 32-byte KEK
/// is derived via PBKDF2-SHA256 (210,000 iterations) over a fresh
/// 32-byte salt, and each secret (DSA key, KEM key, mnemonic) is
/// AEAD-sealed under it with its own fresh nonce. Without a password the
/// secrets are stored plainly, under a distinct magic, as an explicit
/// user choice.
pub fn save_encrypted(
    identity: &Identity,
    path: impl AsRef<Path>,
    password: Option<&str>,
) -> Result<(), IdentityError> {
    let record_bytes = dna_common::codec::canonical_json_bytes(&identity.record)?;

    let mut file = Vec::new();
    match password {
        Some(password) => {
            let salt_bytes = rng(SALT_LEN)?;
            let mut salt = [0u8; SALT_LEN];
            salt.copy_from_slice(&salt_bytes);
            let kek = pbkdf2_sha256(password.as_bytes(), &salt);

            file.extend_from_slice(ENCRYPTED_MAGIC);
            file.extend_from_slice(&salt);
            for plaintext in [
                identity.dsa_sk.to_bytes().to_vec(),
                identity.kem_sk.to_bytes().to_vec(),
                identity.mnemonic.as_bytes().to_vec(),
                record_bytes,
            ] {
                let entry = seal_one(&kek, &plaintext)?;
                file.extend_from_slice(&entry);
            }
        }
        None => {
            file.extend_from_slice(PLAIN_MAGIC);
            for plaintext in [
                identity.dsa_sk.to_bytes().to_vec(),
                identity.kem_sk.to_bytes().to_vec(),
                identity.mnemonic.as_bytes().to_vec(),
                record_bytes,
            ] {
                file.extend_from_slice(&(plaintext.len() as u32).to_be_bytes());
                file.extend_from_slice(&plaintext);
            }
        }
    }

    std::fs::write(path, file)?;
    Ok(())
}

/// Load an identity previously written by [`save_encrypted`].
pub fn load_encrypted(
    path: impl AsRef<Path>,
    password: Option<&str>,
) -> Result<Identity, IdentityError> {
    let file = std::fs::read(path)?;
    if file.len() < 4 {
        return Err(IdentityError::Corrupt("file too short".to_string()));
    }
    let magic = &file[0..4];

    let fields: Vec<Vec<u8>> = if magic == ENCRYPTED_MAGIC {
        let password = password.ok_or(IdentityError::PasswordIncorrect)?;
        if file.len() < 4 + SALT_LEN {
            return Err(IdentityError::Corrupt("missing salt".to_string()));
        }
        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&file[4..4 + SALT_LEN]);
        let kek = pbkdf2_sha256(password.as_bytes(), &salt);

        let mut cursor = 4 + SALT_LEN;
        let mut out = Vec::with_capacity(4);
        for _ in 0..4 {
            if cursor + 16 > file.len() {
                return Err(IdentityError::Corrupt("truncated entry header".to_string()));
            }
            let ct_len =
                u32::from_be_bytes(file[cursor + 12..cursor + 16].try_into().unwrap()) as usize;
            let entry_len = 12 + 4 + ct_len + 16;
            if cursor + entry_len > file.len() {
                return Err(IdentityError::Corrupt("truncated entry body".to_string()));
            }
            let entry = &file[cursor..cursor + entry_len];
            out.push(open_one(&kek, entry)?);
            cursor += entry_len;
        }
        out
    } else if magic == PLAIN_MAGIC {
        let mut cursor = 4;
        let mut out = Vec::with_capacity(4);
        for _ in 0..4 {
            if cursor + 4 > file.len() {
                return Err(IdentityError::Corrupt("truncated length prefix".to_string()));
            }
            let len = u32::from_be_bytes(file[cursor..cursor + 4].try_into().unwrap()) as usize;
            cursor += 4;
            if cursor + len > file.len() {
                return Err(IdentityError::Corrupt("truncated field".to_string()));
            }
            out.push(file[cursor..cursor + len].to_vec());
            cursor += len;
        }
        out
    } else {
        return Err(IdentityError::Corrupt("unrecognized magic".to_string()));
    };

    let [dsa_sk_bytes, kem_sk_bytes, mnemonic_bytes, record_bytes] = <[Vec<u8>; 4]>::try_from(fields)
        .map_err(|_| IdentityError::Corrupt("wrong field count".to_string()))?;

    if dsa_sk_bytes.len() != DSA_SECRET_KEY_LEN || kem_sk_bytes.len() != KEM_SECRET_KEY_LEN {
        return Err(IdentityError::Corrupt("secret key length mismatch".to_string()));
    }
    let dsa_sk_array: [u8; DSA_SECRET_KEY_LEN] = dsa_sk_bytes
        .try_into()
        .map_err(|_| IdentityError::Corrupt("dsa secret key length mismatch".to_string()))?;
    let kem_sk_array: [u8; KEM_SECRET_KEY_LEN] = kem_sk_bytes
        .try_into()
        .map_err(|_| IdentityError::Corrupt("kem secret key length mismatch".to_string()))?;
    let dsa_sk = DsaSecretKey::from_bytes(&dsa_sk_array)?;
    let kem_sk = KemSecretKey::from_bytes(kem_sk_array);
    let mnemonic = String::from_utf8(mnemonic_bytes)
        .map_err(|_| IdentityError::Corrupt("mnemonic is not utf8".to_string()))?;

    let record: IdentityRecord = serde_json::from_slice(&record_bytes)
        .map_err(|e| IdentityError::Corrupt(e.to_string()))?;
    verify_record(&record)?;

    Ok(Identity {
        dsa_sk,
        kem_sk,
        record,
        mnemonic: Zeroizing::new(mnemonic),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn generation_is_deterministic_in_keys() {
        let id_a = generate_from_mnemonic(
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
            "",
            1_700_000_000,
        )
        .unwrap();
        let id_b = generate_from_mnemonic(
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
            "",
            1_700_000_001,
        )
        .unwrap();
        assert_eq!(id_a.record.dsa_public_key, id_b.record.dsa_public_key);
        assert_eq!(id_a.record.kem_public_key, id_b.record.kem_public_key);
        assert_eq!(id_a.fingerprint(), id_b.fingerprint());
    }

    #[test]
    fn invalid_mnemonic_is_rejected() {
        let err = generate_from_mnemonic("not a real mnemonic phrase", "", 0).unwrap_err();
        assert!(matches!(err, IdentityError::MnemonicInvalid));
    }

    #[test]
    fn save_load_round_trip_with_password() {
        let identity = generate_from_mnemonic(
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
            "",
            1_700_000_000,
        )
        .unwrap();
        let file = NamedTempFile::new().unwrap();
        save_encrypted(&identity, file.path(), Some("correct horse")).unwrap();

        let loaded = load_encrypted(file.path(), Some("correct horse")).unwrap();
        assert_eq!(loaded.fingerprint(), identity.fingerprint());

        let err = load_encrypted(file.path(), Some("wrong password")).unwrap_err();
        assert!(matches!(err, IdentityError::PasswordIncorrect));
    }

    #[test]
    fn save_load_round_trip_without_password() {
        let identity = generate_from_mnemonic(
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
            "",
            1_700_000_000,
        )
        .unwrap();
        let file = NamedTempFile::new().unwrap();
        save_encrypted(&identity, file.path(), None).unwrap();
        let loaded = load_encrypted(file.path(), None).unwrap();
        assert_eq!(loaded.fingerprint(), identity.fingerprint());
    }
}

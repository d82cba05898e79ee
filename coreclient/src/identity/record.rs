// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The signed identity record (Anchor, §3/§4.2): canonical key-sorted,
//! whitespace-free JSON so that `sign_record`/`verify_record` agree
//! byte-for-byte across implementations.

use serde::{Deserialize, Serialize};

use dna_common::{codec::canonical_json_bytes, fingerprint::looks_like_fingerprint, Fingerprint};
use dna_primitives::{dsa_sign, dsa_verify, DsaPublicKey, DsaSecretKey};

use super::error::IdentityError;

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

/// Max encoded size of the `avatar` field (base64 of a ≤20 KiB image).
pub const MAX_AVATAR_B64_LEN: usize = 20 * 1024 * 4 / 3 + 8;

fn validate_name(name: &str) -> Result<(), IdentityError> {
    if !(3..=36).contains(&name.len()) {
        return Err(IdentityError::InvalidName(format!(
            "name length {} out of range 3..=36",
            name.len()
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(IdentityError::InvalidName(
            "name contains characters outside [a-zA-Z0-9._-]".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub fingerprint: Fingerprint,
    #[serde(with = "hex_bytes")]
    pub dsa_public_key: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub kem_public_key: Vec<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_registered_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_expires_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_version: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    #[serde(default)]
    pub wallet_addresses: Vec<String>,
    #[serde(default)]
    pub social_handles: Vec<String>,

    pub created_at: u64,
    pub updated_at: u64,
    pub timestamp: u64,
    pub version: u32,

    #[serde(skip_serializing_if = "Option::is_none", with = "opt_hex_bytes")]
    pub signature: Option<Vec<u8>>,
}

mod opt_hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_some(&hex::encode(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let opt = Option::<String>::deserialize(d)?;
        opt.map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

impl IdentityRecord {
    pub fn set_name(&mut self, name: &str, now: u64) -> Result<(), IdentityError> {
        validate_name(name)?;
        self.name = Some(name.to_string());
        self.name_registered_at = Some(now);
        self.name_expires_at = Some(now + dna_common::time::NAME_VALIDITY_SECS);
        self.name_version = Some(self.name_version.unwrap_or(0) + 1);
        Ok(())
    }

    /// Canonical bytes of this record with `signature` cleared, the
    /// input to both [`sign_record`] and [`verify_record`].
    fn signing_bytes(&self) -> Result<Vec<u8>, IdentityError> {
        let mut unsigned = self.clone();
        unsigned.signature = None;
        Ok(canonical_json_bytes(&unsigned)?)
    }
}

/// Sign `record` in place with `dsa_sk`, attaching the resulting
/// signature. `record.signature` is ignored (and overwritten) going in.
pub fn sign_record(dsa_sk: &DsaSecretKey, record: &mut IdentityRecord) -> Result<(), IdentityError> {
    let bytes = record.signing_bytes()?;
    let sig = dsa_sign(dsa_sk, &bytes);
    record.signature = Some(sig.to_vec());
    Ok(())
}

/// Verify `record`: the signature must verify under `record.dsa_public_key`,
/// and the fingerprint must match `SHA3-512(dsa_public_key)`.
pub fn verify_record(record: &IdentityRecord) -> Result<(), IdentityError> {
    if *record.fingerprint.as_bytes() != dna_primitives::sha3_512(&record.dsa_public_key) {
        return Err(IdentityError::FingerprintMismatch);
    }
    if !looks_like_fingerprint(&record.fingerprint.to_hex()) {
        return Err(IdentityError::FingerprintMismatch);
    }
    let signature = record
        .signature
        .as_ref()
        .ok_or(IdentityError::RecordSignatureInvalid)?;
    let bytes = record.signing_bytes()?;

    let mut pk_bytes = [0u8; dna_primitives::DSA_PUBLIC_KEY_LEN];
    if record.dsa_public_key.len() != pk_bytes.len() {
        return Err(IdentityError::RecordSignatureInvalid);
    }
    pk_bytes.copy_from_slice(&record.dsa_public_key);
    let pk = DsaPublicKey(pk_bytes);

    dsa_verify(&pk, &bytes, signature).map_err(|_| IdentityError::RecordSignatureInvalid)
}

// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Keyserver client (§4.5): publishes and resolves identity records and
//! name aliases via Atlas keys, with a local TTL cache.

mod error;

pub use error::KeyserverError;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;

use dna_common::{
    codec::canonical_json_bytes,
    fingerprint::looks_like_fingerprint,
    time::{unix_now, KEYSERVER_CACHE_TTL_SECS, KEYSERVER_STALE_CEILING_SECS, PROFILE_TTL_SECS},
    Fingerprint,
};
use dna_dht::{chunked_get, chunked_put_signed, DhtClient};
use dna_primitives::{dsa_sign, dsa_verify, DsaPublicKey, DsaSecretKey};

use crate::atlas::{atlas_key, AtlasRole};
use crate::identity::{verify_record, Identity, IdentityRecord};

const PROFILE_VALUE_ID: u64 = 1;
const ALIAS_VALUE_ID: u64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasRecord {
    pub name: String,
    pub fingerprint: Fingerprint,
    pub timestamp: u64,
    #[serde(with = "hex_sig")]
    pub signature: Vec<u8>,
}

mod hex_sig {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

impl AliasRecord {
    fn signing_bytes(&self) -> Result<Vec<u8>, KeyserverError> {
        #[derive(Serialize)]
        struct Unsigned<'a> {
            name: &'a str,
            fingerprint: Fingerprint,
            timestamp: u64,
        }
        Ok(canonical_json_bytes(&Unsigned {
            name: &self.name,
            fingerprint: self.fingerprint,
            timestamp: self.timestamp,
        })?)
    }
}

fn sign_alias(dsa_sk: &DsaSecretKey, name: &str, fingerprint: Fingerprint, timestamp: u64) -> Result<AliasRecord, KeyserverError> {
    let mut record = AliasRecord {
        name: name.to_string(),
        fingerprint,
        timestamp,
        signature: vec![],
    };
    let bytes = record.signing_bytes()?;
    record.signature = dsa_sign(dsa_sk, &bytes).to_vec();
    Ok(record)
}

fn verify_alias(record: &AliasRecord, dsa_public_key: &[u8]) -> Result<(), KeyserverError> {
    let bytes = record.signing_bytes()?;
    let mut pk_bytes = [0u8; dna_primitives::DSA_PUBLIC_KEY_LEN];
    if dsa_public_key.len() != pk_bytes.len() {
        return Err(KeyserverError::IdentityVerificationFailed);
    }
    pk_bytes.copy_from_slice(dsa_public_key);
    dsa_verify(&DsaPublicKey(pk_bytes), &bytes, &record.signature)
        .map_err(|_| KeyserverError::IdentityVerificationFailed)
}

struct CacheEntry {
    record: IdentityRecord,
    fetched_at: u64,
}

/// The result of [`KeyserverClient::lookup`]: the resolved record, and
/// whether it came from a stale cache entry served because the DHT was
/// unreachable (§4.5 cache policy).
pub struct LookupResult {
    pub record: IdentityRecord,
    pub stale: bool,
}

pub struct KeyserverClient<D: DhtClient> {
    dht: Arc<D>,
    cache: Mutex<HashMap<Fingerprint, CacheEntry>>,
}

impl<D: DhtClient> KeyserverClient<D> {
    pub fn new(dht: Arc<D>) -> Self {
        Self {
            dht,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Publish `identity`'s signed record at its profile Atlas key, and
    /// if it has a registered name, a signed alias at the name-lookup key.
    pub async fn publish_identity(&self, identity: &Identity) -> Result<(), KeyserverError> {
        let key = atlas_key(&AtlasRole::Profile {
            fp: identity.fingerprint(),
        });
        let bytes = canonical_json_bytes(&identity.record)?;
        chunked_put_signed(
            self.dht.as_ref(),
            key,
            &bytes,
            PROFILE_VALUE_ID,
            std::time::Duration::from_secs(PROFILE_TTL_SECS),
        )
        .await?;

        if let Some(name) = &identity.record.name {
            let alias = sign_alias(
                &identity.dsa_sk,
                name,
                identity.fingerprint(),
                unix_now(),
            )?;
            let alias_bytes = serde_json::to_vec(&alias).map_err(|e| {
                KeyserverError::Codec(dna_common::codec::CodecError::Canonicalize(e))
            })?;
            let alias_key = atlas_key(&AtlasRole::NameLookup {
                name: name.clone(),
            });
            chunked_put_signed(
                self.dht.as_ref(),
                alias_key,
                &alias_bytes,
                ALIAS_VALUE_ID,
                std::time::Duration::from_secs(PROFILE_TTL_SECS),
            )
            .await?;
        }

        self.cache.lock().expect("keyserver cache poisoned").insert(
            identity.fingerprint(),
            CacheEntry {
                record: identity.record.clone(),
                fetched_at: unix_now(),
            },
        );
        Ok(())
    }

    async fn fetch_profile(&self, fp: Fingerprint) -> Result<IdentityRecord, KeyserverError> {
        let key = atlas_key(&AtlasRole::Profile { fp });
        let bytes = chunked_get(self.dht.as_ref(), key)
            .await
            .map_err(|_| KeyserverError::IdentityNotFound)?;
        let record: IdentityRecord =
            serde_json::from_slice(&bytes).map_err(|_| KeyserverError::IdentityNotFound)?;
        verify_record(&record).map_err(|_| KeyserverError::IdentityVerificationFailed)?;
        Ok(record)
    }

    /// Resolve a 128-hex fingerprint or a registered name to its
    /// identity record, honoring the 7-day cache / 30-day stale ceiling.
    pub async fn lookup(&self, query: &str) -> Result<LookupResult, KeyserverError> {
        let fp = if looks_like_fingerprint(query) {
            query.parse().map_err(|_| KeyserverError::IdentityNotFound)?
        } else {
            self.resolve_name(query).await?
        };

        if let Some(entry) = self.cache.lock().expect("keyserver cache poisoned").get(&fp) {
            if unix_now().saturating_sub(entry.fetched_at) < KEYSERVER_CACHE_TTL_SECS {
                return Ok(LookupResult {
                    record: entry.record.clone(),
                    stale: false,
                });
            }
        }

        match self.fetch_profile(fp).await {
            Ok(record) => {
                self.cache.lock().expect("keyserver cache poisoned").insert(
                    fp,
                    CacheEntry {
                        record: record.clone(),
                        fetched_at: unix_now(),
                    },
                );
                Ok(LookupResult {
                    record,
                    stale: false,
                })
            }
            Err(e) => {
                let cache = self.cache.lock().expect("keyserver cache poisoned");
                if let Some(entry) = cache.get(&fp) {
                    if unix_now().saturating_sub(entry.fetched_at) < KEYSERVER_STALE_CEILING_SECS {
                        warn!(fingerprint = %fp, "serving stale keyserver cache entry");
                        return Ok(LookupResult {
                            record: entry.record.clone(),
                            stale: true,
                        });
                    }
                }
                Err(e)
            }
        }
    }

    async fn resolve_name(&self, name: &str) -> Result<Fingerprint, KeyserverError> {
        let key = atlas_key(&AtlasRole::NameLookup {
            name: name.to_string(),
        });
        let bytes = chunked_get(self.dht.as_ref(), key)
            .await
            .map_err(|_| KeyserverError::NameNotFound)?;
        let alias: AliasRecord =
            serde_json::from_slice(&bytes).map_err(|_| KeyserverError::NameNotFound)?;
        Ok(alias.fingerprint)
    }

    /// Return the owner's registered name, if any and not expired.
    pub async fn reverse_lookup(&self, fp: Fingerprint) -> Result<Option<String>, KeyserverError> {
        let result = self.lookup(&fp.to_hex()).await?;
        match (&result.record.name, result.record.name_expires_at) {
            (Some(name), Some(expires_at)) if expires_at > unix_now() => Ok(Some(name.clone())),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dna_dht::InMemoryDht;

    fn fresh_identity(seed: u8) -> Identity {
        crate::identity::generate_from_mnemonic(
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
            &seed.to_string(),
            1_700_000_000,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn publish_then_lookup_by_fingerprint() {
        let dht = Arc::new(InMemoryDht::new());
        let client = KeyserverClient::new(dht);
        let identity = fresh_identity(1);
        client.publish_identity(&identity).await.unwrap();

        let result = client.lookup(&identity.fingerprint().to_hex()).await.unwrap();
        assert_eq!(result.record.fingerprint, identity.fingerprint());
        assert!(!result.stale);
    }

    #[tokio::test]
    async fn lookup_by_name_resolves_through_alias() {
        let dht = Arc::new(InMemoryDht::new());
        let client = KeyserverClient::new(dht);
        let mut identity = fresh_identity(2);
        identity.record.set_name("alice", 1_700_000_000).unwrap();
        crate::identity::sign_record(&identity.dsa_sk, &mut identity.record).unwrap();
        client.publish_identity(&identity).await.unwrap();

        let result = client.lookup("alice").await.unwrap();
        assert_eq!(result.record.fingerprint, identity.fingerprint());
    }

    #[tokio::test]
    async fn unknown_fingerprint_is_not_found() {
        let dht = Arc::new(InMemoryDht::new());
        let client = KeyserverClient::new(dht);
        let fp = Fingerprint::from_bytes(&[9u8; 64]).unwrap();
        let err = client.lookup(&fp.to_hex()).await.unwrap_err();
        assert!(matches!(err, KeyserverError::IdentityNotFound));
    }

    #[test]
    fn alias_signature_round_trip() {
        let identity = fresh_identity(3);
        let alias = sign_alias(&identity.dsa_sk, "bob", identity.fingerprint(), 1_700_000_000).unwrap();
        verify_alias(&alias, &identity.record.dsa_public_key).unwrap();
    }
}

// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Contact-request protocol (§4.10): a signed, multi-value inbox per
//! recipient that proposers append to, and the local contact/block
//! lists it feeds.

mod error;

pub use error::ContactError;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use dna_common::time::CONTACT_REQUEST_TTL_SECS;
use dna_common::{codec::canonical_json_bytes, Fingerprint};
use dna_dht::{chunked_put_signed, DhtClient};
use dna_primitives::{dsa_sign, dsa_verify, sha3_512, DsaPublicKey, DsaSecretKey};

use crate::atlas::{atlas_key, AtlasRole};
use crate::keyserver::KeyserverClient;
use crate::store::{ContactRecord, Store};

const MAX_GREETING_LEN: usize = 500;
const REQUEST_VALUE_ID_DOMAIN: &[u8] = b"contact-request";

/// A proposer's signed request to be added to a recipient's contact
/// list, or the reciprocal acceptance published back to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactRequest {
    pub proposer_fp: Fingerprint,
    pub target_fp: Fingerprint,
    pub greeting: String,
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

impl ContactRequest {
    fn signing_bytes(&self) -> Result<Vec<u8>, ContactError> {
        #[derive(Serialize)]
        struct Unsigned<'a> {
            proposer_fp: Fingerprint,
            target_fp: Fingerprint,
            greeting: &'a str,
            timestamp: u64,
        }
        Ok(canonical_json_bytes(&Unsigned {
            proposer_fp: self.proposer_fp,
            target_fp: self.target_fp,
            greeting: &self.greeting,
            timestamp: self.timestamp,
        })?)
    }
}

fn sign_request(
    proposer_sk: &DsaSecretKey,
    proposer_fp: Fingerprint,
    target_fp: Fingerprint,
    greeting: String,
    timestamp: u64,
) -> Result<ContactRequest, ContactError> {
    let mut request = ContactRequest {
        proposer_fp,
        target_fp,
        greeting,
        timestamp,
        signature: vec![],
    };
    let bytes = request.signing_bytes()?;
    request.signature = dsa_sign(proposer_sk, &bytes).to_vec();
    Ok(request)
}

fn request_value_id(proposer_fp: Fingerprint) -> u64 {
    let mut buf = Vec::with_capacity(REQUEST_VALUE_ID_DOMAIN.len() + 64);
    buf.extend_from_slice(REQUEST_VALUE_ID_DOMAIN);
    buf.extend_from_slice(proposer_fp.as_bytes());
    u64::from_be_bytes(sha3_512(&buf)[0..8].try_into().unwrap())
}

pub struct ContactEngine<D: DhtClient, S: Store> {
    dht: Arc<D>,
    store: Arc<S>,
    keyserver: Arc<KeyserverClient<D>>,
    self_fingerprint: Fingerprint,
    self_dsa_sk: DsaSecretKey,
}

impl<D: DhtClient, S: Store> ContactEngine<D, S> {
    pub fn new(
        dht: Arc<D>,
        store: Arc<S>,
        keyserver: Arc<KeyserverClient<D>>,
        self_fingerprint: Fingerprint,
        self_dsa_sk: DsaSecretKey,
    ) -> Self {
        Self {
            dht,
            store,
            keyserver,
            self_fingerprint,
            self_dsa_sk,
        }
    }

    async fn publish_request(
        &self,
        to: Fingerprint,
        greeting: String,
        now: u64,
    ) -> Result<(), ContactError> {
        if greeting.len() > MAX_GREETING_LEN {
            return Err(ContactError::GreetingTooLong);
        }
        let request = sign_request(&self.self_dsa_sk, self.self_fingerprint, to, greeting, now)?;
        let bytes = canonical_json_bytes(&request)?;
        let key = atlas_key(&AtlasRole::ContactRequestInbox { fp: to });
        chunked_put_signed(
            self.dht.as_ref(),
            key,
            &bytes,
            request_value_id(self.self_fingerprint),
            std::time::Duration::from_secs(CONTACT_REQUEST_TTL_SECS),
        )
        .await?;
        Ok(())
    }

    /// Propose `self` as a contact of `to` (§4.10 `send_request`).
    pub async fn send_request(&self, to: Fingerprint, greeting: String, now: u64) -> Result<(), ContactError> {
        self.publish_request(to, greeting, now).await
    }

    /// Fetch and verify every pending request addressed to `self`,
    /// dropping entries that fail signature verification or whose
    /// proposer is already blocked.
    pub async fn list_requests(&self) -> Result<Vec<ContactRequest>, ContactError> {
        let key = atlas_key(&AtlasRole::ContactRequestInbox {
            fp: self.self_fingerprint,
        });
        let raw_values = self.dht.get_all(key).await?;

        let mut out = Vec::with_capacity(raw_values.len());
        for raw in raw_values {
            let request: ContactRequest = match serde_json::from_slice(&raw) {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "dropping unparseable contact request");
                    continue;
                }
            };
            if request.target_fp != self.self_fingerprint {
                continue;
            }
            if self.store.is_blocked(request.proposer_fp).await? {
                continue;
            }
            if self.store.is_dismissed(request.proposer_fp).await? {
                continue;
            }
            match self.verify(&request).await {
                Ok(()) => out.push(request),
                Err(e) => warn!(proposer = %request.proposer_fp, error = %e, "dropping unverifiable contact request"),
            }
        }
        Ok(out)
    }

    async fn verify(&self, request: &ContactRequest) -> Result<(), ContactError> {
        let record = self
            .keyserver
            .lookup(&request.proposer_fp.to_hex())
            .await
            .map_err(|_| ContactError::ProposerUnresolvable)?
            .record;
        let mut pk_bytes = [0u8; dna_primitives::DSA_PUBLIC_KEY_LEN];
        if record.dsa_public_key.len() != pk_bytes.len() {
            return Err(ContactError::SignatureInvalid);
        }
        pk_bytes.copy_from_slice(&record.dsa_public_key);
        let signing_bytes = request.signing_bytes()?;
        dsa_verify(&DsaPublicKey(pk_bytes), &signing_bytes, &request.signature)
            .map_err(|_| ContactError::SignatureInvalid)
    }

    /// Accept `proposer_fp` (§4.10 `approve`): add them locally and
    /// publish a reciprocal request so both inboxes show an accepted
    /// state.
    pub async fn approve(&self, proposer_fp: Fingerprint, now: u64) -> Result<(), ContactError> {
        self.store.add_contact(proposer_fp, None, now).await?;
        self.publish_request(proposer_fp, "accepted".to_string(), now).await
    }

    /// Reject `proposer_fp` (§4.10 `deny`): dismiss their request locally
    /// so it stops resurfacing from [`Self::list_requests`] — there is no
    /// remote tombstone for a single proposer's inbox entry, so dismissal
    /// is tracked here rather than on the DHT. `also_block` additionally
    /// silences future requests from them without verification.
    pub async fn deny(&self, proposer_fp: Fingerprint, also_block: bool) -> Result<(), ContactError> {
        self.store.dismiss_request(proposer_fp).await?;
        if also_block {
            self.store.block(proposer_fp).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dna_dht::InMemoryDht;

    use crate::identity::generate_from_mnemonic;
    use crate::store::memory::InMemoryStore;

    fn identity(passphrase: &str) -> crate::identity::Identity {
        generate_from_mnemonic(
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
            passphrase,
            1_700_000_000,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn send_list_and_approve_round_trip() {
        let dht = Arc::new(InMemoryDht::new());
        let alice = identity("alice");
        let bob = identity("bob");
        let alice_fp = alice.fingerprint();
        let bob_fp = bob.fingerprint();

        let keyserver = Arc::new(KeyserverClient::new(dht.clone()));
        keyserver.publish_identity(&alice).await.unwrap();
        keyserver.publish_identity(&bob).await.unwrap();

        let alice_engine = ContactEngine::new(
            dht.clone(),
            Arc::new(InMemoryStore::new()),
            keyserver.clone(),
            alice_fp,
            alice.dsa_sk,
        );
        alice_engine.send_request(bob_fp, "hi it's alice".to_string(), 1_700_000_100).await.unwrap();

        let bob_store = Arc::new(InMemoryStore::new());
        let bob_engine = ContactEngine::new(dht.clone(), bob_store.clone(), keyserver, bob_fp, bob.dsa_sk);

        let requests = bob_engine.list_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].proposer_fp, alice_fp);
        assert_eq!(requests[0].greeting, "hi it's alice");

        bob_engine.approve(alice_fp, 1_700_000_200).await.unwrap();
        assert!(bob_store.is_contact(alice_fp).await.unwrap());
    }

    #[tokio::test]
    async fn blocked_proposer_is_filtered_without_verification() {
        let dht = Arc::new(InMemoryDht::new());
        let alice = identity("alice3");
        let bob = identity("bob3");
        let alice_fp = alice.fingerprint();
        let bob_fp = bob.fingerprint();

        let keyserver = Arc::new(KeyserverClient::new(dht.clone()));
        keyserver.publish_identity(&alice).await.unwrap();
        keyserver.publish_identity(&bob).await.unwrap();

        let alice_engine =
            ContactEngine::new(dht.clone(), Arc::new(InMemoryStore::new()), keyserver.clone(), alice_fp, alice.dsa_sk);
        alice_engine.send_request(bob_fp, "let's connect".to_string(), 1).await.unwrap();

        let bob_store = Arc::new(InMemoryStore::new());
        bob_store.block(alice_fp).await.unwrap();
        let bob_engine = ContactEngine::new(dht.clone(), bob_store, keyserver, bob_fp, bob.dsa_sk);

        assert!(bob_engine.list_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn denied_request_does_not_resurface() {
        let dht = Arc::new(InMemoryDht::new());
        let alice = identity("alice4");
        let bob = identity("bob4");
        let alice_fp = alice.fingerprint();
        let bob_fp = bob.fingerprint();

        let keyserver = Arc::new(KeyserverClient::new(dht.clone()));
        keyserver.publish_identity(&alice).await.unwrap();
        keyserver.publish_identity(&bob).await.unwrap();

        let alice_engine =
            ContactEngine::new(dht.clone(), Arc::new(InMemoryStore::new()), keyserver.clone(), alice_fp, alice.dsa_sk);
        alice_engine.send_request(bob_fp, "hi".to_string(), 1).await.unwrap();

        let bob_store = Arc::new(InMemoryStore::new());
        let bob_engine = ContactEngine::new(dht.clone(), bob_store.clone(), keyserver, bob_fp, bob.dsa_sk);

        assert_eq!(bob_engine.list_requests().await.unwrap().len(), 1);
        bob_engine.deny(alice_fp, false).await.unwrap();
        assert!(bob_engine.list_requests().await.unwrap().is_empty());
        assert!(!bob_store.is_blocked(alice_fp).await.unwrap());
    }
}

// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Spillway (§4.8, §4.9): offline store-and-forward delivery over a
//! per-pair outbox, pruned against a recipient-published watermark, plus
//! the shared-outbox variant group messaging rides on.
//!
//! Ordering and delivery are governed entirely by `seq_num`, never by
//! `timestamp` (§4.8.3): a message is delivered iff it decrypts, is
//! persisted, and its `seq_num` is reflected in `recv_seq` afterward.

mod error;
mod message;

pub use error::SpillwayError;
pub use message::SpillwayMessage;

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use dna_common::time::{add_secs, OUTBOX_TTL_SECS, SPILLWAY_MESSAGE_TTL_MAX_SECS, WATERMARK_TTL_SECS};
use dna_common::Fingerprint;
use dna_dht::{chunked_get, chunked_put_signed, DhtClient, DhtError};
use dna_primitives::{sha3_512, DsaPublicKey, KemSecretKey};

use crate::atlas::{atlas_key, AtlasRole};
use crate::keyserver::KeyserverClient;
use crate::seal;
use crate::seal::SealError as SealError_;
use crate::store::Store;

const OUTBOX_VALUE_ID: u64 = 1;
const WATERMARK_VALUE_ID: u64 = 1;
const GROUP_BACKLOG_TAG_INLINE: u8 = 0x00;

/// Outcome of attempting to open one message in an inbound batch.
#[derive(Debug)]
pub enum ReceivedMessage {
    Delivered {
        sender: Fingerprint,
        timestamp: u64,
        plaintext: Vec<u8>,
    },
    /// From a party not yet in the local contact list (§4.8.4): not
    /// shown to the UI and `recv_seq` is not advanced, so it is retried
    /// once the sender is added as a contact.
    Quarantined { sender: Fingerprint, seq_num: u64 },
}

pub struct SpillwayEngine<D: DhtClient, S: Store> {
    dht: Arc<D>,
    store: Arc<S>,
    keyserver: Arc<KeyserverClient<D>>,
    self_fingerprint: Fingerprint,
    self_kem_sk: KemSecretKey,
    max_envelope_len: usize,
}

impl<D: DhtClient, S: Store> SpillwayEngine<D, S> {
    pub fn new(
        dht: Arc<D>,
        store: Arc<S>,
        keyserver: Arc<KeyserverClient<D>>,
        self_fingerprint: Fingerprint,
        self_kem_sk: KemSecretKey,
    ) -> Self {
        Self {
            dht,
            store,
            keyserver,
            self_fingerprint,
            self_kem_sk,
            max_envelope_len: seal::DEFAULT_MAX_ENVELOPE_LEN,
        }
    }

    /// Key of the outbox *we* publish to, addressed to `peer` — written
    /// by [`SpillwayEngine::send`], read back only to prune it.
    fn outbox_key(&self, peer: Fingerprint) -> [u8; 64] {
        atlas_key(&AtlasRole::Outbox {
            from: self.self_fingerprint,
            to: peer,
        })
    }

    /// Key of the outbox `peer` publishes, addressed to us — read by
    /// [`SpillwayEngine::receive`]. Distinct from [`Self::outbox_key`]:
    /// the Atlas outbox role is order-sensitive in `(from, to)`, so
    /// reading the wrong one silently returns an empty outbox instead of
    /// the peer's messages.
    fn inbox_key(&self, peer: Fingerprint) -> [u8; 64] {
        atlas_key(&AtlasRole::Outbox {
            from: peer,
            to: self.self_fingerprint,
        })
    }

    fn watermark_we_read_key(&self, peer: Fingerprint) -> [u8; 64] {
        // The watermark peer publishes describing what they've received
        // from us.
        atlas_key(&AtlasRole::Watermark {
            owner: peer,
            from: self.self_fingerprint,
        })
    }

    fn watermark_we_publish_key(&self, peer: Fingerprint) -> [u8; 64] {
        // The watermark we publish describing what we've received from
        // peer.
        atlas_key(&AtlasRole::Watermark {
            owner: self.self_fingerprint,
            from: peer,
        })
    }

    async fn fetch_outbox_at(&self, key: [u8; 64]) -> Result<Vec<SpillwayMessage>, SpillwayError> {
        match chunked_get(self.dht.as_ref(), key).await {
            Ok(bytes) => message::decode_outbox(&bytes),
            Err(DhtError::NotFound) => Ok(vec![]),
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch_watermark(&self, key: [u8; 64]) -> Result<u64, SpillwayError> {
        match chunked_get(self.dht.as_ref(), key).await {
            Ok(bytes) => message::decode_watermark(&bytes),
            Err(DhtError::NotFound) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Append `envelope` (already Seal-sealed by the caller) to `peer`'s
    /// outbox (§4.8.1). Returns the allocated `seq_num`.
    pub async fn send(
        &self,
        peer: Fingerprint,
        envelope: Vec<u8>,
        now: u64,
        ttl_secs: Option<u64>,
    ) -> Result<u64, SpillwayError> {
        let seq_num = self.store.incr_send_seq(peer).await?;
        let ttl = ttl_secs.unwrap_or(SPILLWAY_MESSAGE_TTL_MAX_SECS).min(SPILLWAY_MESSAGE_TTL_MAX_SECS);
        let expiry = add_secs(now, ttl);

        let message = SpillwayMessage {
            seq_num,
            timestamp: now,
            expiry,
            sender: self.self_fingerprint,
            recipient: peer,
            ciphertext: envelope,
        };

        let mut outbox = self.fetch_outbox_at(self.outbox_key(peer)).await?;
        let watermark = self.fetch_watermark(self.watermark_we_read_key(peer)).await?;
        outbox.retain(|m| m.seq_num > watermark && m.expiry > now);
        outbox.push(message);
        outbox.sort_by_key(|m| m.seq_num);

        let encoded = message::encode_outbox(&outbox);
        chunked_put_signed(
            self.dht.as_ref(),
            self.outbox_key(peer),
            &encoded,
            OUTBOX_VALUE_ID,
            std::time::Duration::from_secs(OUTBOX_TTL_SECS),
        )
        .await?;

        Ok(seq_num)
    }

    /// Drain and attempt to open `peer`'s pending messages for us
    /// (§4.8.2). Advances and republishes `recv_seq`/watermark only past
    /// messages whose fate is definitively known (opened successfully,
    /// or failed for a reason that can never change — a transient
    /// failure like a keyserver timeout leaves `recv_seq` untouched so
    /// the message is retried on the next poll).
    pub async fn receive(&self, peer: Fingerprint, now: u64) -> Result<Vec<ReceivedMessage>, SpillwayError> {
        let outbox = self.fetch_outbox_at(self.inbox_key(peer)).await?;
        let recv_seq = self.store.get_recv_seq(peer).await?;

        let sender_pk = match self.keyserver.lookup(&peer.to_hex()).await {
            Ok(result) => Some(parse_dsa_pk(&result.record.dsa_public_key)),
            Err(_) => None,
        };

        let mut delivered = Vec::new();
        let mut advanced_to = recv_seq;

        let is_blocked = self.store.is_blocked(peer).await?;
        if is_blocked {
            return Ok(vec![]);
        }
        let is_contact = self.store.is_contact(peer).await?;

        for msg in outbox.iter().filter(|m| m.seq_num > recv_seq) {
            if msg.sender != peer {
                // Misfiled under this key: never going to open, so skip
                // past it for good.
                advanced_to = advanced_to.max(msg.seq_num);
                continue;
            }
            if msg.expiry <= now {
                // Expired (§8 S3): leave recv_seq untouched. The sender's
                // own next `send` prunes expired entries regardless of
                // watermark, so this doesn't stall delivery of anything
                // still live.
                continue;
            }

            let Some(sender_pk) = &sender_pk else {
                // Can't verify the signer right now; transient, retry later.
                break;
            };

            match seal::open(&msg.ciphertext, &self.self_kem_sk, sender_pk, self.max_envelope_len) {
                Ok((sender, timestamp, plaintext)) => {
                    if !is_contact {
                        delivered.push(ReceivedMessage::Quarantined {
                            sender,
                            seq_num: msg.seq_num,
                        });
                        continue;
                    }
                    self.store
                        .save_message(sender, timestamp, false, plaintext.clone())
                        .await?;
                    delivered.push(ReceivedMessage::Delivered {
                        sender,
                        timestamp,
                        plaintext,
                    });
                    advanced_to = advanced_to.max(msg.seq_num);
                }
                Err(SealError_::NoMatchingRecipient) => {
                    // Not addressed to us; definitive, skip past it.
                    advanced_to = advanced_to.max(msg.seq_num);
                }
                Err(SealError_::SignatureInvalid) | Err(SealError_::IdentityMismatch) => {
                    warn!(peer = %peer, seq = msg.seq_num, "dropping message with invalid signature or identity mismatch");
                    advanced_to = advanced_to.max(msg.seq_num);
                }
                Err(SealError_::DecryptionFailed) => {
                    warn!(peer = %peer, seq = msg.seq_num, "dropping message that failed to decrypt");
                    advanced_to = advanced_to.max(msg.seq_num);
                }
                Err(_) => {
                    // Malformed/oversized: definitive, never going to open.
                    advanced_to = advanced_to.max(msg.seq_num);
                }
            }
        }

        if advanced_to > recv_seq {
            self.store.set_recv_seq(peer, advanced_to).await?;
            let encoded = message::encode_watermark(advanced_to);
            chunked_put_signed(
                self.dht.as_ref(),
                self.watermark_we_publish_key(peer),
                &encoded,
                WATERMARK_VALUE_ID,
                std::time::Duration::from_secs(WATERMARK_TTL_SECS),
            )
            .await?;
        }

        Ok(delivered)
    }

    fn group_send_value_id(&self) -> u64 {
        let digest = sha3_512(self.self_fingerprint.as_bytes());
        u64::from_be_bytes(digest[0..8].try_into().unwrap())
    }

    /// Append a Nexus-sealed group envelope to this party's own slot in
    /// the group's shared outbox (§4.9).
    pub async fn publish_group_message(
        &self,
        group_uuid: Uuid,
        envelope: Vec<u8>,
        now: u64,
    ) -> Result<u64, SpillwayError> {
        let synthetic_peer = group_synthetic_peer(group_uuid);
        let seq_num = self.store.incr_send_seq(synthetic_peer).await?;
        let expiry = add_secs(now, SPILLWAY_MESSAGE_TTL_MAX_SECS);

        let key = atlas_key(&AtlasRole::GroupMessages { group_uuid });
        let existing = match self.dht.get(key).await {
            Ok(raw) => decode_group_backlog(&raw)?,
            Err(DhtError::NotFound) => vec![],
            Err(e) => return Err(e.into()),
        };
        let mut mine: Vec<SpillwayMessage> = existing
            .into_iter()
            .filter(|m| m.sender == self.self_fingerprint && m.expiry > now)
            .collect();
        mine.push(SpillwayMessage {
            seq_num,
            timestamp: now,
            expiry,
            sender: self.self_fingerprint,
            recipient: self.self_fingerprint,
            ciphertext: envelope,
        });
        mine.sort_by_key(|m| m.seq_num);

        let mut framed = vec![GROUP_BACKLOG_TAG_INLINE];
        framed.extend_from_slice(&message::encode_outbox(&mine));
        let role = AtlasRole::GroupMessages { group_uuid };
        self.dht
            .put_signed(
                key,
                framed,
                self.group_send_value_id(),
                std::time::Duration::from_secs(role.ttl_secs()),
            )
            .await?;

        Ok(seq_num)
    }

    /// Fetch every sender's backlog for `group_uuid`, decoded but not
    /// decrypted — decrypting a group envelope requires the Nexus GSK,
    /// which this module has no access to.
    pub async fn fetch_group_backlog(
        &self,
        group_uuid: Uuid,
    ) -> Result<Vec<SpillwayMessage>, SpillwayError> {
        let key = atlas_key(&AtlasRole::GroupMessages { group_uuid });
        let raw_values = self.dht.get_all(key).await?;
        let mut all = Vec::new();
        for raw in raw_values {
            match decode_group_backlog(&raw) {
                Ok(msgs) => all.extend(msgs),
                Err(e) => warn!(group = %group_uuid, error = %e, "skipping unreadable group backlog entry"),
            }
        }
        all.sort_by_key(|m| (m.sender, m.seq_num));
        Ok(all)
    }
}

fn decode_group_backlog(raw: &[u8]) -> Result<Vec<SpillwayMessage>, SpillwayError> {
    if raw.first() != Some(&GROUP_BACKLOG_TAG_INLINE) {
        return Err(SpillwayError::Malformed(
            "chunked group backlog entries are not supported".into(),
        ));
    }
    message::decode_outbox(&raw[1..])
}

fn group_synthetic_peer(group_uuid: Uuid) -> Fingerprint {
    Fingerprint::from_bytes(&sha3_512(group_uuid.as_bytes())).expect("sha3-512 output is 64 bytes")
}

fn parse_dsa_pk(bytes: &[u8]) -> DsaPublicKey {
    let mut out = [0u8; dna_primitives::DSA_PUBLIC_KEY_LEN];
    if bytes.len() == out.len() {
        out.copy_from_slice(bytes);
    }
    DsaPublicKey(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dna_dht::InMemoryDht;
    use dna_primitives::KEM_PUBLIC_KEY_LEN;

    use crate::identity::{generate_from_mnemonic, Identity};
    use crate::store::memory::InMemoryStore;

    fn identity(passphrase: &str) -> Identity {
        generate_from_mnemonic(
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
            passphrase,
            1_700_000_000,
        )
        .unwrap()
    }

    fn kem_pk_of(identity: &Identity) -> dna_primitives::KemPublicKey {
        let mut bytes = [0u8; KEM_PUBLIC_KEY_LEN];
        bytes.copy_from_slice(&identity.record.kem_public_key);
        dna_primitives::KemPublicKey(bytes)
    }

    #[tokio::test]
    async fn send_then_receive_round_trip() {
        let dht = Arc::new(InMemoryDht::new());
        let alice = identity("alice");
        let bob = identity("bob");
        let alice_fp = alice.fingerprint();
        let bob_fp = bob.fingerprint();
        let bob_kem_pk = kem_pk_of(&bob);

        let shared_keyserver = Arc::new(KeyserverClient::new(dht.clone()));
        shared_keyserver.publish_identity(&alice).await.unwrap();
        shared_keyserver.publish_identity(&bob).await.unwrap();

        let envelope = seal::seal(b"hello bob", &[bob_kem_pk], &alice.dsa_sk, alice_fp, 1_700_000_100).unwrap();

        let alice_engine = SpillwayEngine::new(
            dht.clone(),
            Arc::new(InMemoryStore::new()),
            shared_keyserver.clone(),
            alice_fp,
            alice.kem_sk,
        );

        let bob_store = Arc::new(InMemoryStore::new());
        bob_store.add_contact(alice_fp, None, 1_700_000_000).await.unwrap();
        let bob_engine = SpillwayEngine::new(dht.clone(), bob_store, shared_keyserver, bob_fp, bob.kem_sk);

        alice_engine.send(bob_fp, envelope, 1_700_000_100, None).await.unwrap();

        let received = bob_engine.receive(alice_fp, 1_700_000_200).await.unwrap();
        assert_eq!(received.len(), 1);
        match &received[0] {
            ReceivedMessage::Delivered { plaintext, .. } => assert_eq!(plaintext, b"hello bob"),
            other => panic!("expected delivery, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn message_from_non_contact_is_quarantined_and_does_not_advance_recv_seq() {
        let dht = Arc::new(InMemoryDht::new());
        let alice = identity("alice2");
        let bob = identity("bob2");
        let alice_fp = alice.fingerprint();
        let bob_fp = bob.fingerprint();
        let bob_kem_pk = kem_pk_of(&bob);

        let keyserver = Arc::new(KeyserverClient::new(dht.clone()));
        keyserver.publish_identity(&alice).await.unwrap();
        keyserver.publish_identity(&bob).await.unwrap();

        let envelope = seal::seal(b"hi", &[bob_kem_pk], &alice.dsa_sk, alice_fp, 1).unwrap();

        let alice_engine = SpillwayEngine::new(
            dht.clone(),
            Arc::new(InMemoryStore::new()),
            keyserver.clone(),
            alice_fp,
            alice.kem_sk,
        );
        // Bob never adds Alice as a contact.
        let bob_store = Arc::new(InMemoryStore::new());
        let bob_engine = SpillwayEngine::new(dht.clone(), bob_store.clone(), keyserver, bob_fp, bob.kem_sk);

        alice_engine.send(bob_fp, envelope, 1, None).await.unwrap();

        let received = bob_engine.receive(alice_fp, 2).await.unwrap();
        assert!(matches!(received[0], ReceivedMessage::Quarantined { .. }));
        assert_eq!(bob_store.get_recv_seq(alice_fp).await.unwrap(), 0);
    }
}

// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! An in-memory [`Store`] for tests and single-session ephemeral use.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use dna_common::Fingerprint;

use super::{ContactRecord, Store, StoreError};

#[derive(Default)]
struct Inner {
    send_seq: HashMap<Fingerprint, u64>,
    recv_seq: HashMap<Fingerprint, u64>,
    group_recv_seq: HashMap<(Uuid, Fingerprint), u64>,
    groups: HashMap<Uuid, Vec<u8>>,
    gsk_table: HashMap<(Uuid, u32), Vec<u8>>,
    contacts: HashMap<Fingerprint, ContactRecord>,
    blocked: HashMap<Fingerprint, ()>,
    dismissed_requests: HashMap<Fingerprint, ()>,
    messages: Vec<(Fingerprint, u64, bool, Vec<u8>)>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("in-memory store mutex poisoned")
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn incr_send_seq(&self, peer: Fingerprint) -> Result<u64, StoreError> {
        let mut inner = self.lock();
        let entry = inner.send_seq.entry(peer).or_insert(0);
        *entry += 1;
        Ok(*entry)
    }

    async fn get_recv_seq(&self, peer: Fingerprint) -> Result<u64, StoreError> {
        Ok(*self.lock().recv_seq.get(&peer).unwrap_or(&0))
    }

    async fn set_recv_seq(&self, peer: Fingerprint, seq: u64) -> Result<(), StoreError> {
        self.lock().recv_seq.insert(peer, seq);
        Ok(())
    }

    async fn get_group_recv_seq(&self, group: Uuid, sender: Fingerprint) -> Result<u64, StoreError> {
        Ok(*self.lock().group_recv_seq.get(&(group, sender)).unwrap_or(&0))
    }

    async fn set_group_recv_seq(
        &self,
        group: Uuid,
        sender: Fingerprint,
        seq: u64,
    ) -> Result<(), StoreError> {
        self.lock().group_recv_seq.insert((group, sender), seq);
        Ok(())
    }

    async fn save_group_blob(&self, group: Uuid, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.lock().groups.insert(group, bytes);
        Ok(())
    }

    async fn load_group_blob(&self, group: Uuid) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.lock().groups.get(&group).cloned())
    }

    async fn list_group_ids(&self) -> Result<Vec<Uuid>, StoreError> {
        Ok(self.lock().groups.keys().copied().collect())
    }

    async fn put_gsk_blob(&self, group: Uuid, version: u32, blob: Vec<u8>) -> Result<(), StoreError> {
        self.lock().gsk_table.insert((group, version), blob);
        Ok(())
    }

    async fn get_gsk_blob(&self, group: Uuid, version: u32) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.lock().gsk_table.get(&(group, version)).cloned())
    }

    async fn max_gsk_version(&self, group: Uuid) -> Result<Option<u32>, StoreError> {
        Ok(self
            .lock()
            .gsk_table
            .keys()
            .filter(|(g, _)| *g == group)
            .map(|(_, v)| *v)
            .max())
    }

    async fn list_gsk_versions(&self, group: Uuid) -> Result<Vec<u32>, StoreError> {
        Ok(self
            .lock()
            .gsk_table
            .keys()
            .filter(|(g, _)| *g == group)
            .map(|(_, v)| *v)
            .collect())
    }

    async fn add_contact(
        &self,
        fp: Fingerprint,
        note: Option<String>,
        added_at: u64,
    ) -> Result<(), StoreError> {
        self.lock().contacts.insert(
            fp,
            ContactRecord {
                fingerprint: fp,
                note,
                added_at,
            },
        );
        Ok(())
    }

    async fn remove_contact(&self, fp: Fingerprint) -> Result<(), StoreError> {
        self.lock().contacts.remove(&fp);
        Ok(())
    }

    async fn is_contact(&self, fp: Fingerprint) -> Result<bool, StoreError> {
        Ok(self.lock().contacts.contains_key(&fp))
    }

    async fn list_contacts(&self) -> Result<Vec<ContactRecord>, StoreError> {
        Ok(self.lock().contacts.values().cloned().collect())
    }

    async fn block(&self, fp: Fingerprint) -> Result<(), StoreError> {
        self.lock().blocked.insert(fp, ());
        Ok(())
    }

    async fn unblock(&self, fp: Fingerprint) -> Result<(), StoreError> {
        self.lock().blocked.remove(&fp);
        Ok(())
    }

    async fn is_blocked(&self, fp: Fingerprint) -> Result<bool, StoreError> {
        Ok(self.lock().blocked.contains_key(&fp))
    }

    async fn dismiss_request(&self, fp: Fingerprint) -> Result<(), StoreError> {
        self.lock().dismissed_requests.insert(fp, ());
        Ok(())
    }

    async fn is_dismissed(&self, fp: Fingerprint) -> Result<bool, StoreError> {
        Ok(self.lock().dismissed_requests.contains_key(&fp))
    }

    async fn save_message(
        &self,
        peer: Fingerprint,
        timestamp: u64,
        outgoing: bool,
        plaintext: Vec<u8>,
    ) -> Result<(), StoreError> {
        self.lock().messages.push((peer, timestamp, outgoing, plaintext));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(b: u8) -> Fingerprint {
        Fingerprint::from_bytes(&[b; 64]).unwrap()
    }

    #[tokio::test]
    async fn send_seq_increments_monotonically() {
        let store = InMemoryStore::new();
        let peer = fp(1);
        assert_eq!(store.incr_send_seq(peer).await.unwrap(), 1);
        assert_eq!(store.incr_send_seq(peer).await.unwrap(), 2);
        assert_eq!(store.incr_send_seq(peer).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn gsk_blob_round_trip_and_max_version() {
        let store = InMemoryStore::new();
        let group = Uuid::new_v4();
        store.put_gsk_blob(group, 1, vec![1, 2, 3]).await.unwrap();
        store.put_gsk_blob(group, 3, vec![4, 5, 6]).await.unwrap();
        store.put_gsk_blob(group, 2, vec![7, 8, 9]).await.unwrap();

        assert_eq!(store.max_gsk_version(group).await.unwrap(), Some(3));
        assert_eq!(store.get_gsk_blob(group, 3).await.unwrap(), Some(vec![4, 5, 6]));
        assert_eq!(store.get_gsk_blob(group, 9).await.unwrap(), None);

        let mut versions = store.list_gsk_versions(group).await.unwrap();
        versions.sort_unstable();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn dismissed_request_is_recorded() {
        let store = InMemoryStore::new();
        let proposer = fp(3);
        assert!(!store.is_dismissed(proposer).await.unwrap());
        store.dismiss_request(proposer).await.unwrap();
        assert!(store.is_dismissed(proposer).await.unwrap());
    }

    #[tokio::test]
    async fn contact_and_block_lifecycle() {
        let store = InMemoryStore::new();
        let peer = fp(2);
        assert!(!store.is_contact(peer).await.unwrap());
        store.add_contact(peer, Some("friend".into()), 100).await.unwrap();
        assert!(store.is_contact(peer).await.unwrap());
        store.remove_contact(peer).await.unwrap();
        assert!(!store.is_contact(peer).await.unwrap());

        store.block(peer).await.unwrap();
        assert!(store.is_blocked(peer).await.unwrap());
        store.unblock(peer).await.unwrap();
        assert!(!store.is_blocked(peer).await.unwrap());
    }
}

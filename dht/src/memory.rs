// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! An in-memory [`DhtClient`] for tests and local development. Not a
//! substrate implementation — no networking, no real signing — but it
//! honors the same TTL, multi-value, and signed-replacement semantics
//! the real substrate promises, so code written against [`DhtClient`]
//! behaves identically against either.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::client::{DhtClient, DhtKey, ListenEvent, ListenStream};
use crate::error::DhtError;

#[derive(Clone)]
struct StoredValue {
    value: Vec<u8>,
    value_id: Option<u64>,
    expires_at: Option<Instant>,
}

struct Inner {
    // key -> values currently live under it (multiple for multi-value keys,
    // at most one per distinct value_id for signed slots).
    entries: HashMap<DhtKey, Vec<StoredValue>>,
    broadcaster: broadcast::Sender<ListenEvent>,
    subscriptions: HashMap<u64, ()>,
}

/// Reference `DhtClient` backed by process memory. `clone()` shares the
/// same underlying store (it is an `Arc`-like handle internally).
#[derive(Clone)]
pub struct InMemoryDht {
    inner: std::sync::Arc<Mutex<Inner>>,
    next_subscription_id: std::sync::Arc<AtomicU64>,
}

impl Default for InMemoryDht {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDht {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(1024);
        Self {
            inner: std::sync::Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                broadcaster: tx,
                subscriptions: HashMap::new(),
            })),
            next_subscription_id: std::sync::Arc::new(AtomicU64::new(1)),
        }
    }

    fn prune_expired(values: &mut Vec<StoredValue>) {
        let now = Instant::now();
        values.retain(|v| v.expires_at.map(|exp| exp > now).unwrap_or(true));
    }

    fn insert(&self, key: DhtKey, stored: StoredValue) {
        let mut inner = self.inner.lock().expect("dht mutex poisoned");
        let entry = inner.entries.entry(key).or_default();
        Self::prune_expired(entry);

        if let Some(vid) = stored.value_id {
            entry.retain(|v| v.value_id != Some(vid));
        }
        entry.push(stored.clone());

        let _ = inner.broadcaster.send(ListenEvent {
            key,
            value: stored.value,
        });
    }
}

#[async_trait]
impl DhtClient for InMemoryDht {
    async fn put(&self, key: DhtKey, value: Vec<u8>, ttl: Duration) -> Result<(), DhtError> {
        self.insert(
            key,
            StoredValue {
                value,
                value_id: None,
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn put_signed(
        &self,
        key: DhtKey,
        value: Vec<u8>,
        value_id: u64,
        ttl: Duration,
    ) -> Result<(), DhtError> {
        self.insert(
            key,
            StoredValue {
                value,
                value_id: Some(value_id),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn put_permanent(&self, key: DhtKey, value: Vec<u8>) -> Result<(), DhtError> {
        self.insert(
            key,
            StoredValue {
                value,
                value_id: None,
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn get(&self, key: DhtKey) -> Result<Vec<u8>, DhtError> {
        let mut inner = self.inner.lock().expect("dht mutex poisoned");
        let values = inner.entries.entry(key).or_default();
        Self::prune_expired(values);
        values
            .first()
            .map(|v| v.value.clone())
            .ok_or(DhtError::NotFound)
    }

    async fn get_all(&self, key: DhtKey) -> Result<Vec<Vec<u8>>, DhtError> {
        let mut inner = self.inner.lock().expect("dht mutex poisoned");
        let values = inner.entries.entry(key).or_default();
        Self::prune_expired(values);
        if values.is_empty() {
            return Ok(Vec::new());
        }
        Ok(values.iter().map(|v| v.value.clone()).collect())
    }

    async fn listen(&self, key: DhtKey) -> Result<(u64, ListenStream), DhtError> {
        let mut inner = self.inner.lock().expect("dht mutex poisoned");
        let id = self.next_subscription_id.fetch_add(1, Ordering::SeqCst);
        inner.subscriptions.insert(id, ());
        let rx = inner.broadcaster.subscribe();
        let stream = BroadcastStream::new(rx)
            .filter_map(move |res| res.ok())
            .filter(move |ev| ev.key == key);
        Ok((id, Box::pin(stream)))
    }

    async fn cancel(&self, subscription_id: u64) -> Result<(), DhtError> {
        let mut inner = self.inner.lock().expect("dht mutex poisoned");
        inner.subscriptions.remove(&subscription_id);
        Ok(())
    }

    async fn cancel_all(&self) -> Result<(), DhtError> {
        let mut inner = self.inner.lock().expect("dht mutex poisoned");
        inner.subscriptions.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_round_trip() {
        let dht = InMemoryDht::new();
        let key = [1u8; 64];
        dht.put(key, b"hello".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(dht.get(key).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn put_signed_replaces_same_value_id() {
        let dht = InMemoryDht::new();
        let key = [2u8; 64];
        dht.put_signed(key, b"v1".to_vec(), 1, Duration::from_secs(60))
            .await
            .unwrap();
        dht.put_signed(key, b"v2".to_vec(), 1, Duration::from_secs(60))
            .await
            .unwrap();
        let all = dht.get_all(key).await.unwrap();
        assert_eq!(all, vec![b"v2".to_vec()]);
    }

    #[tokio::test]
    async fn get_all_collects_multiple_value_ids() {
        let dht = InMemoryDht::new();
        let key = [3u8; 64];
        dht.put_signed(key, b"from-a".to_vec(), 1, Duration::from_secs(60))
            .await
            .unwrap();
        dht.put_signed(key, b"from-b".to_vec(), 2, Duration::from_secs(60))
            .await
            .unwrap();
        let mut all = dht.get_all(key).await.unwrap();
        all.sort();
        assert_eq!(all, vec![b"from-a".to_vec(), b"from-b".to_vec()]);
    }

    #[tokio::test]
    async fn expired_values_are_not_returned() {
        let dht = InMemoryDht::new();
        let key = [4u8; 64];
        dht.put(key, b"short-lived".to_vec(), Duration::from_millis(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(dht.get(key).await.unwrap_err(), DhtError::NotFound);
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let dht = InMemoryDht::new();
        assert_eq!(dht.get([5u8; 64]).await.unwrap_err(), DhtError::NotFound);
    }
}

// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use tokio_stream::Stream;

use crate::error::DhtError;

/// A DHT key is always a 64-byte SHA3-512 digest (an Atlas key, §4.3).
pub type DhtKey = [u8; 64];

/// Distinguishes concurrent signed values published under the same key
/// (e.g. value_id=1 for the canonical outbox/GSK replacement slot).
pub type ValueId = u64;

pub const DEFAULT_GET_DEADLINE: Duration = Duration::from_secs(10);
pub const DEFAULT_PUT_DEADLINE: Duration = Duration::from_secs(30);

/// One inbound update delivered to a `listen` subscription.
#[derive(Debug, Clone)]
pub struct ListenEvent {
    pub key: DhtKey,
    pub value: Vec<u8>,
}

pub type ListenStream = Pin<Box<dyn Stream<Item = ListenEvent> + Send>>;

/// The opaque content-addressed DHT the core is built on top of (§4.4,
/// §6.6). Implementations must be safe for concurrent calls from
/// multiple tasks and must serialize their own subscription bookkeeping;
/// the core treats a single instance as a shared, cloneable handle.
#[async_trait]
pub trait DhtClient: Send + Sync {
    /// Unsigned put with a TTL. Replaces nothing; a fresh put simply
    /// ages out after `ttl`.
    async fn put(&self, key: DhtKey, value: Vec<u8>, ttl: Duration) -> Result<(), DhtError>;

    /// Signed put under `(key, value_id)`. A second put with the same
    /// `value_id` replaces the first (idempotent replacement semantics
    /// the outbox and GSK protocols rely on).
    async fn put_signed(
        &self,
        key: DhtKey,
        value: Vec<u8>,
        value_id: ValueId,
        ttl: Duration,
    ) -> Result<(), DhtError>;

    /// Put with no expiry.
    async fn put_permanent(&self, key: DhtKey, value: Vec<u8>) -> Result<(), DhtError>;

    /// Fetch the first value stored under `key`.
    async fn get(&self, key: DhtKey) -> Result<Vec<u8>, DhtError>;

    /// Fetch every value stored under `key` (multi-value keys, e.g.
    /// contact-request inboxes).
    async fn get_all(&self, key: DhtKey) -> Result<Vec<Vec<u8>>, DhtError>;

    /// Subscribe to future writes under `key`. Returns a subscription id
    /// (for [`DhtClient::cancel`]) and a stream of updates.
    async fn listen(&self, key: DhtKey) -> Result<(u64, ListenStream), DhtError>;

    /// Cancel a single subscription. Idempotent: cancelling an unknown
    /// or already-cancelled id is not an error.
    async fn cancel(&self, subscription_id: u64) -> Result<(), DhtError>;

    /// Cancel every subscription held by this client (engine shutdown,
    /// user logout).
    async fn cancel_all(&self) -> Result<(), DhtError>;
}

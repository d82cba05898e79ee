// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Durable engine-local state (§6.5): Spillway's per-pair counters,
//! Nexus's group records and GSK table, contacts, and the block list.
//! Message history (UI-facing only, not required for core correctness)
//! is persisted but never read back by the core itself.

mod error;
pub mod memory;
pub mod sqlite;

pub use error::StoreError;

use async_trait::async_trait;
use uuid::Uuid;

use dna_common::Fingerprint;

#[derive(Debug, Clone)]
pub struct ContactRecord {
    pub fingerprint: Fingerprint,
    pub note: Option<String>,
    pub added_at: u64,
}

/// Everything the pipeline, Spillway, Nexus and the contact-request flow
/// need persisted locally. Nexus's `Group` is opaque to the store — it
/// is handed serialized bytes and hands them back unchanged, so this
/// trait has no dependency on `crate::nexus`.
#[async_trait]
pub trait Store: Send + Sync {
    /// Atomically allocate and return the next `send_seq` for `peer`
    /// (starts at 1).
    async fn incr_send_seq(&self, peer: Fingerprint) -> Result<u64, StoreError>;

    async fn get_recv_seq(&self, peer: Fingerprint) -> Result<u64, StoreError>;
    async fn set_recv_seq(&self, peer: Fingerprint, seq: u64) -> Result<(), StoreError>;

    /// Per-`(group, sender)` receive counters (§4.9).
    async fn get_group_recv_seq(&self, group: Uuid, sender: Fingerprint) -> Result<u64, StoreError>;
    async fn set_group_recv_seq(
        &self,
        group: Uuid,
        sender: Fingerprint,
        seq: u64,
    ) -> Result<(), StoreError>;

    async fn save_group_blob(&self, group: Uuid, bytes: Vec<u8>) -> Result<(), StoreError>;
    async fn load_group_blob(&self, group: Uuid) -> Result<Option<Vec<u8>>, StoreError>;
    async fn list_group_ids(&self) -> Result<Vec<Uuid>, StoreError>;

    async fn put_gsk_blob(&self, group: Uuid, version: u32, blob: Vec<u8>) -> Result<(), StoreError>;
    async fn get_gsk_blob(&self, group: Uuid, version: u32) -> Result<Option<Vec<u8>>, StoreError>;
    async fn max_gsk_version(&self, group: Uuid) -> Result<Option<u32>, StoreError>;

    /// Every stored version for `group`, in no particular order — callers
    /// that need the freshest non-expired key sort and filter themselves
    /// (expiry lives inside the blob, not the store).
    async fn list_gsk_versions(&self, group: Uuid) -> Result<Vec<u32>, StoreError>;

    async fn add_contact(
        &self,
        fp: Fingerprint,
        note: Option<String>,
        added_at: u64,
    ) -> Result<(), StoreError>;
    async fn remove_contact(&self, fp: Fingerprint) -> Result<(), StoreError>;
    async fn is_contact(&self, fp: Fingerprint) -> Result<bool, StoreError>;
    async fn list_contacts(&self) -> Result<Vec<ContactRecord>, StoreError>;

    async fn block(&self, fp: Fingerprint) -> Result<(), StoreError>;
    async fn unblock(&self, fp: Fingerprint) -> Result<(), StoreError>;
    async fn is_blocked(&self, fp: Fingerprint) -> Result<bool, StoreError>;

    /// Locally dismiss a pending contact request from `fp` (§4.10
    /// `deny`) so it stops resurfacing from `list_requests` even though
    /// the DHT inbox entry itself is outside this party's control.
    async fn dismiss_request(&self, fp: Fingerprint) -> Result<(), StoreError>;
    async fn is_dismissed(&self, fp: Fingerprint) -> Result<bool, StoreError>;

    /// Persist a decrypted message for UI history. Never read back by
    /// the core's own correctness logic.
    async fn save_message(
        &self,
        peer: Fingerprint,
        timestamp: u64,
        outgoing: bool,
        plaintext: Vec<u8>,
    ) -> Result<(), StoreError>;
}

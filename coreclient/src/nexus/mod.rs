// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Nexus (§4.7): group creation, membership changes, and GSK rotation.
//! Rotation is owner-serialized — version allocation and IKP publication
//! happen under a single lock so two concurrent membership changes on
//! the same engine can't allocate the same version twice.

mod error;
mod group;
mod gsk;
mod ikp;

pub use error::NexusError;
pub use group::Group;

use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use tracing::warn;
use uuid::Uuid;

use dna_common::Fingerprint;
use dna_dht::{chunked_get, chunked_put_signed, DhtClient};
use dna_primitives::{DsaPublicKey, DsaSecretKey, KemPublicKey, KemSecretKey};

use crate::atlas::{atlas_key, AtlasRole};
use crate::keyserver::KeyserverClient;
use crate::seal;
use crate::store::Store;

const GSK_VALUE_ID: u64 = 1;

pub struct NexusEngine<D: DhtClient, S: Store> {
    dht: Arc<D>,
    store: Arc<S>,
    keyserver: Arc<KeyserverClient<D>>,
    self_fingerprint: Fingerprint,
    self_kem_pk: KemPublicKey,
    self_kem_sk: KemSecretKey,
    self_dsa_sk: DsaSecretKey,
    rotation_lock: AsyncMutex<()>,
}

impl<D: DhtClient, S: Store> NexusEngine<D, S> {
    pub fn new(
        dht: Arc<D>,
        store: Arc<S>,
        keyserver: Arc<KeyserverClient<D>>,
        self_fingerprint: Fingerprint,
        self_kem_pk: KemPublicKey,
        self_kem_sk: KemSecretKey,
        self_dsa_sk: DsaSecretKey,
    ) -> Self {
        Self {
            dht,
            store,
            keyserver,
            self_fingerprint,
            self_kem_pk,
            self_kem_sk,
            self_dsa_sk,
            rotation_lock: AsyncMutex::new(()),
        }
    }

    async fn load_group(&self, group_uuid: Uuid) -> Result<Group, NexusError> {
        let blob = self
            .store
            .load_group_blob(group_uuid)
            .await?
            .ok_or(NexusError::UnknownGroup(group_uuid))?;
        Ok(Group::from_bytes(&blob)?)
    }

    async fn save_group(&self, group: &Group) -> Result<(), NexusError> {
        let blob = group.to_bytes()?;
        self.store.save_group_blob(group.group_uuid, blob).await?;
        Ok(())
    }

    /// Create a new group containing only the caller.
    pub async fn create_group(&self, name: String, now: u64) -> Result<Group, NexusError> {
        let group = Group::new(name, self.self_fingerprint, now);
        self.save_group(&group).await?;
        self.rotate(&group, now).await?;
        Ok(group)
    }

    pub async fn add_member(
        &self,
        group_uuid: Uuid,
        new_member: Fingerprint,
        now: u64,
    ) -> Result<(), NexusError> {
        let _guard = self.rotation_lock.lock().await;
        let mut group = self.load_group(group_uuid).await?;
        if !group.is_owner(self.self_fingerprint) {
            return Err(NexusError::NotGroupOwner);
        }
        group.add_member(new_member);
        self.save_group(&group).await?;
        self.rotate(&group, now).await
    }

    /// Remove a member and rotate the GSK so they can't decrypt future
    /// group traffic (§4.7 forward secrecy).
    pub async fn remove_member(
        &self,
        group_uuid: Uuid,
        member: Fingerprint,
        now: u64,
    ) -> Result<(), NexusError> {
        let _guard = self.rotation_lock.lock().await;
        let mut group = self.load_group(group_uuid).await?;
        if !group.is_owner(self.self_fingerprint) {
            return Err(NexusError::NotGroupOwner);
        }
        group.remove_member(member);
        self.save_group(&group).await?;
        self.rotate(&group, now).await
    }

    /// Allocate the next GSK version, wrap it for every resolvable
    /// member, and publish the IKP. Must be called with `rotation_lock`
    /// held.
    async fn rotate(&self, group: &Group, now: u64) -> Result<(), NexusError> {
        let next_version = self
            .store
            .max_gsk_version(group.group_uuid)
            .await?
            .map(|v| v + 1)
            .unwrap_or(1);

        let gsk = gsk::generate_gsk_bytes()?;
        let own_blob = gsk::seal_gsk_blob(&self.self_kem_pk, group.group_uuid, next_version, &gsk, now)?;
        self.store
            .put_gsk_blob(group.group_uuid, next_version, own_blob)
            .await?;

        let mut resolved = Vec::with_capacity(group.members.len());
        for member_fp in &group.members {
            if *member_fp == self.self_fingerprint {
                resolved.push((*member_fp, KemPublicKey(self.self_kem_pk.0)));
                continue;
            }
            match self.keyserver.lookup(&member_fp.to_hex()).await {
                Ok(result) => {
                    let mut bytes = [0u8; dna_primitives::KEM_PUBLIC_KEY_LEN];
                    if result.record.kem_public_key.len() == bytes.len() {
                        bytes.copy_from_slice(&result.record.kem_public_key);
                        resolved.push((*member_fp, KemPublicKey(bytes)));
                    } else {
                        warn!(fingerprint = %member_fp, "malformed kem public key, skipping member");
                    }
                }
                Err(_) => {
                    warn!(fingerprint = %member_fp, "member key unavailable, skipping for this rotation");
                }
            }
        }

        let ikp = ikp::build_ikp(
            group.group_uuid,
            next_version,
            &gsk,
            &resolved,
            self.self_fingerprint,
            &self.self_dsa_sk,
            now,
        )?;

        let role = AtlasRole::GroupGsk {
            group_uuid: group.group_uuid,
        };
        let key = atlas_key(&role);
        chunked_put_signed(
            self.dht.as_ref(),
            key,
            &ikp,
            GSK_VALUE_ID,
            std::time::Duration::from_secs(role.ttl_secs()),
        )
        .await?;

        Ok(())
    }

    /// Pull the current IKP for `group_uuid`, extract this party's GSK
    /// entry, and persist it locally.
    pub async fn sync_ikp(&self, group_uuid: Uuid) -> Result<u32, NexusError> {
        let group = self.load_group(group_uuid).await?;
        let owner_record = self
            .keyserver
            .lookup(&group.owner_fingerprint.to_hex())
            .await
            .map_err(|_| NexusError::MemberKeyUnavailable(group.owner_fingerprint))?;

        let key = atlas_key(&AtlasRole::GroupGsk { group_uuid });
        let bytes = chunked_get(self.dht.as_ref(), key).await?;
        let parsed = ikp::verify_ikp(&bytes, &owner_record.record.dsa_public_key)?;
        let gsk = parsed.extract_for(self.self_fingerprint, &self.self_kem_sk, group_uuid)?;

        let blob = gsk::seal_gsk_blob(
            &self.self_kem_pk,
            group_uuid,
            parsed.version,
            &gsk,
            parsed.created_at,
        )?;
        self.store
            .put_gsk_blob(group_uuid, parsed.version, blob)
            .await?;
        Ok(parsed.version)
    }

    /// Select the highest-versioned GSK whose validity window hasn't
    /// lapsed (§4.7 `load_active`: `expires_at > now`). A version whose
    /// blob is present but expired is skipped, not deleted — it stays
    /// around for opening messages sent while it was still active.
    async fn active_gsk(&self, group_uuid: Uuid, now: u64) -> Result<(u32, [u8; 32]), NexusError> {
        let mut versions = self.store.list_gsk_versions(group_uuid).await?;
        versions.sort_unstable_by(|a, b| b.cmp(a));

        for version in versions {
            let Some(blob) = self.store.get_gsk_blob(group_uuid, version).await? else {
                continue;
            };
            let (_, expires_at) = gsk::blob_expiry(group_uuid, version, &blob)?;
            if expires_at <= now {
                continue;
            }
            let gsk = gsk::open_gsk_blob(&self.self_kem_sk, group_uuid, version, &blob)?;
            return Ok((version, gsk));
        }
        Err(NexusError::GskVersionUnknown(group_uuid))
    }

    /// Seal `plaintext` under the group's current, non-expired GSK.
    pub async fn seal_for_group(
        &self,
        group_uuid: Uuid,
        plaintext: &[u8],
        timestamp: u64,
    ) -> Result<Vec<u8>, NexusError> {
        let (_version, gsk) = self.active_gsk(group_uuid, timestamp).await?;
        Ok(seal::seal_nexus(
            plaintext,
            &gsk,
            &self.self_dsa_sk,
            self.self_fingerprint,
            timestamp,
        )?)
    }

    /// Try every locally known GSK for `group_uuid`, newest first,
    /// against `envelope` — the Nexus wire format carries no version
    /// number, so the receiver discriminates by which key's AEAD check
    /// actually passes (the same first-success-wins shape `seal::open`
    /// uses across multi-recipient entries). Returns `Ok(None)` rather
    /// than an error when nothing opens it, so the caller can decide
    /// whether that's worth a `sync_ikp` retry.
    async fn try_open_with_known_gsks(
        &self,
        group_uuid: Uuid,
        envelope: &[u8],
        sender_pk_dsa: &DsaPublicKey,
        max_len: usize,
    ) -> Result<Option<(Fingerprint, u64, Vec<u8>)>, NexusError> {
        let mut versions = self.store.list_gsk_versions(group_uuid).await?;
        versions.sort_unstable_by(|a, b| b.cmp(a));

        for version in versions {
            let Some(blob) = self.store.get_gsk_blob(group_uuid, version).await? else {
                continue;
            };
            let Ok(gsk) = gsk::open_gsk_blob(&self.self_kem_sk, group_uuid, version, &blob) else {
                continue;
            };
            if let Ok(result) = seal::open_nexus(envelope, &gsk, sender_pk_dsa, max_len) {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }

    /// Open a group message, pulling a fresh IKP and retrying once if no
    /// locally known GSK opens it (§4.9).
    pub async fn open_group_message(
        &self,
        group_uuid: Uuid,
        envelope: &[u8],
        sender_pk_dsa: &DsaPublicKey,
        max_len: usize,
    ) -> Result<(Fingerprint, u64, Vec<u8>), NexusError> {
        if let Some(result) = self
            .try_open_with_known_gsks(group_uuid, envelope, sender_pk_dsa, max_len)
            .await?
        {
            return Ok(result);
        }

        self.sync_ikp(group_uuid).await?;
        self.try_open_with_known_gsks(group_uuid, envelope, sender_pk_dsa, max_len)
            .await?
            .ok_or(NexusError::GskVersionUnknown(group_uuid))
    }
}

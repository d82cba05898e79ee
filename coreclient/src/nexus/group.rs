// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The local record of a Nexus group's membership (§4.7). Persisted as
//! an opaque blob by [`crate::store::Store`]; the store never interprets
//! its contents.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dna_common::Fingerprint;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub group_uuid: Uuid,
    pub name: String,
    pub owner_fingerprint: Fingerprint,
    pub members: Vec<Fingerprint>,
    pub created_at: u64,
}

impl Group {
    pub fn new(name: String, owner_fingerprint: Fingerprint, created_at: u64) -> Self {
        Self {
            group_uuid: Uuid::new_v4(),
            name,
            members: vec![owner_fingerprint],
            owner_fingerprint,
            created_at,
        }
    }

    pub fn is_owner(&self, fp: Fingerprint) -> bool {
        self.owner_fingerprint == fp
    }

    pub fn is_member(&self, fp: Fingerprint) -> bool {
        self.members.contains(&fp)
    }

    pub fn add_member(&mut self, fp: Fingerprint) {
        if !self.members.contains(&fp) {
            self.members.push(fp);
        }
    }

    pub fn remove_member(&mut self, fp: Fingerprint) {
        self.members.retain(|m| *m != fp);
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, dna_common::codec::CodecError> {
        dna_common::codec::canonical_json_bytes(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, dna_common::codec::CodecError> {
        serde_json::from_slice(bytes)
            .map_err(|e| dna_common::codec::CodecError::Canonicalize(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(b: u8) -> Fingerprint {
        Fingerprint::from_bytes(&[b; 64]).unwrap()
    }

    #[test]
    fn new_group_starts_with_owner_as_sole_member() {
        let owner = fp(1);
        let group = Group::new("friends".into(), owner, 1_700_000_000);
        assert!(group.is_owner(owner));
        assert!(group.is_member(owner));
        assert_eq!(group.members.len(), 1);
    }

    #[test]
    fn add_and_remove_member() {
        let owner = fp(1);
        let member = fp(2);
        let mut group = Group::new("friends".into(), owner, 1_700_000_000);
        group.add_member(member);
        assert!(group.is_member(member));
        group.remove_member(member);
        assert!(!group.is_member(member));
    }

    #[test]
    fn blob_round_trip_preserves_fields() {
        let owner = fp(3);
        let mut group = Group::new("book club".into(), owner, 1_700_000_000);
        group.add_member(fp(4));
        let bytes = group.to_bytes().unwrap();
        let decoded = Group::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.group_uuid, group.group_uuid);
        assert_eq!(decoded.members, group.members);
    }
}

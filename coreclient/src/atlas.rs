// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Atlas (§4.3): a pure, deterministic function from `(role, fingerprint,
//! counterparty?)` to a 64-byte DHT key. No secrets, no I/O — every
//! implementation of the core that agrees on fingerprints and roles
//! agrees on keys.
//!
//! The derivation is intentionally public: anyone who knows both
//! fingerprints in a pair can enumerate that pair's outbox/watermark
//! keys. A salted scheme was considered and rejected for this baseline
//! (open question, see design notes).

use dna_common::{time, Fingerprint};
use sha3::{Digest, Sha3_512};
use uuid::Uuid;

/// Every role an Atlas key can be derived for, carrying exactly the
/// identifiers its base string needs (§4.3).
#[derive(Debug, Clone)]
pub enum AtlasRole {
    Presence { fp: Fingerprint },
    Outbox { from: Fingerprint, to: Fingerprint },
    Watermark { owner: Fingerprint, from: Fingerprint },
    Profile { fp: Fingerprint },
    NameLookup { name: String },
    ContactRequestInbox { fp: Fingerprint },
    ContactList { fp: Fingerprint },
    GroupGsk { group_uuid: Uuid },
    GroupMessages { group_uuid: Uuid },
}

impl AtlasRole {
    fn base_string(&self) -> String {
        match self {
            AtlasRole::Presence { fp } => fp.to_hex(),
            AtlasRole::Outbox { from, to } => format!("{}:outbox:{}", from.to_hex(), to.to_hex()),
            AtlasRole::Watermark { owner, from } => {
                format!("{}:watermark:{}", owner.to_hex(), from.to_hex())
            }
            AtlasRole::Profile { fp } => format!("{}:profile", fp.to_hex()),
            AtlasRole::NameLookup { name } => format!("{}:lookup", name.to_lowercase()),
            AtlasRole::ContactRequestInbox { fp } => format!("{}:requests", fp.to_hex()),
            AtlasRole::ContactList { fp } => format!("{}:contactlist", fp.to_hex()),
            AtlasRole::GroupGsk { group_uuid } => format!("dna:group:{}:gsk", group_uuid),
            AtlasRole::GroupMessages { group_uuid } => format!("dna:group:{}:msg", group_uuid),
        }
    }

    /// TTL the caller should use when publishing under this role's key
    /// (§4.3 table).
    pub fn ttl_secs(&self) -> u64 {
        match self {
            AtlasRole::Presence { .. } => time::PRESENCE_TTL_SECS,
            AtlasRole::Outbox { .. } => time::OUTBOX_TTL_SECS,
            AtlasRole::Watermark { .. } => time::WATERMARK_TTL_SECS,
            AtlasRole::Profile { .. } => time::PROFILE_TTL_SECS,
            AtlasRole::NameLookup { .. } => time::NAME_VALIDITY_SECS,
            AtlasRole::ContactRequestInbox { .. } => time::CONTACT_REQUEST_TTL_SECS,
            AtlasRole::ContactList { .. } => time::OUTBOX_TTL_SECS,
            AtlasRole::GroupGsk { .. } => time::IKP_TTL_SECS,
            AtlasRole::GroupMessages { .. } => time::SPILLWAY_MESSAGE_TTL_SECS,
        }
    }
}

/// Derive the 64-byte DHT key for `role`: `SHA3-512(base_string)`.
pub fn atlas_key(role: &AtlasRole) -> [u8; 64] {
    let base = role.base_string();
    let mut out = [0u8; 64];
    out.copy_from_slice(&Sha3_512::digest(base.as_bytes()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(byte: u8) -> Fingerprint {
        Fingerprint::from_bytes(&[byte; 64]).unwrap()
    }

    #[test]
    fn outbox_key_is_order_sensitive() {
        let a = fp(1);
        let b = fp(2);
        let ab = atlas_key(&AtlasRole::Outbox { from: a.clone(), to: b.clone() });
        let ba = atlas_key(&AtlasRole::Outbox { from: b, to: a });
        assert_ne!(ab, ba);
    }

    #[test]
    fn key_derivation_is_deterministic() {
        let a = fp(3);
        let k1 = atlas_key(&AtlasRole::Profile { fp: a.clone() });
        let k2 = atlas_key(&AtlasRole::Profile { fp: a });
        assert_eq!(k1, k2);
    }

    #[test]
    fn name_lookup_is_case_insensitive() {
        let k1 = atlas_key(&AtlasRole::NameLookup {
            name: "Alice".to_string(),
        });
        let k2 = atlas_key(&AtlasRole::NameLookup {
            name: "alice".to_string(),
        });
        assert_eq!(k1, k2);
    }

    #[test]
    fn distinct_roles_for_same_fingerprint_differ() {
        let a = fp(4);
        let presence = atlas_key(&AtlasRole::Presence { fp: a.clone() });
        let profile = atlas_key(&AtlasRole::Profile { fp: a });
        assert_ne!(presence, profile);
    }
}

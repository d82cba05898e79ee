// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;

use dna_dht::DhtError;
use dna_primitives::PrimitiveError;

use crate::contacts::ContactError;
use crate::identity::IdentityError;
use crate::keyserver::KeyserverError;
use crate::nexus::NexusError;
use crate::seal::SealError;
use crate::spillway::SpillwayError;
use crate::store::StoreError;

/// Top-level error taxonomy (§7), aggregating every submodule's errors
/// via `#[from]`. Crypto and identity errors on inbound traffic are
/// logged and the offending message is dropped or quarantined; they
/// never abort the receive loop (enforced by the pipeline, not by this
/// type).
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),
    #[error("invalid name: {0}")]
    InvalidName(String),
    #[error("envelope too large: {size} bytes exceeds cap {cap}")]
    EnvelopeTooLarge { size: usize, cap: usize },
    #[error("unknown wire version {0}")]
    UnknownVersion(u8),
    #[error("outbound queue is full")]
    QueueFull,
    #[error("not a contact")]
    NotAContact,
    #[error("sender is blocked")]
    BlockedSender,

    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Keyserver(#[from] KeyserverError),
    #[error(transparent)]
    Seal(#[from] SealError),
    #[error(transparent)]
    Nexus(#[from] NexusError),
    #[error(transparent)]
    Spillway(#[from] SpillwayError),
    #[error(transparent)]
    Contact(#[from] ContactError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Dht(#[from] DhtError),
    #[error(transparent)]
    Primitive(#[from] PrimitiveError),
}

pub type CoreResult<T> = Result<T, CoreError>;

// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;

use dna_common::codec::CodecError;
use dna_dht::DhtError;
use dna_primitives::PrimitiveError;

use crate::seal::SealError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum NexusError {
    #[error("only the group owner may perform this operation")]
    NotGroupOwner,
    #[error("group {0} is not known locally")]
    UnknownGroup(uuid::Uuid),
    #[error("member key unavailable for fingerprint {0}")]
    MemberKeyUnavailable(dna_common::Fingerprint),
    #[error("invitation key packet signature is invalid")]
    IkpSignatureInvalid,
    #[error("this party's entry in the invitation key packet could not be unwrapped")]
    IkpUnwrapFailed,
    #[error("invitation key packet has no entry for this party")]
    IkpNoEntryForSelf,
    #[error("group shared key version {0} not found for group {1}")]
    GskNotFoundForVersion(u32, uuid::Uuid),
    #[error("no active group shared key for group {0}")]
    GskVersionUnknown(uuid::Uuid),
    #[error(transparent)]
    Seal(#[from] SealError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Dht(#[from] DhtError),
    #[error(transparent)]
    Primitive(#[from] PrimitiveError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;

use dna_common::codec::CodecError;
use dna_dht::DhtError;

use crate::keyserver::KeyserverError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ContactError {
    #[error("contact request signature is invalid")]
    SignatureInvalid,
    #[error("greeting exceeds the maximum length")]
    GreetingTooLong,
    #[error("proposer's identity could not be resolved")]
    ProposerUnresolvable,
    #[error(transparent)]
    Keyserver(#[from] KeyserverError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Dht(#[from] DhtError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

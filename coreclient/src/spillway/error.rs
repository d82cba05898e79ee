// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;

use dna_common::codec::CodecError;
use dna_dht::DhtError;

use crate::seal::SealError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum SpillwayError {
    #[error("message is malformed: {0}")]
    Malformed(String),
    #[error("message has expired")]
    Expired,
    #[error(transparent)]
    Seal(#[from] SealError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Dht(#[from] DhtError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;

use dna_common::codec::CodecError;
use dna_dht::DhtError;

#[derive(Error, Debug)]
pub enum KeyserverError {
    #[error("identity not found")]
    IdentityNotFound,
    #[error("name not found")]
    NameNotFound,
    #[error("identity verification failed")]
    IdentityVerificationFailed,
    #[error("only a stale cached copy is available")]
    StaleCacheOnly,
    #[error(transparent)]
    Dht(#[from] DhtError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

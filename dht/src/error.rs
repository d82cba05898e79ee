// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;

/// Failure taxonomy for the DHT substrate (§4.4). The adapter never
/// blocks indefinitely; every call respects a per-operation deadline,
/// surfaced here as [`DhtError::Timeout`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DhtError {
    #[error("key not found")]
    NotFound,
    #[error("value failed to parse")]
    InvalidValue,
    #[error("operation timed out")]
    Timeout,
    #[error("network disconnected")]
    NetworkDisconnected,
    #[error("chunk hash mismatch")]
    ChunkHashMismatch,
    #[error("substrate error: {0}")]
    SubstrateError(String),
}

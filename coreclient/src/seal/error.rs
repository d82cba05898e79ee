// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;

use dna_common::codec::CodecError;
use dna_primitives::PrimitiveError;

#[derive(Error, Debug)]
pub enum SealError {
    #[error("envelope too large: {size} bytes exceeds cap {cap}")]
    EnvelopeTooLarge { size: usize, cap: usize },
    #[error("unknown wire version {0}")]
    UnknownVersion(u8),
    #[error("malformed envelope: {0}")]
    Malformed(String),
    #[error("no recipient entry could be opened with the available key(s)")]
    NoMatchingRecipient,
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("signature invalid")]
    SignatureInvalid,
    #[error("sender identity mismatch")]
    IdentityMismatch,
    #[error("recipient count must be between 1 and 255")]
    InvalidRecipientCount,
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Primitive(#[from] PrimitiveError),
}

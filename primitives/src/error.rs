// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;

/// The crypto error taxonomy of §4.1/§7. Every fallible primitive returns
/// one of these; none panic on untrusted input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrimitiveError {
    #[error("AEAD decryption failed (tag mismatch or truncated ciphertext)")]
    DecryptionFailed,
    #[error("DSA-87 signature verification failed")]
    SignatureInvalid,
    #[error("ML-KEM-1024 decapsulation failed")]
    DecapsFailed,
    #[error("AES key-unwrap failed (integrity check mismatch)")]
    KeyUnwrapFailed,
    #[error("input had the wrong length for this operation: expected {expected}, got {got}")]
    WrongLength { expected: usize, got: usize },
    #[error("the requested random byte count is unreasonably large")]
    RngRequestTooLarge,
}

// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;

use dna_common::codec::CodecError;
use dna_primitives::PrimitiveError;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("mnemonic is invalid")]
    MnemonicInvalid,
    #[error("password is incorrect")]
    PasswordIncorrect,
    #[error("identity file is corrupt: {0}")]
    Corrupt(String),
    #[error("record signature is invalid")]
    RecordSignatureInvalid,
    #[error("fingerprint does not match dsa public key")]
    FingerprintMismatch,
    #[error("invalid name: {0}")]
    InvalidName(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Primitive(#[from] PrimitiveError),
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for IdentityError {
    fn from(e: std::io::Error) -> Self {
        IdentityError::Io(e.to_string())
    }
}

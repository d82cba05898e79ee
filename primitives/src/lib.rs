// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Post-quantum and classical cryptographic primitives facade.
//!
//! Every operation here is a thin, typed wrapper over a single
//! RustCrypto (or RustCrypto-adjacent) crate. Nothing in this crate
//! knows about envelopes, groups, or identities — that composition
//! lives in `dna-coreclient`.

pub mod aead;
pub mod dsa;
pub mod error;
pub mod hash;
pub mod kdf;
pub mod kem;
pub mod keywrap;
pub mod rng;

pub use aead::{aead_open, aead_seal, AEAD_KEY_LEN, AEAD_NONCE_LEN, AEAD_TAG_LEN};
pub use dsa::{
    dsa_keypair_from_seed, dsa_sign, dsa_verify, DsaPublicKey, DsaSecretKey, DSA_PUBLIC_KEY_LEN,
    DSA_SECRET_KEY_LEN, DSA_SIGNATURE_MAX_LEN,
};
pub use error::PrimitiveError;
pub use hash::{sha3_512, SHA3_512_LEN};
pub use kdf::{hkdf_sha3_512, pbkdf2_hmac_sha512_mnemonic, pbkdf2_sha256};
pub use kem::{
    kem_decaps, kem_encaps, kem_keypair_from_seed, KemCiphertext, KemPublicKey, KemSecretKey,
    KemSharedSecret, KEM_CIPHERTEXT_LEN, KEM_PUBLIC_KEY_LEN, KEM_SECRET_KEY_LEN,
    KEM_SHARED_SECRET_LEN,
};
pub use keywrap::{aes_keyunwrap, aes_keywrap, DEK_LEN, KEK_LEN, WRAPPED_DEK_LEN};
pub use rng::{rng, rng_from_seed};

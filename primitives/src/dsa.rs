// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! ML-DSA-87 (§4.1): `dsa_keypair_from_seed`, `dsa_sign`, `dsa_verify`.
//!
//! Built on the RustCrypto `ml-dsa` crate for the same reason as
//! [`crate::kem`]: deterministic keygen from a seed via a seeded RNG.

use ml_dsa::{
    EncodedSigningKey, EncodedVerifyingKey, KeyGen, MlDsa87, Signature, SigningKey, VerifyingKey,
};
use signature::{Signer, Verifier};
use zeroize::Zeroizing;

use crate::{error::PrimitiveError, rng::rng_from_seed};

pub const DSA_PUBLIC_KEY_LEN: usize = 2592;
pub const DSA_SECRET_KEY_LEN: usize = 4896;
pub const DSA_SIGNATURE_MAX_LEN: usize = 4627;

pub struct DsaPublicKey(pub [u8; DSA_PUBLIC_KEY_LEN]);
pub struct DsaSecretKey(SigningKey<MlDsa87>);

impl DsaPublicKey {
    pub fn as_bytes(&self) -> &[u8; DSA_PUBLIC_KEY_LEN] {
        &self.0
    }
}

impl DsaSecretKey {
    /// Encode for at-rest storage (§4.2 `save_encrypted`).
    pub fn to_bytes(&self) -> Zeroizing<[u8; DSA_SECRET_KEY_LEN]> {
        let mut out = [0u8; DSA_SECRET_KEY_LEN];
        out.copy_from_slice(self.0.encode().as_slice());
        Zeroizing::new(out)
    }

    /// Inverse of [`DsaSecretKey::to_bytes`].
    pub fn from_bytes(bytes: &[u8; DSA_SECRET_KEY_LEN]) -> Result<Self, PrimitiveError> {
        let encoded: EncodedSigningKey<MlDsa87> = bytes
            .as_slice()
            .try_into()
            .map_err(|_| PrimitiveError::WrongLength {
                expected: DSA_SECRET_KEY_LEN,
                got: bytes.len(),
            })?;
        Ok(DsaSecretKey(SigningKey::<MlDsa87>::decode(&encoded)))
    }
}

/// Deterministically derive an ML-DSA-87 keypair from a 32-byte seed.
pub fn dsa_keypair_from_seed(seed: [u8; 32]) -> (DsaPublicKey, DsaSecretKey) {
    let mut rng = rng_from_seed(seed);
    let kp = MlDsa87::key_gen(&mut rng);

    let mut pk = [0u8; DSA_PUBLIC_KEY_LEN];
    pk.copy_from_slice(kp.verifying_key().encode().as_slice());

    (DsaPublicKey(pk), DsaSecretKey(kp.signing_key().clone()))
}

/// Sign `msg` (the user plaintext only, per §4.6 step 4 — never the
/// envelope).
pub fn dsa_sign(sk: &DsaSecretKey, msg: &[u8]) -> Zeroizing<Vec<u8>> {
    let sig: Signature<MlDsa87> = sk.0.sign(msg);
    Zeroizing::new(sig.encode().as_slice().to_vec())
}

/// Verify `sig` over `msg` under `pk`.
pub fn dsa_verify(pk: &DsaPublicKey, msg: &[u8], sig: &[u8]) -> Result<(), PrimitiveError> {
    let encoded: EncodedVerifyingKey<MlDsa87> = pk
        .0
        .as_slice()
        .try_into()
        .map_err(|_| PrimitiveError::SignatureInvalid)?;
    let verifying_key = VerifyingKey::<MlDsa87>::decode(&encoded);
    let signature =
        Signature::<MlDsa87>::decode(sig).ok_or(PrimitiveError::SignatureInvalid)?;
    verifying_key
        .verify(msg, &signature)
        .map_err(|_| PrimitiveError::SignatureInvalid)
}

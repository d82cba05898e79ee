// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Secure randomness (§4.1: `rng(n) -> bytes`) and the deterministic,
//! seeded RNG used by the `*_from_seed` keygen entry points.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::error::PrimitiveError;

/// Fill `n` bytes from the OS CSPRNG.
pub fn rng(n: usize) -> Result<Vec<u8>, PrimitiveError> {
    // A generous but finite cap keeps this from being used as an
    // unbounded-allocation vector if `n` is ever attacker-influenced.
    const MAX_RNG_REQUEST: usize = 16 * 1024 * 1024;
    if n > MAX_RNG_REQUEST {
        return Err(PrimitiveError::RngRequestTooLarge);
    }
    let mut buf = vec![0u8; n];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    Ok(buf)
}

/// A CSPRNG deterministically seeded from a 32-byte seed, used to make
/// DSA/KEM keypair generation reproducible from a derived seed (§4.2's
/// `generate_from_mnemonic`, §4.1's `*_keypair_from_seed`).
///
/// The seed itself must already be uniformly random (it is the output of
/// an HKDF/PBKDF2 expansion, never raw user input) — `ChaCha20Rng` is a
/// CSPRNG, not a KDF.
pub fn rng_from_seed(seed: [u8; 32]) -> ChaCha20Rng {
    ChaCha20Rng::from_seed(seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rng_from_seed_is_deterministic() {
        let mut a = rng_from_seed([7u8; 32]);
        let mut b = rng_from_seed([7u8; 32]);
        let mut out_a = [0u8; 32];
        let mut out_b = [0u8; 32];
        a.fill_bytes(&mut out_a);
        b.fill_bytes(&mut out_b);
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn rng_rejects_absurd_requests() {
        assert!(rng(usize::MAX).is_err());
    }
}

// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! SHA3-512 (§4.1).

use sha3::{Digest, Sha3_512};

pub const SHA3_512_LEN: usize = 64;

pub fn sha3_512(bytes: &[u8]) -> [u8; SHA3_512_LEN] {
    let mut out = [0u8; SHA3_512_LEN];
    out.copy_from_slice(&Sha3_512::digest(bytes));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_deterministic_and_avalanche() {
        let a = sha3_512(b"hello");
        let b = sha3_512(b"hello");
        let c = sha3_512(b"hellp");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}

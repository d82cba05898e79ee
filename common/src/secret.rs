// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Secret byte buffers that zeroize on drop (§4.1: "Secret buffers MUST
//! be zeroized on drop").

use zeroize::{Zeroize, ZeroizeOnDrop};

/// A heap-allocated secret buffer of unspecified length (DEKs, shared
/// secrets, wrapped keys, private-key bytes). Does not implement `Debug`
/// or `Clone` to discourage accidental copies or log leakage; callers that
/// need to inspect bytes use [`SecretBytes::expose`] explicitly.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for SecretBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_the_bytes_it_was_built_from() {
        let s = SecretBytes::new(vec![1, 2, 3]);
        assert_eq!(s.expose(), &[1, 2, 3]);
        assert_eq!(s.len(), 3);
    }
}

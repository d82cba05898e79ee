// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! AES Key Wrap (RFC 3394), §4.1: `aes_keywrap`/`aes_keyunwrap`. Wraps a
//! 32-byte DEK under a 32-byte KEK into the 40-byte `wrapped_dek` entries
//! of the Seal wire format (§6.1).

use aes_kw::KekAes256;

use crate::error::PrimitiveError;

pub const KEK_LEN: usize = 32;
pub const DEK_LEN: usize = 32;
pub const WRAPPED_DEK_LEN: usize = 40;

pub fn aes_keywrap(kek: &[u8; KEK_LEN], dek: &[u8; DEK_LEN]) -> [u8; WRAPPED_DEK_LEN] {
    let wrapper = KekAes256::new(kek.into());
    let mut out = [0u8; WRAPPED_DEK_LEN];
    wrapper
        .wrap(dek, &mut out)
        .expect("wrapping a 32-byte key into a 40-byte buffer cannot fail");
    out
}

pub fn aes_keyunwrap(
    kek: &[u8; KEK_LEN],
    wrapped: &[u8; WRAPPED_DEK_LEN],
) -> Result<[u8; DEK_LEN], PrimitiveError> {
    let wrapper = KekAes256::new(kek.into());
    let mut out = [0u8; DEK_LEN];
    wrapper
        .unwrap(wrapped, &mut out)
        .map_err(|_| PrimitiveError::KeyUnwrapFailed)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_unwrap_round_trip() {
        let kek = [9u8; KEK_LEN];
        let dek = [3u8; DEK_LEN];
        let wrapped = aes_keywrap(&kek, &dek);
        let unwrapped = aes_keyunwrap(&kek, &wrapped).unwrap();
        assert_eq!(unwrapped, dek);
    }

    #[test]
    fn unwrap_fails_under_wrong_kek() {
        let kek = [9u8; KEK_LEN];
        let other_kek = [8u8; KEK_LEN];
        let dek = [3u8; DEK_LEN];
        let wrapped = aes_keywrap(&kek, &dek);
        assert!(aes_keyunwrap(&other_kek, &wrapped).is_err());
    }
}

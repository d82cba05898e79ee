// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Two codecs used throughout the core:
//!
//! - canonical JSON, for identity records and contact-request records that
//!   must hash/sign identically across implementations (Design Notes,
//!   §4.2); key-sorted, no whitespace, UTF-8, integers as unquoted
//!   numerals, byte arrays as lowercase hex strings (the `Fingerprint`
//!   `Serialize` impl already does the latter).
//! - a small big-endian cursor reader/writer for the bit-exact binary wire
//!   formats of §6, which reject malformed input without ever panicking or
//!   over-allocating (§4.1, §4.6 edge cases).

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to canonicalize value: {0}")]
    Canonicalize(#[from] serde_json::Error),
    #[error("unexpected end of buffer: need {needed} more bytes, have {available}")]
    UnexpectedEof { needed: usize, available: usize },
    #[error("{0} trailing bytes after a fully-parsed value")]
    TrailingBytes(usize),
    #[error("length field {0} exceeds the configured cap of {1} bytes")]
    LengthCapExceeded(usize, usize),
}

/// Serialize `value` as key-sorted, whitespace-free JSON.
///
/// `serde_json::Map` is backed by a `BTreeMap` unless the crate's
/// `preserve_order` feature is enabled (it is not, here), so converting
/// through `serde_json::Value` already sorts object keys; `to_vec` then
/// emits the compact, no-whitespace form required for a stable signature
/// input.
pub fn canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let as_value = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&as_value)?)
}

/// A cursor over a byte slice that never panics: every read checks bounds
/// and returns [`CodecError::UnexpectedEof`] on a short buffer.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::UnexpectedEof {
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16_be(&mut self) -> Result<u16, CodecError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u32_be(&mut self) -> Result<u32, CodecError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, CodecError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64_be(&mut self) -> Result<u64, CodecError> {
        let b = self.take(8)?;
        let arr: [u8; 8] = b.try_into().expect("take(8) returns 8 bytes");
        Ok(u64::from_be_bytes(arr))
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        self.take(n)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let b = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(b);
        Ok(out)
    }

    /// Returns an error unless the cursor has consumed the entire buffer.
    /// Used at the top level of every envelope decoder so that truncated
    /// or padded input is rejected instead of silently accepted.
    pub fn expect_exhausted(&self) -> Result<(), CodecError> {
        if self.remaining() != 0 {
            return Err(CodecError::TrailingBytes(self.remaining()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }

    pub fn push_u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn push_u16_be(&mut self, v: u16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn push_u32_be(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn push_u32_le(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn push_u64_be(&mut self, v: u64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

/// Guards against allocating on attacker-controlled length fields before
/// they've been validated against a sane cap (§4.6 edge cases: envelopes
/// whose declared sizes exceed the cap are rejected without allocation).
pub fn check_len_cap(len: usize, cap: usize) -> Result<(), CodecError> {
    if len > cap {
        return Err(CodecError::LengthCapExceeded(len, cap));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Example {
        z_field: u32,
        a_field: String,
    }

    #[test]
    fn canonical_json_sorts_keys_and_has_no_whitespace() {
        let v = Example {
            z_field: 7,
            a_field: "hi".into(),
        };
        let bytes = canonical_json_bytes(&v).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"a_field":"hi","z_field":7}"#
        );
    }

    #[test]
    fn reader_rejects_short_buffers_without_panicking() {
        let mut r = ByteReader::new(&[1, 2]);
        assert_eq!(r.read_u8().unwrap(), 1);
        assert!(r.read_u32_be().is_err());
    }

    #[test]
    fn reader_round_trips_writer_output() {
        let mut w = ByteWriter::new();
        w.push_u32_be(42).push_u64_be(9001).push_bytes(b"hi");
        let bytes = w.into_vec();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.read_u32_be().unwrap(), 42);
        assert_eq!(r.read_u64_be().unwrap(), 9001);
        assert_eq!(r.read_bytes(2).unwrap(), b"hi");
        r.expect_exhausted().unwrap();
    }
}

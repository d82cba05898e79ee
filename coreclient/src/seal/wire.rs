// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The bit-exact Seal envelope header (§6.1).

use dna_common::codec::{ByteReader, ByteWriter, CodecError};

use super::error::SealError;

pub const MAGIC: &[u8; 8] = b"PQSIGENC";
pub const WIRE_VERSION: u8 = 0x08;
pub const ENC_TYPE_KEM1024: u8 = 0x02;
pub const MSG_TYPE_SEAL: u8 = 0x00;
pub const MSG_TYPE_NEXUS: u8 = 0x01;

pub const HEADER_LEN: usize = 20;
pub const KEM_CIPHERTEXT_LEN: usize = 1568;
pub const WRAPPED_DEK_LEN: usize = 40;
pub const RECIPIENT_ENTRY_LEN: usize = KEM_CIPHERTEXT_LEN + WRAPPED_DEK_LEN;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const MAX_RECIPIENTS: usize = 255;
pub const DEFAULT_MAX_ENVELOPE_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub rcpt_count: u8,
    pub msg_type: u8,
    pub encrypted_size: u32,
    pub signature_size: u32,
}

impl Header {
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut w = ByteWriter::with_capacity(HEADER_LEN);
        w.push_bytes(MAGIC);
        w.push_u8(WIRE_VERSION);
        w.push_u8(ENC_TYPE_KEM1024);
        w.push_u8(self.rcpt_count);
        w.push_u8(self.msg_type);
        w.push_u32_le(self.encrypted_size);
        w.push_u32_le(self.signature_size);
        let bytes = w.into_vec();
        let mut out = [0u8; HEADER_LEN];
        out.copy_from_slice(&bytes);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SealError> {
        if bytes.len() < HEADER_LEN {
            return Err(SealError::Malformed("envelope shorter than header".into()));
        }
        let mut r = ByteReader::new(&bytes[..HEADER_LEN]);
        let magic = r
            .read_array::<8>()
            .map_err(|_| SealError::Malformed("truncated magic".into()))?;
        if &magic != MAGIC {
            return Err(SealError::Malformed("bad magic".into()));
        }
        let version = r.read_u8().map_err(codec_err)?;
        if version != WIRE_VERSION {
            return Err(SealError::UnknownVersion(version));
        }
        let enc_type = r.read_u8().map_err(codec_err)?;
        if enc_type != ENC_TYPE_KEM1024 {
            return Err(SealError::Malformed(format!(
                "unsupported enc_type {enc_type}"
            )));
        }
        let rcpt_count = r.read_u8().map_err(codec_err)?;
        let msg_type = r.read_u8().map_err(codec_err)?;
        let encrypted_size = r.read_u32_le().map_err(codec_err)?;
        let signature_size = r.read_u32_le().map_err(codec_err)?;

        Ok(Header {
            rcpt_count,
            msg_type,
            encrypted_size,
            signature_size,
        })
    }
}

fn codec_err(e: CodecError) -> SealError {
    SealError::Malformed(e.to_string())
}

/// Validate that `envelope`'s declared sizes are internally consistent
/// and within `max_len`, without allocating or copying the body.
pub fn expected_total_len(header: &Header) -> usize {
    HEADER_LEN
        + header.rcpt_count as usize * RECIPIENT_ENTRY_LEN
        + NONCE_LEN
        + header.encrypted_size as usize
        + TAG_LEN
        + header.signature_size as usize
}

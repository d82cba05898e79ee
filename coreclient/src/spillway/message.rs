// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Spillway wire framing (§6.2): the per-message envelope, the outbox
//! array it's batched into, and the watermark value.

use dna_common::codec::{ByteReader, ByteWriter, CodecError};
use dna_common::Fingerprint;

use super::error::SpillwayError;

const MAGIC: &[u8; 4] = b"DNA ";
const WIRE_VERSION: u8 = 2;

/// One Spillway-framed message: a sequence number, timing, and the
/// opaque Seal/Nexus envelope it carries.
#[derive(Debug, Clone)]
pub struct SpillwayMessage {
    pub seq_num: u64,
    pub timestamp: u64,
    pub expiry: u64,
    pub sender: Fingerprint,
    pub recipient: Fingerprint,
    pub ciphertext: Vec<u8>,
}

impl SpillwayMessage {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(4 + 1 + 8 + 8 + 8 + 2 + 2 + 4 + 64 + 64 + self.ciphertext.len());
        w.push_bytes(MAGIC);
        w.push_u8(WIRE_VERSION);
        w.push_u64_be(self.seq_num);
        w.push_u64_be(self.timestamp);
        w.push_u64_be(self.expiry);
        w.push_u16_be(64);
        w.push_u16_be(64);
        w.push_u32_be(self.ciphertext.len() as u32);
        w.push_bytes(self.sender.as_bytes());
        w.push_bytes(self.recipient.as_bytes());
        w.push_bytes(&self.ciphertext);
        w.into_vec()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SpillwayError> {
        let mut r = ByteReader::new(bytes);
        let magic = r.read_array::<4>().map_err(codec_err)?;
        if &magic != MAGIC {
            return Err(SpillwayError::Malformed("bad magic".into()));
        }
        let version = r.read_u8().map_err(codec_err)?;
        if version != WIRE_VERSION {
            return Err(SpillwayError::Malformed(format!("unknown version {version}")));
        }
        let seq_num = r.read_u64_be().map_err(codec_err)?;
        let timestamp = r.read_u64_be().map_err(codec_err)?;
        let expiry = r.read_u64_be().map_err(codec_err)?;
        let sender_len = r.read_u16_be().map_err(codec_err)? as usize;
        let recipient_len = r.read_u16_be().map_err(codec_err)? as usize;
        let ciphertext_len = r.read_u32_be().map_err(codec_err)? as usize;

        if sender_len != 64 || recipient_len != 64 {
            return Err(SpillwayError::Malformed("fingerprint field must be 64 bytes".into()));
        }

        let sender_bytes = r.read_bytes(sender_len).map_err(codec_err)?;
        let recipient_bytes = r.read_bytes(recipient_len).map_err(codec_err)?;
        let ciphertext = r.read_bytes(ciphertext_len).map_err(codec_err)?.to_vec();
        r.expect_exhausted().map_err(codec_err)?;

        let sender = Fingerprint::from_bytes(sender_bytes)
            .map_err(|_| SpillwayError::Malformed("bad sender fingerprint".into()))?;
        let recipient = Fingerprint::from_bytes(recipient_bytes)
            .map_err(|_| SpillwayError::Malformed("bad recipient fingerprint".into()))?;

        Ok(SpillwayMessage {
            seq_num,
            timestamp,
            expiry,
            sender,
            recipient,
            ciphertext,
        })
    }
}

fn codec_err(e: CodecError) -> SpillwayError {
    SpillwayError::Malformed(e.to_string())
}

/// Encode a batch of messages as the outbox array framing: `count:u32be`
/// followed by `len:u32be || bytes` per message.
pub fn encode_outbox(messages: &[SpillwayMessage]) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.push_u32_be(messages.len() as u32);
    for msg in messages {
        let encoded = msg.encode();
        w.push_u32_be(encoded.len() as u32);
        w.push_bytes(&encoded);
    }
    w.into_vec()
}

pub fn decode_outbox(bytes: &[u8]) -> Result<Vec<SpillwayMessage>, SpillwayError> {
    let mut r = ByteReader::new(bytes);
    let count = r.read_u32_be().map_err(codec_err)?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let len = r.read_u32_be().map_err(codec_err)? as usize;
        let bytes = r.read_bytes(len).map_err(codec_err)?;
        out.push(SpillwayMessage::decode(bytes)?);
    }
    r.expect_exhausted().map_err(codec_err)?;
    Ok(out)
}

pub fn encode_watermark(seq: u64) -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(8);
    w.push_u64_be(seq);
    w.into_vec()
}

pub fn decode_watermark(bytes: &[u8]) -> Result<u64, SpillwayError> {
    let mut r = ByteReader::new(bytes);
    let seq = r.read_u64_be().map_err(codec_err)?;
    r.expect_exhausted().map_err(codec_err)?;
    Ok(seq)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(b: u8) -> Fingerprint {
        Fingerprint::from_bytes(&[b; 64]).unwrap()
    }

    #[test]
    fn message_round_trip() {
        let msg = SpillwayMessage {
            seq_num: 7,
            timestamp: 1_700_000_000,
            expiry: 1_700_600_000,
            sender: fp(1),
            recipient: fp(2),
            ciphertext: vec![1, 2, 3, 4, 5],
        };
        let encoded = msg.encode();
        let decoded = SpillwayMessage::decode(&encoded).unwrap();
        assert_eq!(decoded.seq_num, 7);
        assert_eq!(decoded.sender, fp(1));
        assert_eq!(decoded.ciphertext, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn outbox_round_trip_multiple_messages() {
        let msgs = vec![
            SpillwayMessage {
                seq_num: 1,
                timestamp: 10,
                expiry: 20,
                sender: fp(1),
                recipient: fp(2),
                ciphertext: vec![0xaa],
            },
            SpillwayMessage {
                seq_num: 2,
                timestamp: 11,
                expiry: 21,
                sender: fp(1),
                recipient: fp(2),
                ciphertext: vec![0xbb, 0xcc],
            },
        ];
        let encoded = encode_outbox(&msgs);
        let decoded = decode_outbox(&encoded).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[1].ciphertext, vec![0xbb, 0xcc]);
    }

    #[test]
    fn watermark_round_trip() {
        let encoded = encode_watermark(42);
        assert_eq!(decode_watermark(&encoded).unwrap(), 42);
    }

    #[test]
    fn truncated_message_is_rejected() {
        let msg = SpillwayMessage {
            seq_num: 1,
            timestamp: 1,
            expiry: 1,
            sender: fp(1),
            recipient: fp(2),
            ciphertext: vec![1, 2, 3],
        };
        let mut encoded = msg.encode();
        encoded.truncate(encoded.len() - 2);
        assert!(SpillwayMessage::decode(&encoded).is_err());
    }
}

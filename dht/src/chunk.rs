// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Chunked put/get for values too large for a single DHT entry (§4.4).
//!
//! A logical value larger than [`CHUNK_THRESHOLD`] is split into
//! fixed-size chunks, each published under its own derived key; a small
//! manifest is published at the logical key itself describing how to
//! reassemble and verify the pieces. Values at or below the threshold
//! are stored inline with no manifest indirection.

use std::time::Duration;

use sha3::{Digest, Sha3_512};
use tracing::debug;

use crate::client::{DhtClient, DhtKey};
use crate::error::DhtError;

pub const CHUNK_THRESHOLD: usize = 64 * 1024;
const CHUNK_SIZE: usize = 64 * 1024;

const TAG_INLINE: u8 = 0x00;
const TAG_MANIFEST: u8 = 0x01;

fn chunk_key(logical_key: &DhtKey, index: u32) -> DhtKey {
    let mut buf = Vec::with_capacity(64 + 7 + 4);
    buf.extend_from_slice(logical_key);
    buf.extend_from_slice(b":chunk:");
    buf.extend_from_slice(&index.to_be_bytes());
    let mut out = [0u8; 64];
    out.copy_from_slice(&Sha3_512::digest(&buf));
    out
}

fn encode_manifest(total_chunks: u32, total_size: u64, hash: &[u8; 64]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + 4 + 8 + 64);
    buf.push(TAG_MANIFEST);
    buf.extend_from_slice(&total_chunks.to_be_bytes());
    buf.extend_from_slice(&total_size.to_be_bytes());
    buf.extend_from_slice(hash);
    buf
}

struct Manifest {
    total_chunks: u32,
    total_size: u64,
    hash: [u8; 64],
}

fn decode_manifest(bytes: &[u8]) -> Result<Manifest, DhtError> {
    if bytes.len() != 1 + 4 + 8 + 64 || bytes[0] != TAG_MANIFEST {
        return Err(DhtError::InvalidValue);
    }
    let total_chunks = u32::from_be_bytes(bytes[1..5].try_into().unwrap());
    let total_size = u64::from_be_bytes(bytes[5..13].try_into().unwrap());
    let mut hash = [0u8; 64];
    hash.copy_from_slice(&bytes[13..77]);
    Ok(Manifest {
        total_chunks,
        total_size,
        hash,
    })
}

/// Publish `value` at `logical_key`, transparently chunking it across
/// multiple DHT entries if it exceeds [`CHUNK_THRESHOLD`].
pub async fn chunked_put(
    client: &dyn DhtClient,
    logical_key: DhtKey,
    value: &[u8],
    ttl: Duration,
) -> Result<(), DhtError> {
    if value.len() <= CHUNK_THRESHOLD {
        let mut framed = Vec::with_capacity(value.len() + 1);
        framed.push(TAG_INLINE);
        framed.extend_from_slice(value);
        return client.put(logical_key, framed, ttl).await;
    }

    let hash: [u8; 64] = {
        let mut out = [0u8; 64];
        out.copy_from_slice(&Sha3_512::digest(value));
        out
    };
    let chunks: Vec<&[u8]> = value.chunks(CHUNK_SIZE).collect();
    let total_chunks = chunks.len() as u32;
    debug!(total_chunks, total_size = value.len(), "chunked_put");

    for (i, chunk) in chunks.iter().enumerate() {
        let key = chunk_key(&logical_key, i as u32);
        client.put(key, chunk.to_vec(), ttl).await?;
    }

    let manifest = encode_manifest(total_chunks, value.len() as u64, &hash);
    client.put(logical_key, manifest, ttl).await
}

/// Same as [`chunked_put`] but using a signed replacement slot, for
/// logical values like the Spillway outbox or Nexus GSK packet that are
/// republished under a fixed `value_id`.
pub async fn chunked_put_signed(
    client: &dyn DhtClient,
    logical_key: DhtKey,
    value: &[u8],
    value_id: u64,
    ttl: Duration,
) -> Result<(), DhtError> {
    if value.len() <= CHUNK_THRESHOLD {
        let mut framed = Vec::with_capacity(value.len() + 1);
        framed.push(TAG_INLINE);
        framed.extend_from_slice(value);
        return client.put_signed(logical_key, framed, value_id, ttl).await;
    }

    let hash: [u8; 64] = {
        let mut out = [0u8; 64];
        out.copy_from_slice(&Sha3_512::digest(value));
        out
    };
    let chunks: Vec<&[u8]> = value.chunks(CHUNK_SIZE).collect();
    let total_chunks = chunks.len() as u32;

    for (i, chunk) in chunks.iter().enumerate() {
        let key = chunk_key(&logical_key, i as u32);
        client.put(key, chunk.to_vec(), ttl).await?;
    }

    let manifest = encode_manifest(total_chunks, value.len() as u64, &hash);
    client
        .put_signed(logical_key, manifest, value_id, ttl)
        .await
}

/// Fetch the value at `logical_key`, transparently reassembling and
/// hash-verifying chunks if it was stored chunked.
pub async fn chunked_get(client: &dyn DhtClient, logical_key: DhtKey) -> Result<Vec<u8>, DhtError> {
    let framed = client.get(logical_key).await?;
    if framed.is_empty() {
        return Err(DhtError::InvalidValue);
    }
    match framed[0] {
        TAG_INLINE => Ok(framed[1..].to_vec()),
        TAG_MANIFEST => {
            let manifest = decode_manifest(&framed)?;
            let mut full = Vec::with_capacity(manifest.total_size as usize);
            for i in 0..manifest.total_chunks {
                let key = chunk_key(&logical_key, i);
                let part = client.get(key).await?;
                full.extend_from_slice(&part);
            }
            if full.len() as u64 != manifest.total_size {
                return Err(DhtError::ChunkHashMismatch);
            }
            let mut actual = [0u8; 64];
            actual.copy_from_slice(&Sha3_512::digest(&full));
            if actual != manifest.hash {
                return Err(DhtError::ChunkHashMismatch);
            }
            Ok(full)
        }
        _ => Err(DhtError::InvalidValue),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryDht;

    #[tokio::test]
    async fn inline_round_trip() {
        let dht = InMemoryDht::new();
        let key = [7u8; 64];
        chunked_put(&dht, key, b"small value", Duration::from_secs(60))
            .await
            .unwrap();
        let got = chunked_get(&dht, key).await.unwrap();
        assert_eq!(got, b"small value");
    }

    #[tokio::test]
    async fn chunked_round_trip_across_boundary() {
        let dht = InMemoryDht::new();
        let key = [8u8; 64];
        let value = vec![0x5au8; CHUNK_THRESHOLD * 3 + 17];
        chunked_put(&dht, key, &value, Duration::from_secs(60))
            .await
            .unwrap();
        let got = chunked_get(&dht, key).await.unwrap();
        assert_eq!(got, value);
    }

    #[tokio::test]
    async fn tampered_chunk_fails_hash_check() {
        let dht = InMemoryDht::new();
        let key = [9u8; 64];
        let value = vec![0x11u8; CHUNK_THRESHOLD * 2 + 5];
        chunked_put(&dht, key, &value, Duration::from_secs(60))
            .await
            .unwrap();

        let bad_key = chunk_key(&key, 0);
        dht.put(bad_key, vec![0xffu8; 10], Duration::from_secs(60))
            .await
            .unwrap();

        let err = chunked_get(&dht, key).await.unwrap_err();
        assert_eq!(err, DhtError::ChunkHashMismatch);
    }
}

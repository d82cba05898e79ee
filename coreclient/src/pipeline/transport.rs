// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Peer transport (§6.6): an optional live-delivery fast path. The
//! pipeline always falls back to Spillway on failure, so a transport
//! that never succeeds is simply a no-op, never a correctness hazard.

use async_trait::async_trait;

use dna_common::Fingerprint;

#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Attempt live delivery of an already-sealed envelope. `true` means
    /// the peer acknowledged receipt; anything else (including an
    /// internal error) is treated as "try Spillway instead".
    async fn try_deliver(&self, peer: Fingerprint, envelope: &[u8]) -> bool;
}

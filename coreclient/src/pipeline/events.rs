// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The engine's single event sink (§5): a fan-out channel carrying both
//! pushed events (inbound messages, presence, degraded connectivity) and
//! the results of submitted requests, tagged by the request ID the
//! submitting call returned.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::error;
use uuid::Uuid;

use dna_common::Fingerprint;

const EVENT_CHANNEL_SIZE: usize = 1024;

/// Result of a completed send: a live [`crate::pipeline::PeerTransport`]
/// delivery carries no Spillway sequence number, while a queued send
/// does — conflating the two behind a bare `u64` would be ambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    Queued(u64),
}

#[derive(Debug, Clone)]
pub enum Event {
    /// Outcome of a submitted [`crate::pipeline::Engine::send_message`] or
    /// [`crate::pipeline::Engine::send_group_message`] call.
    SendCompleted {
        request_id: u64,
        result: Result<SendOutcome, String>,
    },
    MessageReceived {
        peer: Fingerprint,
        timestamp: u64,
        plaintext: Vec<u8>,
    },
    MessageQuarantined {
        peer: Fingerprint,
        seq_num: u64,
    },
    GroupMessageReceived {
        group_uuid: Uuid,
        sender: Fingerprint,
        timestamp: u64,
        plaintext: Vec<u8>,
    },
    /// A coalesced online/offline transition; redundant repeats of the
    /// same state for the same peer are dropped before reaching the sink.
    Presence { peer: Fingerprint, online: bool },
    /// Raised once a retried DHT operation has failed
    /// [`crate::utils::FAILURE_NOTIFY_THRESHOLD`] consecutive times.
    DhtDegraded { consecutive_failures: u32 },
    /// Raised the first time an operation succeeds after a prior
    /// [`Event::DhtDegraded`] — listeners are re-established at this point.
    ListenersReestablished,
    Lagged { skipped: u64 },
}

#[derive(Clone)]
pub struct EventSink {
    tx: broadcast::Sender<Arc<Event>>,
}

impl EventSink {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self { tx }
    }

    pub fn notify(&self, event: Event) {
        let _no_receivers = self.tx.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> impl Stream<Item = Arc<Event>> {
        BroadcastStream::new(self.tx.subscribe()).map(|res| match res {
            Ok(event) => event,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                error!(skipped, "event sink subscriber lagged, dropping events");
                Arc::new(Event::Lagged { skipped })
            }
        })
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}

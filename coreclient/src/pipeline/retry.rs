// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! DHT retry policy (§7): timeouts retry with [`Backoff`]; everything
//! else (crypto, identity, state errors) is definitive and propagates
//! immediately — retrying a signature failure would never succeed.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;

use dna_dht::DhtError;

use crate::contacts::ContactError;
use crate::errors::CoreError;
use crate::keyserver::KeyserverError;
use crate::nexus::NexusError;
use crate::spillway::SpillwayError;
use crate::utils::backoff::FAILURE_NOTIFY_THRESHOLD;
use crate::utils::Backoff;

use super::events::{Event, EventSink};

pub(super) fn dht_is_transient(e: &DhtError) -> bool {
    matches!(e, DhtError::Timeout | DhtError::NetworkDisconnected)
}

pub(super) fn is_transient(err: &CoreError) -> bool {
    match err {
        CoreError::Dht(e) => dht_is_transient(e),
        CoreError::Spillway(SpillwayError::Dht(e)) => dht_is_transient(e),
        CoreError::Nexus(NexusError::Dht(e)) => dht_is_transient(e),
        CoreError::Contact(ContactError::Dht(e)) => dht_is_transient(e),
        CoreError::Keyserver(KeyserverError::Dht(e)) => dht_is_transient(e),
        _ => false,
    }
}

/// Run `op` under a per-caller [`Backoff`], retrying transient DHT
/// failures up to the point they've repeated
/// [`FAILURE_NOTIFY_THRESHOLD`] times (after which the caller is
/// notified via `events`, but retries continue — the listener is
/// re-established on the next success via [`Event::ListenersReestablished`]).
pub(super) async fn with_retry<F, Fut, T>(
    events: &EventSink,
    backoff: &AsyncMutex<Backoff>,
    mut op: F,
) -> Result<T, CoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    loop {
        match op().await {
            Ok(value) => {
                let mut guard = backoff.lock().await;
                if guard.failure_count() >= FAILURE_NOTIFY_THRESHOLD {
                    events.notify(Event::ListenersReestablished);
                }
                guard.reset();
                return Ok(value);
            }
            Err(err) if is_transient(&err) => {
                let mut guard = backoff.lock().await;
                let (delay, should_notify) = guard.next_delay();
                let failures = guard.failure_count();
                drop(guard);
                if should_notify {
                    events.notify(Event::DhtDegraded {
                        consecutive_failures: failures,
                    });
                }
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Wrap a single DHT round trip with its §5 deadline (10s get / 30s put),
/// converting an elapsed deadline into `DhtError::Timeout` so it flows
/// through the same transient-retry path as a substrate-reported timeout.
pub(super) async fn with_deadline<Fut, T, E>(deadline: Duration, fut: Fut) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    E: From<DhtError>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_elapsed) => Err(DhtError::Timeout.into()),
    }
}

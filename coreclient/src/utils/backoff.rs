// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Retry backoff for DHT timeouts (§5, §7): exponential with a 60 s cap
//! and ±25% jitter, doubling from a 1 s base. After
//! [`FAILURE_NOTIFY_THRESHOLD`] consecutive failures the caller should
//! surface the outage to the user rather than retry silently.

use std::time::Duration;

use rand::Rng;

const BASE: Duration = Duration::from_secs(1);
const CAP: Duration = Duration::from_secs(60);
const JITTER_FRACTION: f64 = 0.25;

pub const FAILURE_NOTIFY_THRESHOLD: u32 = 5;

pub struct Backoff {
    failures: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

impl Backoff {
    pub fn new() -> Self {
        Self { failures: 0 }
    }

    /// Record a failure and return how long to wait before the next
    /// attempt, plus whether this failure crossed the notify threshold.
    pub fn next_delay(&mut self) -> (Duration, bool) {
        self.failures += 1;
        let exponent = self.failures.saturating_sub(1).min(6); // 2^6 * 1s = 64s > cap
        let unjittered = BASE.saturating_mul(1 << exponent).min(CAP);

        let mut rng = rand::thread_rng();
        let jitter = rng.gen_range(-JITTER_FRACTION..=JITTER_FRACTION);
        let factor = (1.0 + jitter).max(0.0);
        let delay = Duration::from_secs_f64(unjittered.as_secs_f64() * factor);

        (delay, self.failures >= FAILURE_NOTIFY_THRESHOLD)
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failure_count(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_and_caps() {
        let mut backoff = Backoff::new();
        let (first, notify) = backoff.next_delay();
        assert!(!notify);
        assert!(first.as_secs_f64() >= 0.75 && first.as_secs_f64() <= 1.25);

        for _ in 0..10 {
            let (delay, _) = backoff.next_delay();
            assert!(delay <= CAP.mul_f64(1.0 + JITTER_FRACTION));
        }
    }

    #[test]
    fn notifies_after_threshold() {
        let mut backoff = Backoff::new();
        let mut notified = false;
        for _ in 0..FAILURE_NOTIFY_THRESHOLD {
            let (_, notify) = backoff.next_delay();
            notified = notify;
        }
        assert!(notified);
    }

    #[test]
    fn reset_clears_failure_count() {
        let mut backoff = Backoff::new();
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.failure_count(), 0);
    }
}

// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicU64, Ordering};

/// Delivery counters, shareable with whoever reports them.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    records_delivered: AtomicU64,
    records_skipped: AtomicU64,
    records_failed: AtomicU64,
    payloads_sent: AtomicU64,
    retries: AtomicU64,
}

impl DeliveryStats {
    pub const fn new() -> Self {
        Self {
            records_delivered: AtomicU64::new(0),
            records_skipped: AtomicU64::new(0),
            records_failed: AtomicU64::new(0),
            payloads_sent: AtomicU64::new(0),
            retries: AtomicU64::new(0),
        }
    }

    pub fn record_delivered(&self) {
        self.records_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.records_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.records_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn payload_sent(&self, retries: u32) {
        self.payloads_sent.fetch_add(1, Ordering::Relaxed);
        self.retries.fetch_add(u64::from(retries), Ordering::Relaxed);
    }

    /// Counts retries spent on a payload that was never delivered.
    pub fn retries_exhausted(&self, retries: u32) {
        self.retries.fetch_add(u64::from(retries), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            records_delivered: self.records_delivered.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
            records_failed: self.records_failed.load(Ordering::Relaxed),
            payloads_sent: self.payloads_sent.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub records_delivered: u64,
    pub records_skipped: u64,
    pub records_failed: u64,
    pub payloads_sent: u64,
    pub retries: u64,
}

//! Counters for the 3N stack.
//!
//! Everything here is plain atomics so a node's metrics can be read from a
//! reporting thread while the simulation runs.

use crate::pdu::PduKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/* ---------------------------------------------------------------- *
 * Simple Counter
 * ---------------------------------------------------------------- */

/// Monotonic event counter.
#[derive(Debug)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Counter {
    fn clone(&self) -> Self {
        let c = Counter::new();
        c.value.store(self.value.load(Ordering::Relaxed), Ordering::Relaxed);
        c
    }
}

/* ---------------------------------------------------------------- *
 * Gauge
 * ---------------------------------------------------------------- */

/// Value that moves both ways, such as a table size.
#[derive(Debug)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for Gauge {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Histogram {
    fn clone(&self) -> Self {
        Self {
            buckets: self
                .buckets
                .iter()
                .map(|b| AtomicU64::new(b.load(Ordering::Relaxed)))
                .collect(),
            boundaries: self.boundaries.clone(),
            underflow: AtomicU64::new(self.underflow.load(Ordering::Relaxed)),
            overflow: AtomicU64::new(self.overflow.load(Ordering::Relaxed)),
            sum: AtomicU64::new(self.sum.load(Ordering::Relaxed)),
            count: AtomicU64::new(self.count.load(Ordering::Relaxed)),
        }
    }
}

impl Clone for Gauge {
    fn clone(&self) -> Self {
        let g = Gauge::new();
        g.value.store(self.value.load(Ordering::Relaxed), Ordering::Relaxed);
        g
    }
}

/* ---------------------------------------------------------------- *
 * Histogram
 * ---------------------------------------------------------------- */

/// Bucketed distribution. Values below the first boundary land in the
/// underflow slot, values above the last in the overflow slot.
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<AtomicU64>,
    boundaries: Vec<u64>,
    underflow: AtomicU64,
    overflow: AtomicU64,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(boundaries: Vec<u64>) -> Self {
        let buckets = (0..boundaries.len())
            .map(|_| AtomicU64::new(0))
            .collect();

        Self {
            buckets,
            boundaries,
            underflow: AtomicU64::new(0),
            overflow: AtomicU64::new(0),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn exponential(min: u64, max: u64, buckets: usize) -> Self {
        assert!(min < max && buckets > 1);
        let factor = (max as f64 / min as f64).powf(1.0 / (buckets as f64 - 1.0));
        let mut boundaries = Vec::with_capacity(buckets);
        let mut value = min;
        for _ in 0..buckets {
            boundaries.push(value);
            value = (value as f64 * factor).ceil() as u64;
        }
        Self::new(boundaries)
    }

    /// Buckets suitable for delays in microseconds (100us .. 10s).
    pub fn latency() -> Self {
        Self::exponential(100, 10_000_000, 12)
    }

    /// Records a duration in microseconds.
    pub fn observe_duration(&self, d: std::time::Duration) {
        self.observe(d.as_micros().min(u64::MAX as u128) as u64);
    }

    pub fn observe(&self, value: u64) {
        self.sum.fetch_add(value, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        if value < self.boundaries[0] {
            self.underflow.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let mut idx = self.boundaries.len();
        for (i, &b) in self.boundaries.iter().enumerate() {
            if value <= b {
                idx = i;
                break;
            }
        }

        if idx < self.buckets.len() {
            self.buckets[idx].fetch_add(1, Ordering::Relaxed);
        } else {
            self.overflow.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn average(&self) -> f64 {
        let c = self.count.load(Ordering::Relaxed);
        if c == 0 {
            0.0
        } else {
            self.sum.load(Ordering::Relaxed) as f64 / c as f64
        }
    }

    pub fn counts(&self) -> Vec<(u64, u64)> {
        self.boundaries
            .iter()
            .zip(self.buckets.iter())
            .map(|(&b, bucket)| (b, bucket.load(Ordering::Relaxed)))
            .collect()
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn overflow(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }

    pub fn underflow(&self) -> u64 {
        self.underflow.load(Ordering::Relaxed)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::latency()
    }
}

/* ---------------------------------------------------------------- *
 * Per-PDU-type traffic counters
 * ---------------------------------------------------------------- */

/// In/out/drop counters for one PDU type.
#[derive(Debug, Default, Clone)]
pub struct TrafficCounters {
    pub incoming: Counter,
    pub outgoing: Counter,
    pub dropped: Counter,
}

/// Traffic counters for every PDU type, plus the two ICN packet types.
#[derive(Debug, Default, Clone)]
pub struct PduCounters {
    by_kind: [TrafficCounters; 10],
    pub interests: TrafficCounters,
    pub data: TrafficCounters,
    /// Packets whose leading bytes matched no known header.
    pub unknown_headers: Counter,
}

impl PduCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(&self, kind: PduKind) -> &TrafficCounters {
        &self.by_kind[kind as usize]
    }

    /// Snapshot as `kind -> (in, out, drop)`.
    pub fn snapshot(&self) -> BTreeMap<String, TrafficSnapshot> {
        let mut out: BTreeMap<String, TrafficSnapshot> = PduKind::ALL
            .iter()
            .map(|k| (k.as_str().to_string(), TrafficSnapshot::from(self.kind(*k))))
            .collect();
        out.insert("Interest".into(), TrafficSnapshot::from(&self.interests));
        out.insert("Data".into(), TrafficSnapshot::from(&self.data));
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrafficSnapshot {
    pub incoming: u64,
    pub outgoing: u64,
    pub dropped: u64,
}

impl From<&TrafficCounters> for TrafficSnapshot {
    fn from(c: &TrafficCounters) -> Self {
        Self {
            incoming: c.incoming.value(),
            outgoing: c.outgoing.value(),
            dropped: c.dropped.value(),
        }
    }
}

/* ---------------------------------------------------------------- *
 * Aggregate metrics for a 3N node
 * ---------------------------------------------------------------- */

#[derive(Debug, Default, Clone)]
pub struct NodeMetrics {
    // Packet processing metrics
    pub interests_received: Counter,
    pub interests_satisfied: Counter,
    pub interests_timed_out: Counter,
    pub interests_aggregated: Counter,
    /// Interests dropped because of a loop or a missing route
    pub interests_dropped: Counter,
    pub interests_forwarded: Counter,
    pub nacks_sent: Counter,
    pub data_received: Counter,
    pub data_unsolicited: Counter,
    pub data_sent: Counter,

    // Cache metrics
    pub cs_hits: Counter,
    pub cs_misses: Counter,
    pub cs_inserts: Counter,
    pub cs_evictions: Counter,
    pub cs_size: Gauge,

    // PIT metrics
    pub pit_inserts: Counter,
    pub pit_expirations: Counter,
    pub pit_size: Gauge,

    // FIB / NNST metrics
    pub fib_hits: Counter,
    pub fib_misses: Counter,
    pub nnst_hits: Counter,
    pub nnst_misses: Counter,

    // 3N naming
    pub names_assigned: Counter,
    pub pdus_buffered: Counter,

    // Transport metrics
    pub bytes_received: Counter,
    pub bytes_sent: Counter,
}

impl NodeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> BTreeMap<&'static str, u64> {
        BTreeMap::from([
            ("interests_received", self.interests_received.value()),
            ("interests_satisfied", self.interests_satisfied.value()),
            ("interests_timed_out", self.interests_timed_out.value()),
            ("interests_aggregated", self.interests_aggregated.value()),
            ("interests_dropped", self.interests_dropped.value()),
            ("interests_forwarded", self.interests_forwarded.value()),
            ("nacks_sent", self.nacks_sent.value()),
            ("data_received", self.data_received.value()),
            ("data_unsolicited", self.data_unsolicited.value()),
            ("data_sent", self.data_sent.value()),
            ("cs_hits", self.cs_hits.value()),
            ("cs_misses", self.cs_misses.value()),
            ("cs_inserts", self.cs_inserts.value()),
            ("cs_evictions", self.cs_evictions.value()),
            ("cs_size", self.cs_size.value()),
            ("pit_inserts", self.pit_inserts.value()),
            ("pit_expirations", self.pit_expirations.value()),
            ("pit_size", self.pit_size.value()),
            ("fib_hits", self.fib_hits.value()),
            ("fib_misses", self.fib_misses.value()),
            ("nnst_hits", self.nnst_hits.value()),
            ("nnst_misses", self.nnst_misses.value()),
            ("names_assigned", self.names_assigned.value()),
            ("pdus_buffered", self.pdus_buffered.value()),
            ("bytes_received", self.bytes_received.value()),
            ("bytes_sent", self.bytes_sent.value()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_buckets() {
        let h = Histogram::new(vec![10, 100, 1000]);
        h.observe(5);
        h.observe(50);
        h.observe(5000);
        assert_eq!(h.count(), 3);
        assert_eq!(h.counts(), vec![(10, 0), (100, 1), (1000, 0)]);
        assert_eq!(h.sum(), 5055);
        assert_eq!(h.underflow(), 1);
        assert_eq!(h.overflow(), 1);
    }

    #[test]
    fn pdu_counters_by_kind() {
        let c = PduCounters::new();
        c.kind(PduKind::Do).incoming.increment();
        c.kind(PduKind::Do).dropped.increment();
        c.interests.outgoing.add(2);

        let snap = c.snapshot();
        assert_eq!(snap["DO"], TrafficSnapshot { incoming: 1, outgoing: 0, dropped: 1 });
        assert_eq!(snap["Interest"].outgoing, 2);
        assert_eq!(snap["SO"].incoming, 0);
    }
}

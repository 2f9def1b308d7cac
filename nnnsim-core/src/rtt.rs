//! Retransmission timeout estimation for consumers.
//!
//! Mean-deviation estimator with Karn's rule: samples are only taken from
//! sequence numbers that were never retransmitted.

use log::trace;
use nnnsim_common::Time;
use std::collections::BTreeMap;
use std::time::Duration;

pub const INITIAL_ESTIMATE: Duration = Duration::from_secs(1);
pub const DEFAULT_GAIN: f64 = 0.1;
pub const MIN_RTO: Duration = Duration::from_millis(200);
pub const MAX_RTO: Duration = Duration::from_secs(200);
pub const MAX_MULTIPLIER: u32 = 64;

#[derive(Debug, Clone, Copy)]
struct Sent {
    time: Time,
    retransmitted: bool,
}

#[derive(Debug, Clone)]
pub struct RttMeanDeviation {
    estimate: Duration,
    variance: Duration,
    gain: f64,
    samples: u32,
    multiplier: u32,
    min_rto: Duration,
    max_rto: Duration,
    history: BTreeMap<u64, Sent>,
}

impl Default for RttMeanDeviation {
    fn default() -> Self {
        Self::new()
    }
}

impl RttMeanDeviation {
    pub fn new() -> Self {
        Self {
            estimate: INITIAL_ESTIMATE,
            variance: Duration::ZERO,
            gain: DEFAULT_GAIN,
            samples: 0,
            multiplier: 1,
            min_rto: MIN_RTO,
            max_rto: MAX_RTO,
            history: BTreeMap::new(),
        }
    }

    pub fn with_gain(mut self, gain: f64) -> Self {
        self.gain = gain;
        self
    }

    pub fn estimate(&self) -> Duration {
        self.estimate
    }

    pub fn variance(&self) -> Duration {
        self.variance
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    pub fn measurement(&mut self, m: Duration) {
        if self.samples == 0 {
            self.estimate = m;
            self.variance = m;
        } else {
            let est = self.estimate.as_secs_f64();
            let err = m.as_secs_f64() - est;
            let var = self.variance.as_secs_f64();
            self.estimate = Duration::from_secs_f64((est + self.gain * err).max(0.0));
            self.variance = Duration::from_secs_f64((var + self.gain * (err.abs() - var)).max(0.0));
        }
        self.samples += 1;
        trace!("RTT sample {:?}: est={:?} var={:?}", m, self.estimate, self.variance);
    }

    pub fn retransmit_timeout(&self) -> Duration {
        let floor = self.min_rto * self.multiplier;
        let rto = (self.estimate + self.variance * 4) * self.multiplier;
        rto.max(floor).min(self.max_rto)
    }

    pub fn increase_multiplier(&mut self) {
        self.multiplier = (self.multiplier * 2).min(MAX_MULTIPLIER);
    }

    pub fn reset_multiplier(&mut self) {
        self.multiplier = 1;
    }

    /// Records that `seq` went out at `now`. Sending it again marks it as a
    /// retransmission.
    pub fn sent_seq(&mut self, seq: u64, now: Time) {
        self.history
            .entry(seq)
            .and_modify(|s| {
                s.time = now;
                s.retransmitted = true;
            })
            .or_insert(Sent {
                time: now,
                retransmitted: false,
            });
    }

    /// Records the answer for `seq` and forgets everything up to it.
    pub fn ack_seq(&mut self, seq: u64, now: Time) {
        if let Some(sent) = self.history.get(&seq).copied() {
            if !sent.retransmitted {
                self.measurement(now.saturating_sub(sent.time));
            }
            self.reset_multiplier();
        }
        self.history = self.history.split_off(&(seq + 1));
    }

    pub fn reset(&mut self) {
        *self = Self::new().with_gain(self.gain);
    }
}

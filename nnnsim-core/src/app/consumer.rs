//! Constant-bit-rate consumer.
//!
//! Sends one Interest per tick for `prefix/<seq>`, retransmits what times
//! out or gets NACKed, and traces the delay of every answered sequence.

use super::{encode_icn, App, AppContext, AppTimer};
use crate::config::{ConsumerConfig, Randomize};
use crate::rtt::RttMeanDeviation;
use crate::scheduler::EventId;
use crate::trace::TraceEvent;
use log::{debug, info, trace};
use nnnsim_common::metrics::Histogram;
use nnnsim_common::{Data, IcnPacket, Interest, NnnAddress, Pdu, Time};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

#[derive(Debug)]
pub struct ConsumerCbr {
    config: ConsumerConfig,
    rng: StdRng,
    active: bool,
    first_time: bool,
    seq: u64,
    rtt: RttMeanDeviation,

    /// Sequence numbers waiting to be sent again
    retx_seqs: BTreeSet<u64>,
    /// Outstanding sequence numbers by last send time
    timeouts: BTreeSet<(Time, u64)>,
    sent_at: BTreeMap<u64, Time>,
    first_sent: BTreeMap<u64, Time>,
    retx_counts: BTreeMap<u64, u32>,

    possible_destination: Option<NnnAddress>,
    send_event: Option<EventId>,
    retx_event: Option<EventId>,

    interests_sent: u64,
    data_received: u64,
    nacks_received: u64,
    timeouts_fired: u64,
    /// First-Interest-to-Data delays, in microseconds
    delays: Histogram,
}

impl ConsumerCbr {
    pub fn new(config: ConsumerConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            seq: config.start_seq,
            config,
            active: false,
            first_time: true,
            rtt: RttMeanDeviation::new(),
            retx_seqs: BTreeSet::new(),
            timeouts: BTreeSet::new(),
            sent_at: BTreeMap::new(),
            first_sent: BTreeMap::new(),
            retx_counts: BTreeMap::new(),
            possible_destination: None,
            send_event: None,
            retx_event: None,
            interests_sent: 0,
            data_received: 0,
            nacks_received: 0,
            timeouts_fired: 0,
            delays: Histogram::latency(),
        }
    }

    pub fn delays(&self) -> &Histogram {
        &self.delays
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    pub fn rtt(&self) -> &RttMeanDeviation {
        &self.rtt
    }

    /// Sequence numbers sent but not yet answered.
    pub fn outstanding(&self) -> usize {
        self.sent_at.len()
    }

    pub fn possible_destination(&self) -> Option<&NnnAddress> {
        self.possible_destination.as_ref()
    }

    fn inter_packet_gap(&mut self) -> Duration {
        let mean = 1.0 / self.config.frequency;
        let secs = match self.config.randomize {
            Randomize::None => mean,
            Randomize::Uniform => self.rng.gen_range(0.0..2.0 * mean),
            Randomize::Exponential => {
                // inverse transform, bounded at 50 times the mean
                let u: f64 = self.rng.gen_range(f64::EPSILON..1.0);
                (-mean * u.ln()).min(50.0 * mean)
            }
        };
        Duration::from_secs_f64(secs)
    }

    fn schedule_next_packet(&mut self, ctx: &mut AppContext<'_>) {
        if self.first_time {
            self.send_event = Some(ctx.schedule(Duration::ZERO, AppTimer::SendPacket));
            self.first_time = false;
        } else if self.send_event.is_none() {
            let gap = self.inter_packet_gap();
            self.send_event = Some(ctx.schedule(gap, AppTimer::SendPacket));
        }
    }

    fn next_seq(&mut self) -> Option<u64> {
        if let Some(seq) = self.retx_seqs.pop_first() {
            return Some(seq);
        }
        if let Some(max) = self.config.max_seq {
            if self.seq >= max {
                return None;
            }
        }
        let seq = self.seq;
        self.seq += 1;
        Some(seq)
    }

    /// Picks the PDU that carries the Interest, based on mobility and on
    /// whether a destination is known.
    fn wrap(&self, packet: &IcnPacket, ctx: &AppContext<'_>) -> Option<Pdu> {
        let payload = encode_icn(packet)?;
        let mut pdu = match (ctx.node_name(), &self.possible_destination) {
            (Some(src), None) if self.config.is_mobile => Pdu::so(src.clone(), payload),
            (Some(src), Some(dst)) if self.config.is_mobile => Pdu::du(src.clone(), dst.clone(), payload),
            (_, Some(dst)) => Pdu::do_(dst.clone(), payload),
            (_, None) => Pdu::nullp(payload),
        };
        pdu.header_mut().lifetime = self.config.nnn_lifetime;
        Some(pdu)
    }

    fn send_packet(&mut self, ctx: &mut AppContext<'_>) {
        self.send_event = None;
        if !self.active {
            return;
        }
        let Some(seq) = self.next_seq() else {
            return;
        };

        let name = self.config.prefix.append_seq_num(seq);
        let interest = Interest::new(name)
            .with_nonce(self.rng.gen())
            .with_lifetime(self.config.life_time);
        trace!("{} > Interest for {}", ctx.app(), seq);
        let Some(pdu) = self.wrap(&IcnPacket::Interest(interest), ctx) else {
            self.schedule_next_packet(ctx);
            return;
        };

        self.will_send_out_interest(seq, ctx.now());
        ctx.send(pdu);
        self.interests_sent += 1;
        self.schedule_next_packet(ctx);
    }

    fn will_send_out_interest(&mut self, seq: u64, now: Time) {
        if let Some(prev) = self.sent_at.insert(seq, now) {
            self.timeouts.remove(&(prev, seq));
        }
        self.timeouts.insert((now, seq));
        self.first_sent.entry(seq).or_insert(now);
        *self.retx_counts.entry(seq).or_insert(0) += 1;
        self.rtt.sent_seq(seq, now);
    }

    fn forget(&mut self, seq: u64) {
        if let Some(t) = self.sent_at.remove(&seq) {
            self.timeouts.remove(&(t, seq));
        }
    }

    fn check_retx_timeout(&mut self, ctx: &mut AppContext<'_>) {
        self.retx_event = None;
        if !self.active {
            return;
        }
        let now = ctx.now();
        let rto = self.rtt.retransmit_timeout();
        while let Some(&(sent, seq)) = self.timeouts.iter().next() {
            if sent + rto > now {
                break;
            }
            self.forget(seq);
            self.on_timeout(seq, ctx);
        }
        self.retx_event = Some(ctx.schedule(self.config.retx_timer, AppTimer::CheckRetxTimeout));
    }

    fn on_timeout(&mut self, seq: u64, ctx: &mut AppContext<'_>) {
        debug!("{} timeout for seq {}", ctx.app(), seq);
        self.timeouts_fired += 1;
        self.rtt.increase_multiplier();
        self.retx_seqs.insert(seq);
        self.schedule_next_packet(ctx);
    }
}

impl App for ConsumerCbr {
    fn start(&mut self, ctx: &mut AppContext<'_>) {
        info!("{} consumer for {} starting", ctx.app(), self.config.prefix);
        self.active = true;
        self.retx_event = Some(ctx.schedule(self.config.retx_timer, AppTimer::CheckRetxTimeout));
        self.schedule_next_packet(ctx);
    }

    fn stop(&mut self, ctx: &mut AppContext<'_>) {
        self.active = false;
        for id in [self.send_event.take(), self.retx_event.take()].into_iter().flatten() {
            ctx.cancel(id);
        }
    }

    fn on_timer(&mut self, timer: AppTimer, ctx: &mut AppContext<'_>) {
        match timer {
            AppTimer::SendPacket => self.send_packet(ctx),
            AppTimer::CheckRetxTimeout => self.check_retx_timeout(ctx),
        }
    }

    fn on_data(&mut self, data: Data, ctx: &mut AppContext<'_>) {
        if !self.active {
            return;
        }
        let Some(seq) = data.name.last().and_then(|c| c.to_seq_num()) else {
            debug!("{} ignores Data {} without a sequence number", ctx.app(), data.name);
            return;
        };
        let now = ctx.now();
        let hops = data.tags.hop_count;

        if let Some(last) = self.sent_at.get(&seq) {
            ctx.trace(TraceEvent::LastRetransmittedInterestDataDelay {
                name: data.name.clone(),
                seq,
                delay: now.saturating_sub(*last),
                hops,
            });
        }
        if let Some(first) = self.first_sent.remove(&seq) {
            self.delays.observe_duration(now.saturating_sub(first));
            ctx.trace(TraceEvent::FirstInterestDataDelay {
                name: data.name.clone(),
                seq,
                delay: now.saturating_sub(first),
                retx: self.retx_counts.get(&seq).copied().unwrap_or(0),
                hops,
            });
        }

        self.forget(seq);
        self.retx_counts.remove(&seq);
        self.retx_seqs.remove(&seq);
        self.rtt.ack_seq(seq, now);
        self.data_received += 1;
    }

    fn on_nack(&mut self, interest: Interest, ctx: &mut AppContext<'_>) {
        if !self.active {
            return;
        }
        let Some(seq) = interest.name.last().and_then(|c| c.to_seq_num()) else {
            return;
        };
        debug!("{} NACK {:?} for seq {}", ctx.app(), interest.nack, seq);
        self.nacks_received += 1;
        self.retx_seqs.insert(seq);
        self.forget(seq);
        self.rtt.increase_multiplier();
        self.schedule_next_packet(ctx);
    }

    fn remember_destination(&mut self, address: &NnnAddress) {
        self.possible_destination = Some(address.clone());
    }

    fn counters(&self) -> BTreeMap<&'static str, u64> {
        BTreeMap::from([
            ("InterestsSent", self.interests_sent),
            ("DataReceived", self.data_received),
            ("NacksReceived", self.nacks_received),
            ("Timeouts", self.timeouts_fired),
            ("MeanDelayUs", self.delays.average() as u64),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{decode_icn, AppAction, AppId};
    use crate::scheduler::{EventKind, EventQueue};
    use crate::trace::Tracer;
    use nnnsim_common::{FaceId, Name, NodeId};

    fn consumer(max_seq: Option<u64>) -> ConsumerCbr {
        ConsumerCbr::new(ConsumerConfig {
            prefix: Name::from_uri("/prefix").unwrap(),
            frequency: 10.0,
            max_seq,
            ..ConsumerConfig::default()
        })
    }

    // Runs `f` against a context on node 0 and returns what the app asked for.
    fn with_ctx(
        queue: &mut EventQueue,
        tracer: &Tracer,
        name: Option<NnnAddress>,
        f: impl FnOnce(&mut AppContext<'_>),
    ) -> Vec<AppAction> {
        let mut sched = queue.for_node(NodeId(0));
        let mut ctx = AppContext::new(AppId(0), FaceId(0), &mut sched, tracer, name);
        f(&mut ctx);
        ctx.into_actions()
    }

    fn sent_interest(actions: &[AppAction]) -> (Pdu, Interest) {
        let Some(AppAction::Send(pdu)) = actions.first() else {
            panic!("nothing sent");
        };
        let Some(IcnPacket::Interest(i)) = decode_icn(pdu.payload().unwrap()) else {
            panic!("not an Interest");
        };
        (pdu.clone(), i)
    }

    #[test]
    fn sends_sequence_numbers_until_max_seq() {
        let mut queue = EventQueue::new();
        let tracer = Tracer::new(NodeId(0));
        let mut c = consumer(Some(2));

        with_ctx(&mut queue, &tracer, None, |ctx| c.start(ctx));
        let mut seqs = Vec::new();
        for _ in 0..4 {
            let actions = with_ctx(&mut queue, &tracer, None, |ctx| c.on_timer(AppTimer::SendPacket, ctx));
            if !actions.is_empty() {
                let (pdu, i) = sent_interest(&actions);
                assert_eq!(pdu.kind(), nnnsim_common::PduKind::Nullp);
                seqs.push(i.name.last().unwrap().to_seq_num().unwrap());
            }
        }
        assert_eq!(seqs, vec![0, 1]);
        assert_eq!(c.outstanding(), 2);
    }

    #[test]
    fn data_clears_tracking_and_traces_delay() {
        let mut queue = EventQueue::new();
        let tracer = Tracer::new(NodeId(0));
        let records = tracer.collect();
        let mut c = consumer(None);

        with_ctx(&mut queue, &tracer, None, |ctx| c.start(ctx));
        with_ctx(&mut queue, &tracer, None, |ctx| c.on_timer(AppTimer::SendPacket, ctx));
        queue.advance_to(Duration::from_millis(40));

        let data = Data::new(Name::from_uri("/prefix").unwrap().append_seq_num(0), vec![0u8; 4]);
        with_ctx(&mut queue, &tracer, None, |ctx| c.on_data(data, ctx));

        assert_eq!(c.outstanding(), 0);
        assert_eq!(c.counters()["DataReceived"], 1);
        assert_eq!(c.rtt().estimate(), Duration::from_millis(40));
        let records = records.borrow();
        assert!(records.iter().any(|r| matches!(
            r.event,
            TraceEvent::FirstInterestDataDelay { seq: 0, retx: 1, .. }
        )));
    }

    #[test]
    fn nack_queues_a_retransmission() {
        let mut queue = EventQueue::new();
        let tracer = Tracer::new(NodeId(0));
        let mut c = consumer(None);
        with_ctx(&mut queue, &tracer, None, |ctx| c.start(ctx));
        let actions = with_ctx(&mut queue, &tracer, None, |ctx| c.on_timer(AppTimer::SendPacket, ctx));
        let (_, interest) = sent_interest(&actions);

        let nack = interest.with_nack(nnnsim_common::NackType::GiveupPit);
        with_ctx(&mut queue, &tracer, None, |ctx| c.on_nack(nack, ctx));
        assert_eq!(c.rtt().multiplier(), 2);

        let actions = with_ctx(&mut queue, &tracer, None, |ctx| c.on_timer(AppTimer::SendPacket, ctx));
        let (_, again) = sent_interest(&actions);
        assert_eq!(again.name.last().unwrap().to_seq_num(), Some(0));
    }

    #[test]
    fn timeouts_trigger_retransmission() {
        let mut queue = EventQueue::new();
        let tracer = Tracer::new(NodeId(0));
        let mut c = consumer(None);
        with_ctx(&mut queue, &tracer, None, |ctx| c.start(ctx));
        with_ctx(&mut queue, &tracer, None, |ctx| c.on_timer(AppTimer::SendPacket, ctx));

        // the initial RTO is one second
        queue.advance_to(Duration::from_millis(999));
        with_ctx(&mut queue, &tracer, None, |ctx| c.on_timer(AppTimer::CheckRetxTimeout, ctx));
        assert_eq!(c.counters()["Timeouts"], 0);
        queue.advance_to(Duration::from_secs(1));
        with_ctx(&mut queue, &tracer, None, |ctx| c.on_timer(AppTimer::CheckRetxTimeout, ctx));
        assert_eq!(c.counters()["Timeouts"], 1);
        assert_eq!(c.outstanding(), 0);
    }

    #[test]
    fn mobile_named_consumers_use_so_then_du() {
        let mut queue = EventQueue::new();
        let tracer = Tracer::new(NodeId(0));
        let mut c = ConsumerCbr::new(ConsumerConfig {
            prefix: Name::from_uri("/p").unwrap(),
            is_mobile: true,
            ..ConsumerConfig::default()
        });
        let me: NnnAddress = "1.2".parse().unwrap();
        with_ctx(&mut queue, &tracer, Some(me.clone()), |ctx| c.start(ctx));
        let actions = with_ctx(&mut queue, &tracer, Some(me.clone()), |ctx| {
            c.on_timer(AppTimer::SendPacket, ctx)
        });
        let (pdu, _) = sent_interest(&actions);
        assert_eq!(pdu.src(), Some(&me));
        assert_eq!(pdu.header().lifetime, Duration::from_secs(3));

        c.remember_destination(&"7".parse().unwrap());
        let actions = with_ctx(&mut queue, &tracer, Some(me), |ctx| c.on_timer(AppTimer::SendPacket, ctx));
        let (pdu, _) = sent_interest(&actions);
        assert_eq!(pdu.kind(), nnnsim_common::PduKind::Du);
        assert!(matches!(queue.pop().map(|e| e.kind), Some(EventKind::App { .. })));
    }
}

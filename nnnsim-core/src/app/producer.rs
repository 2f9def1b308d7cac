//! Producer answering every Interest under its prefix with synthetic Data.

use super::{decode_icn, encode_icn, App, AppContext};
use crate::config::ProducerConfig;
use log::{info, trace};
use nnnsim_common::pdu::{DoPdu, DuPdu, NullpPdu, PduPayload, SoPdu};
use nnnsim_common::{Data, IcnPacket, Interest, NnnAddress, Pdu};
use std::collections::BTreeMap;

#[derive(Debug)]
pub struct Producer {
    config: ProducerConfig,
    active: bool,
    interests_received: u64,
    data_sent: u64,
}

/// How the Interest reached the producer.
enum Arrival<'a> {
    Nullp,
    So { src: &'a NnnAddress },
    Do,
    Du { src: &'a NnnAddress, dst: &'a NnnAddress },
}

impl Producer {
    pub fn new(config: ProducerConfig) -> Self {
        Self {
            config,
            active: false,
            interests_received: 0,
            data_sent: 0,
        }
    }

    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    fn make_data(&self, interest: &Interest, ctx: &AppContext<'_>) -> Data {
        let mut data = Data::new(
            interest.name.concat(&self.config.postfix),
            vec![0u8; self.config.payload_size],
        )
        .with_freshness(self.config.freshness)
        .with_timestamp(ctx.now())
        .with_signature(self.config.signature);
        if let Some(key) = &self.config.key_locator {
            data = data.with_key_locator(key.clone());
        }
        data.tags.hop_count = interest.tags.hop_count;
        data
    }

    fn answer(&mut self, payload: &PduPayload, arrival: Arrival<'_>, ctx: &mut AppContext<'_>) {
        if !self.active {
            return;
        }
        let interest = match decode_icn(payload) {
            Some(IcnPacket::Interest(i)) if !i.is_nack() => i,
            _ => return,
        };
        self.interests_received += 1;
        trace!("{} < Interest {}", ctx.app(), interest.name);

        let data = self.make_data(&interest, ctx);
        let Some(payload) = encode_icn(&IcnPacket::Data(data)) else {
            return;
        };
        let me = ctx.node_name().filter(|_| self.config.is_mobile).cloned();

        let mut reply = match (arrival, me) {
            (Arrival::Nullp, Some(me)) | (Arrival::Do, Some(me)) => Pdu::so(me, payload),
            (Arrival::Nullp, None) | (Arrival::Do, None) => Pdu::nullp(payload),
            (Arrival::So { src }, Some(me)) => Pdu::du(me, src.clone(), payload),
            (Arrival::So { src }, None) => Pdu::do_(src.clone(), payload),
            (Arrival::Du { src, dst }, me) => Pdu::du(me.unwrap_or_else(|| dst.clone()), src.clone(), payload),
        };
        reply.header_mut().lifetime = self.config.nnn_lifetime;
        ctx.send(reply);
        self.data_sent += 1;
    }
}

impl App for Producer {
    fn start(&mut self, ctx: &mut AppContext<'_>) {
        info!("{} producing {}", ctx.app(), self.config.prefix);
        self.active = true;
        ctx.register_prefix(self.config.prefix.clone(), 0);
    }

    fn stop(&mut self, _ctx: &mut AppContext<'_>) {
        self.active = false;
    }

    fn on_nullp(&mut self, pdu: NullpPdu, ctx: &mut AppContext<'_>) {
        self.answer(&pdu.payload, Arrival::Nullp, ctx);
    }

    fn on_so(&mut self, pdu: SoPdu, ctx: &mut AppContext<'_>) {
        self.answer(&pdu.payload, Arrival::So { src: &pdu.src }, ctx);
    }

    fn on_do(&mut self, pdu: DoPdu, ctx: &mut AppContext<'_>) {
        self.answer(&pdu.payload, Arrival::Do, ctx);
    }

    fn on_du(&mut self, pdu: DuPdu, ctx: &mut AppContext<'_>) {
        self.answer(
            &pdu.payload,
            Arrival::Du {
                src: &pdu.src,
                dst: &pdu.dst,
            },
            ctx,
        );
    }

    fn counters(&self) -> BTreeMap<&'static str, u64> {
        BTreeMap::from([
            ("InterestsReceived", self.interests_received),
            ("DataSent", self.data_sent),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{dispatch, AppAction, AppId};
    use crate::scheduler::EventQueue;
    use crate::trace::Tracer;
    use nnnsim_common::{FaceId, Name, NodeId, PduKind};
    use std::time::Duration;

    fn producer(is_mobile: bool) -> Producer {
        Producer::new(ProducerConfig {
            prefix: Name::from_uri("/waseda/satolab").unwrap(),
            payload_size: 16,
            freshness: Duration::from_secs(2),
            is_mobile,
            ..ProducerConfig::default()
        })
    }

    fn run(p: &mut Producer, name: Option<NnnAddress>, pdu: Option<Pdu>) -> Vec<AppAction> {
        let mut queue = EventQueue::new();
        let tracer = Tracer::new(NodeId(0));
        let mut sched = queue.for_node(NodeId(0));
        let mut ctx = AppContext::new(AppId(1), FaceId(0), &mut sched, &tracer, name);
        match pdu {
            Some(pdu) => dispatch(p, pdu, &mut ctx),
            None => p.start(&mut ctx),
        }
        ctx.into_actions()
    }

    fn interest_payload() -> PduPayload {
        let name = Name::from_uri("/waseda/satolab").unwrap().append_seq_num(4);
        encode_icn(&IcnPacket::Interest(Interest::new(name))).unwrap()
    }

    fn reply(actions: Vec<AppAction>) -> (Pdu, Data) {
        let Some(AppAction::Send(pdu)) = actions.into_iter().next() else {
            panic!("no reply");
        };
        let Some(IcnPacket::Data(data)) = decode_icn(pdu.payload().unwrap()) else {
            panic!("reply is not Data");
        };
        (pdu, data)
    }

    #[test]
    fn start_registers_the_prefix() {
        let mut p = producer(false);
        let actions = run(&mut p, None, None);
        assert_eq!(
            actions,
            vec![AppAction::RegisterPrefix {
                prefix: Name::from_uri("/waseda/satolab").unwrap(),
                cost: 0
            }]
        );
    }

    #[test]
    fn data_mirrors_the_interest() {
        let mut p = producer(false);
        run(&mut p, None, None);
        let (pdu, data) = reply(run(&mut p, None, Some(Pdu::nullp(interest_payload()))));
        assert_eq!(pdu.kind(), PduKind::Nullp);
        assert_eq!(data.name.last().unwrap().to_seq_num(), Some(4));
        assert_eq!(data.payload.len(), 16);
        assert_eq!(data.freshness, Duration::from_secs(2));
        assert_eq!(p.counters()["DataSent"], 1);
    }

    #[test]
    fn reply_pdu_follows_the_request() {
        let me: NnnAddress = "1.1".parse().unwrap();
        let them: NnnAddress = "2".parse().unwrap();

        let mut fixed = producer(false);
        run(&mut fixed, Some(me.clone()), None);
        let (pdu, _) = reply(run(&mut fixed, Some(me.clone()), Some(Pdu::so(them.clone(), interest_payload()))));
        assert_eq!(pdu.kind(), PduKind::Do);
        assert_eq!(pdu.dst(), Some(&them));

        let du = Pdu::du(them.clone(), me.clone(), interest_payload());
        let (pdu, _) = reply(run(&mut fixed, Some(me.clone()), Some(du.clone())));
        assert_eq!((pdu.src(), pdu.dst()), (Some(&me), Some(&them)));

        let mut mobile = producer(true);
        run(&mut mobile, Some(me.clone()), None);
        let (pdu, _) = reply(run(&mut mobile, Some(me.clone()), Some(Pdu::so(them.clone(), interest_payload()))));
        assert_eq!(pdu.kind(), PduKind::Du);
        let (pdu, _) = reply(run(&mut mobile, Some(me.clone()), Some(Pdu::nullp(interest_payload()))));
        assert_eq!(pdu.src(), Some(&me));
        // a mobile producer without a name falls back to NULLp
        let (pdu, _) = reply(run(&mut mobile, None, Some(Pdu::do_(me, interest_payload()))));
        assert_eq!(pdu.kind(), PduKind::Nullp);
    }
}

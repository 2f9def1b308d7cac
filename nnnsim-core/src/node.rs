//! The 3N layer-3 protocol of one node.
//!
//! A [`Node`] owns its faces and tables and reacts to the events the
//! simulator hands it. Data PDUs carrying ICN packets go through the
//! Interest/Data pipeline; DO and DU PDUs for other nodes are routed by 3N
//! name through the NNST; naming PDUs drive the enrollment exchange.

use crate::app::{decode_icn, dispatch, encode_icn, App, AppAction, AppContext, AppId};
use crate::config::NodeConfig;
use crate::cs::{create_content_store, ContentStore};
use crate::face::{Face, FaceKind, Outgoing};
use crate::fib::{FaceStatus, Fib};
use crate::names::{NamesContainer, NamesEvent};
use crate::nnpt::Nnpt;
use crate::nnst::Nnst;
use crate::pdu_buffer::PduBuffer;
use crate::pit::{Pit, PitEntryId};
use crate::policy::PolicyRegistry;
use crate::scheduler::{EventKind, Scheduler, TimerSlot};
use crate::strategy::{create_strategy, ForwardingStrategy};
use crate::trace::{Direction, TraceEvent, Tracer};
use bytes::Bytes;
use log::{debug, info, trace, warn};
use nnnsim_common::metrics::{NodeMetrics, TrafficSnapshot};
use nnnsim_common::pdu::{AenPdu, DenPdu, EnPdu, InfPdu, OenPdu, PduHeader, RenPdu};
use nnnsim_common::{
    Data, Error, FaceId, IcnPacket, Interest, NackType, Name, NnnAddress, NodeId, Pdu, Poa, Result, Time,
    WireFormat,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug)]
struct AppSlot {
    app: Box<dyn App>,
    face: Option<FaceId>,
}

/// End-of-run summary of a node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub node: u32,
    pub name: Option<NnnAddress>,
    pub metrics: BTreeMap<&'static str, u64>,
    pub faces: BTreeMap<u32, BTreeMap<String, TrafficSnapshot>>,
    pub apps: BTreeMap<u32, BTreeMap<&'static str, u64>>,
    pub cs_entries: usize,
    pub pit_entries: usize,
    pub fib_entries: usize,
    pub nnst_entries: usize,
}

#[derive(Debug)]
pub struct Node {
    id: NodeId,
    config: NodeConfig,
    faces: BTreeMap<FaceId, Face>,
    next_face: u32,

    cs: Box<dyn ContentStore>,
    pit: Pit,
    fib: Fib,
    nnst: Nnst,
    nnpt: Nnpt,
    names: NamesContainer,
    buffer: PduBuffer,

    nnst_timer: TimerSlot,
    nnpt_timer: TimerSlot,
    names_timer: TimerSlot,
    buffer_timer: TimerSlot,

    /// Last label handed out to an enrolling neighbour
    last_child_label: u64,

    apps: BTreeMap<AppId, AppSlot>,
    strategy: Box<dyn ForwardingStrategy>,
    metrics: Arc<NodeMetrics>,
    tracer: Tracer,
}

impl Node {
    pub fn new(id: NodeId, config: NodeConfig, registry: &PolicyRegistry, tracer: Tracer) -> Result<Self> {
        let metrics = Arc::new(NodeMetrics::new());
        let cs = create_content_store(&config.content_store, registry, tracer.clone(), metrics.clone())?;
        let pit = Pit::from_config(&config.pit, registry, tracer.clone(), metrics.clone())?;
        let mut names = NamesContainer::new(config.renewal);
        if let Some(name) = &config.name {
            names.add_entry(name.clone(), Time::MAX, true);
        }
        Ok(Self {
            id,
            faces: BTreeMap::new(),
            next_face: 0,
            cs,
            pit,
            fib: Fib::new(),
            nnst: Nnst::new(),
            nnpt: Nnpt::new(),
            names,
            buffer: PduBuffer::new(config.buffer_retx),
            nnst_timer: TimerSlot::new(),
            nnpt_timer: TimerSlot::new(),
            names_timer: TimerSlot::new(),
            buffer_timer: TimerSlot::new(),
            last_child_label: 0,
            apps: BTreeMap::new(),
            strategy: create_strategy(config.strategy),
            metrics,
            tracer,
            config,
        })
    }

    /* ---- accessors ---- */

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn cs(&self) -> &dyn ContentStore {
        self.cs.as_ref()
    }

    pub fn pit(&self) -> &Pit {
        &self.pit
    }

    pub fn fib(&self) -> &Fib {
        &self.fib
    }

    pub fn fib_mut(&mut self) -> &mut Fib {
        &mut self.fib
    }

    pub fn nnst(&self) -> &Nnst {
        &self.nnst
    }

    pub fn nnst_mut(&mut self) -> &mut Nnst {
        &mut self.nnst
    }

    pub fn nnpt(&self) -> &Nnpt {
        &self.nnpt
    }

    pub fn names(&self) -> &NamesContainer {
        &self.names
    }

    pub fn buffer(&self) -> &PduBuffer {
        &self.buffer
    }

    pub fn strategy(&self) -> &dyn ForwardingStrategy {
        self.strategy.as_ref()
    }

    pub fn metrics(&self) -> &Arc<NodeMetrics> {
        &self.metrics
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Current 3N name: the one with the furthest lease.
    pub fn name(&self) -> Option<&NnnAddress> {
        self.names.find_newest_name()
    }

    pub fn app(&self, id: AppId) -> Option<&dyn App> {
        self.apps.get(&id).map(|slot| slot.app.as_ref())
    }

    /* ---- faces ---- */

    pub fn add_face(&mut self, kind: FaceKind, address: Poa) -> FaceId {
        let id = FaceId(self.next_face);
        self.next_face += 1;
        let face = match kind {
            FaceKind::NetDevice => Face::net_device(id, address),
            FaceKind::Application(app) => Face::application(id, app),
        };
        debug!("[Node {}] added face {}", self.id.0, face);
        self.faces.insert(id, face);
        id
    }

    /// The `index`-th face in id order.
    pub fn face(&self, index: usize) -> Option<&Face> {
        self.faces.values().nth(index)
    }

    pub fn face_by_id(&self, id: FaceId) -> Option<&Face> {
        self.faces.get(&id)
    }

    pub fn face_by_id_mut(&mut self, id: FaceId) -> Option<&mut Face> {
        self.faces.get_mut(&id)
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn faces(&self) -> impl Iterator<Item = &Face> + '_ {
        self.faces.values()
    }

    /// Removes a face and every route or pending state that points at it.
    pub fn remove_face(&mut self, id: FaceId, sched: &mut dyn Scheduler) -> Option<Face> {
        let face = self.faces.remove(&id)?;
        debug!("[Node {}] removed face {}", self.id.0, face);
        self.fib.remove_from_all(id);
        self.pit.remove_face_references(id, sched);
        self.nnst.remove_from_all_face(id);
        self.rearm_nnst(sched);
        Some(face)
    }

    fn poas(&self) -> Vec<Poa> {
        self.faces
            .values()
            .filter(|f| !f.is_app() && !f.address().is_empty())
            .map(|f| f.address().clone())
            .collect()
    }

    /// Encoded PDUs waiting on network-device faces.
    pub fn take_transmissions(&mut self) -> Vec<(FaceId, Bytes)> {
        let mut out = Vec::new();
        for (id, face) in self.faces.iter_mut().filter(|(_, f)| !f.is_app()) {
            for outgoing in face.take_outbox() {
                if let Outgoing::Wire { bytes, .. } = outgoing {
                    self.metrics.bytes_sent.add(bytes.len() as u64);
                    out.push((*id, bytes));
                }
            }
        }
        out
    }

    fn send_on(&mut self, face: FaceId, pdu: &Pdu, dst: Option<&Poa>, now: Time) -> bool {
        let Some(f) = self.faces.get_mut(&face) else {
            return false;
        };
        let dst = dst.filter(|p| !p.is_empty());
        let sent = f.send(pdu, dst);
        let direction = if sent { Direction::Out } else { Direction::Drop };
        self.tracer.emit(
            now,
            TraceEvent::Pdu {
                face,
                kind: pdu.kind(),
                direction,
            },
        );
        sent
    }

    fn broadcast(&mut self, pdu: &Pdu, now: Time) {
        let faces: Vec<FaceId> = self
            .faces
            .values()
            .filter(|f| !f.is_app() && f.is_up())
            .map(Face::id)
            .collect();
        for face in faces {
            self.send_on(face, pdu, None, now);
        }
    }

    /* ---- routes and names ---- */

    pub fn add_route(&mut self, prefix: &Name, face: FaceId, cost: u16) {
        self.fib.add(prefix, face, cost);
    }

    /// Adopts `name`. Fixed names never expire.
    pub fn set_name(&mut self, name: NnnAddress, lease: Time, fixed: bool, sched: &mut dyn Scheduler) {
        self.names.add_entry(name, lease, fixed);
        self.rearm_names(sched);
    }

    /// Asks the neighbours for a name: EN when unnamed, OEN to carry over a
    /// leased name.
    pub fn enroll(&mut self, sched: &mut dyn Scheduler) {
        let now = sched.now();
        let poas = self.poas();
        let leased = self
            .names
            .iter()
            .find(|e| !e.fixed)
            .map(|e| (e.name.clone(), e.lease_expire));
        let pdu = match leased {
            Some((name, lease)) => Pdu::Oen(OenPdu {
                header: PduHeader::default(),
                poas: poas.clone(),
                src: name.clone(),
                name,
                lease,
                personal_poas: poas,
            }),
            None => Pdu::En(EnPdu {
                header: PduHeader::default(),
                poas,
            }),
        };
        info!("[Node {}] enrolling with {}", self.id.0, pdu.kind());
        self.broadcast(&pdu, now);
    }

    /// Gives up the current leased name.
    pub fn disenroll(&mut self, sched: &mut dyn Scheduler) {
        let now = sched.now();
        let Some(name) = self.names.iter().find(|e| !e.fixed).map(|e| e.name.clone()) else {
            return;
        };
        let pdu = Pdu::Den(DenPdu {
            header: PduHeader::default(),
            poas: self.poas(),
            name: name.clone(),
        });
        self.broadcast(&pdu, now);
        self.names.delete_entry(&name);
        self.rearm_names(sched);
    }

    /// Called once when the simulation starts.
    pub fn start(&mut self, sched: &mut dyn Scheduler) {
        if self.names.is_empty() && self.faces.values().any(|f| !f.is_app()) {
            self.enroll(sched);
        }
        self.rearm_names(sched);
    }

    /* ---- timers ---- */

    fn rearm_nnst(&mut self, sched: &mut dyn Scheduler) {
        let next = self.nnst.next_lease_expiry();
        self.nnst_timer.rearm(sched, next, EventKind::NnstLeaseCheck);
    }

    fn rearm_nnpt(&mut self, sched: &mut dyn Scheduler) {
        let next = self.nnpt.next_expiring().map(|e| e.lease_expire);
        self.nnpt_timer.rearm(sched, next, EventKind::NnptCleanup);
    }

    fn rearm_names(&mut self, sched: &mut dyn Scheduler) {
        let next = self.names.next_deadline();
        self.names_timer.rearm(sched, next, EventKind::NamesLeaseCheck);
    }

    fn rearm_buffer(&mut self, sched: &mut dyn Scheduler) {
        let next = self.buffer.next_deadline();
        self.buffer_timer.rearm(sched, next, EventKind::PduBufferRetry);
    }

    /* ---- events ---- */

    pub fn handle_event(&mut self, event: EventKind, sched: &mut dyn Scheduler) {
        match event {
            EventKind::Deliver { face, bytes } => self.on_wire(face, bytes, sched),
            EventKind::ContentStoreCleanup => self.cs.on_cleanup(sched),
            EventKind::PitCleanup => {
                self.pit.clean_expired(sched);
            }
            EventKind::NnstLeaseCheck => {
                self.nnst_timer.fired();
                self.nnst.clean_expired(sched.now());
                self.rearm_nnst(sched);
            }
            EventKind::NnptCleanup => {
                self.nnpt_timer.fired();
                self.nnpt.clean_expired(sched.now());
                self.rearm_nnpt(sched);
            }
            EventKind::NamesLeaseCheck => self.on_names_timer(sched),
            EventKind::PduBufferRetry => self.retry_buffered(sched),
            EventKind::AppStart(app) => self.start_app(app, sched),
            EventKind::AppStop(app) => self.stop_app(app, sched),
            EventKind::App { app, timer } => self.with_app(app, sched, |a, ctx| a.on_timer(timer, ctx)),
        }
        self.pump(sched);
    }

    fn on_wire(&mut self, face: FaceId, bytes: Bytes, sched: &mut dyn Scheduler) {
        self.metrics.bytes_received.add(bytes.len() as u64);
        let Some(f) = self.faces.get_mut(&face) else {
            debug!("[Node {}] bytes for unknown face {}", self.id.0, face);
            return;
        };
        let pdu = match f.receive_wire(&bytes) {
            Ok(pdu) => pdu,
            Err(Error::UnknownHeader) => return,
            Err(e) => {
                debug!("[Node {}] dropping PDU from {}: {}", self.id.0, face, e);
                return;
            }
        };
        self.tracer.emit(
            sched.now(),
            TraceEvent::Pdu {
                face,
                kind: pdu.kind(),
                direction: Direction::In,
            },
        );
        self.process_pdu(face, pdu, sched);
    }

    fn on_names_timer(&mut self, sched: &mut dyn Scheduler) {
        self.names_timer.fired();
        let now = sched.now();
        for event in self.names.on_timer(now) {
            match event {
                NamesEvent::Renew(name) => {
                    let remaining = self
                        .names
                        .find_name_expire_time(&name)
                        .map_or(Time::ZERO, |t| t.saturating_sub(now));
                    let pdu = Pdu::Ren(RenPdu {
                        header: PduHeader::default(),
                        poas: self.poas(),
                        name,
                        remaining_lease: remaining,
                    });
                    self.broadcast(&pdu, now);
                }
                NamesEvent::NoName => {
                    info!("[Node {}] lost its 3N name", self.id.0);
                    self.enroll(sched);
                }
            }
        }
        self.rearm_names(sched);
    }

    /* ---- apps ---- */

    pub fn install_app(&mut self, id: AppId, app: Box<dyn App>) {
        self.apps.insert(id, AppSlot { app, face: None });
    }

    pub fn app_ids(&self) -> impl Iterator<Item = AppId> + '_ {
        self.apps.keys().copied()
    }

    fn start_app(&mut self, id: AppId, sched: &mut dyn Scheduler) {
        match self.apps.get(&id) {
            Some(slot) if slot.face.is_none() => {}
            _ => return,
        }
        let face = self.add_face(FaceKind::Application(id), Poa::default());
        if let Some(slot) = self.apps.get_mut(&id) {
            slot.face = Some(face);
        }
        self.with_app(id, sched, |app, ctx| app.start(ctx));
    }

    fn stop_app(&mut self, id: AppId, sched: &mut dyn Scheduler) {
        self.with_app(id, sched, |app, ctx| app.stop(ctx));
        let face = self.apps.get_mut(&id).and_then(|slot| slot.face.take());
        if let Some(face) = face {
            if let Some(f) = self.faces.get_mut(&face) {
                f.set_up(false);
            }
            self.remove_face(face, sched);
        }
    }

    fn with_app(
        &mut self,
        id: AppId,
        sched: &mut dyn Scheduler,
        f: impl FnOnce(&mut dyn App, &mut AppContext<'_>),
    ) {
        let node_name = self.names.find_newest_name().cloned();
        let Some(slot) = self.apps.get_mut(&id) else {
            return;
        };
        let Some(face) = slot.face else {
            return;
        };
        let mut ctx = AppContext::new(id, face, sched, &self.tracer, node_name);
        f(slot.app.as_mut(), &mut ctx);
        let actions = ctx.into_actions();
        self.apply_app_actions(face, actions, sched);
    }

    fn apply_app_actions(&mut self, face: FaceId, actions: Vec<AppAction>, sched: &mut dyn Scheduler) {
        for action in actions {
            match action {
                AppAction::Send(pdu) => {
                    let accepted = self
                        .faces
                        .get_mut(&face)
                        .map_or(false, |f| f.receive_from_app(&pdu));
                    if accepted {
                        self.process_pdu(face, pdu, sched);
                    }
                }
                AppAction::RegisterPrefix { prefix, cost } => {
                    self.fib.add(&prefix, face, cost);
                    self.fib.update_status(&prefix, face, FaceStatus::Green);
                }
            }
        }
    }

    /// Hands PDUs queued on application faces to their apps until nothing
    /// is left.
    fn pump(&mut self, sched: &mut dyn Scheduler) {
        loop {
            let mut pending = Vec::new();
            for face in self.faces.values_mut() {
                let Some(app) = face.app() else {
                    continue;
                };
                for outgoing in face.take_outbox() {
                    if let Outgoing::App(pdu) = outgoing {
                        pending.push((app, pdu));
                    }
                }
            }
            if pending.is_empty() {
                break;
            }
            for (app, pdu) in pending {
                self.with_app(app, sched, |a, ctx| dispatch(a, pdu, ctx));
            }
        }
    }

    /* ---- PDU processing ---- */

    fn process_pdu(&mut self, face: FaceId, pdu: Pdu, sched: &mut dyn Scheduler) {
        match pdu {
            Pdu::En(en) => self.on_en(face, en, sched),
            Pdu::Oen(oen) => self.on_oen(face, oen, sched),
            Pdu::Aen(aen) => self.on_aen(face, aen, sched),
            Pdu::Ren(ren) => self.on_ren(face, ren, sched),
            Pdu::Den(den) => {
                self.nnst.remove_poas(&den.name, &den.poas);
                self.rearm_nnst(sched);
            }
            Pdu::Inf(inf) => self.on_inf(face, inf, sched),
            data_pdu => {
                let target = data_pdu
                    .dst()
                    .filter(|dst| !self.names.found_name(dst))
                    .cloned();
                self.on_icn(face, &data_pdu, target, sched);
            }
        }
    }

    fn on_icn(&mut self, face: FaceId, pdu: &Pdu, target: Option<NnnAddress>, sched: &mut dyn Scheduler) {
        let Some(packet) = pdu.payload().and_then(decode_icn) else {
            return;
        };
        match packet {
            IcnPacket::Interest(interest) if interest.is_nack() => {
                if target.is_some() && self.pit.lookup(&interest.name).is_none() {
                    self.forward_nnn(Some(face), pdu.clone(), sched);
                } else {
                    self.on_nack(face, interest, sched);
                }
            }
            IcnPacket::Interest(interest) => self.on_interest(face, pdu, interest, target, sched),
            IcnPacket::Data(data) => {
                if target.is_some() && !self.has_pending(&data.name) {
                    self.forward_nnn(Some(face), pdu.clone(), sched);
                } else {
                    self.on_data(face, pdu, data, sched);
                }
            }
        }
    }

    fn has_pending(&mut self, data_name: &Name) -> bool {
        self.pit
            .lookup_data(data_name)
            .and_then(|id| self.pit.get(id))
            .map_or(false, |e| !e.is_erased())
    }

    /// Wraps an ICN packet in the PDU type that fits the known addresses.
    fn wrap(packet: &IcnPacket, src: Option<&NnnAddress>, dst: Option<&NnnAddress>) -> Option<Pdu> {
        let payload = encode_icn(packet)?;
        Some(match (src, dst) {
            (Some(s), Some(d)) => Pdu::du(s.clone(), d.clone(), payload),
            (None, Some(d)) => Pdu::do_(d.clone(), payload),
            (Some(s), None) => Pdu::so(s.clone(), payload),
            (None, None) => Pdu::nullp(payload),
        })
    }

    fn send_nack(
        &mut self,
        face: FaceId,
        interest: &Interest,
        kind: NackType,
        requester: Option<&NnnAddress>,
        now: Time,
    ) {
        let nack = interest.clone().with_nack(kind);
        let Some(pdu) = Self::wrap(&IcnPacket::Interest(nack), None, requester) else {
            return;
        };
        if self.send_on(face, &pdu, None, now) {
            self.metrics.nacks_sent.increment();
        }
    }

    fn send_data(&mut self, face: FaceId, data: &Data, src: Option<&NnnAddress>, dst: Option<&NnnAddress>, now: Time) {
        let Some(pdu) = Self::wrap(&IcnPacket::Data(data.clone()), src, dst) else {
            return;
        };
        if self.send_on(face, &pdu, None, now) {
            self.metrics.data_sent.increment();
        }
    }

    fn on_interest(
        &mut self,
        face: FaceId,
        pdu: &Pdu,
        interest: Interest,
        route: Option<NnnAddress>,
        sched: &mut dyn Scheduler,
    ) {
        let now = sched.now();
        self.metrics.interests_received.increment();
        let requester = pdu.src().cloned();

        let existing = self.pit.lookup(&interest.name);
        if let Some(id) = existing {
            if self.pit.get(id).map_or(false, |e| e.is_nonce_seen(interest.nonce)) {
                debug!("[Node {}] looping Interest {} dropped", self.id.0, interest.name);
                self.metrics.interests_dropped.increment();
                self.send_nack(face, &interest, NackType::Loop, requester.as_ref(), now);
                return;
            }
        }

        if let Some(data) = self.cs.lookup(&interest, sched) {
            trace!("[Node {}] CS hit for {}", self.id.0, interest.name);
            self.send_data(face, &data, None, requester.as_ref(), now);
            return;
        }

        if let Some(id) = existing {
            let added = match self.pit.get_mut(id) {
                Some(entry) => {
                    entry.add_seen_nonce(interest.nonce);
                    entry.add_incoming(face, requester.as_ref(), now)
                }
                None => false,
            };
            self.pit.update_lifetime(id, interest.lifetime, sched);
            if added {
                trace!("[Node {}] aggregated Interest {}", self.id.0, interest.name);
                self.metrics.interests_aggregated.increment();
                return;
            }
            // same requester asking again
            self.forward_interest(id, face, pdu, &interest, route, sched);
            return;
        }

        let created = match &route {
            Some(_) => self.pit.create_for(&interest, interest.name.clone(), sched),
            None => self.pit.create(&interest, &self.fib, sched),
        };
        let id = match created {
            Ok(id) => id,
            Err(Error::NoFaces(_)) => {
                debug!("[Node {}] no route for {}", self.id.0, interest.name);
                self.metrics.fib_misses.increment();
                self.metrics.interests_dropped.increment();
                self.send_nack(face, &interest, NackType::GiveupPit, requester.as_ref(), now);
                return;
            }
            Err(e) => {
                warn!("[Node {}] dropping Interest {}: {}", self.id.0, interest.name, e);
                self.metrics.interests_dropped.increment();
                return;
            }
        };
        if let Some(entry) = self.pit.get_mut(id) {
            entry.add_incoming(face, requester.as_ref(), now);
            entry.add_seen_nonce(interest.nonce);
        }
        self.forward_interest(id, face, pdu, &interest, route, sched);
    }

    fn forward_interest(
        &mut self,
        id: PitEntryId,
        in_face: FaceId,
        pdu: &Pdu,
        interest: &Interest,
        route: Option<NnnAddress>,
        sched: &mut dyn Scheduler,
    ) {
        let now = sched.now();
        if route.is_some() {
            if let Some(out) = self.forward_nnn(Some(in_face), pdu.clone(), sched) {
                if let Some(entry) = self.pit.get_mut(id) {
                    entry.add_outgoing(out, now);
                }
                self.metrics.interests_forwarded.increment();
            }
            return;
        }

        let faces = match (self.fib.longest_prefix_match(&interest.name), self.pit.get(id)) {
            (Some(fib_entry), Some(entry)) => {
                self.metrics.fib_hits.increment();
                self.strategy.select_faces(fib_entry, entry, in_face)
            }
            _ => Vec::new(),
        };
        if faces.is_empty() {
            debug!("[Node {}] nowhere to forward {}", self.id.0, interest.name);
            self.metrics.interests_dropped.increment();
            self.nack_requesters(id, interest, NackType::GiveupPit, now);
            self.pit.erase(id, sched);
            return;
        }
        for out in faces {
            if let Some(entry) = self.pit.get_mut(id) {
                entry.add_outgoing(out, now);
            }
            if self.send_on(out, pdu, None, now) {
                self.metrics.interests_forwarded.increment();
            }
        }
    }

    fn on_nack(&mut self, face: FaceId, interest: Interest, sched: &mut dyn Scheduler) {
        let now = sched.now();
        let Some(id) = self.pit.lookup(&interest.name) else {
            trace!("[Node {}] NACK for unknown {}", self.id.0, interest.name);
            return;
        };
        let Some(entry) = self.pit.get_mut(id) else {
            return;
        };
        entry.set_waiting_in_vain(face);
        if !entry.are_all_outgoing_in_vain() {
            return;
        }
        debug!("[Node {}] giving up on {} ({:?})", self.id.0, interest.name, interest.nack);
        let plain = interest.clone().with_nack(NackType::NormalInterest);
        self.nack_requesters(id, &plain, interest.nack, now);
        self.pit.erase(id, sched);
    }

    /// NACKs every requester recorded on a PIT entry.
    fn nack_requesters(&mut self, id: PitEntryId, interest: &Interest, nack: NackType, now: Time) {
        let incoming = match self.pit.get(id) {
            Some(entry) => entry.incoming().to_vec(),
            None => return,
        };
        for record in incoming {
            if record.addrs.is_empty() {
                self.send_nack(record.face, interest, nack, None, now);
            }
            for addr in &record.addrs {
                self.send_nack(record.face, interest, nack, Some(addr), now);
            }
        }
    }

    fn on_data(&mut self, face: FaceId, pdu: &Pdu, data: Data, sched: &mut dyn Scheduler) {
        let now = sched.now();
        self.metrics.data_received.increment();
        let Some(id) = self.pit.lookup_data(&data.name) else {
            debug!("[Node {}] unsolicited Data {}", self.id.0, data.name);
            self.metrics.data_unsolicited.increment();
            return;
        };
        let Some(entry) = self.pit.get(id) else {
            return;
        };
        if entry.is_erased() {
            trace!("[Node {}] duplicate Data {} absorbed", self.id.0, data.name);
            return;
        }
        let incoming = entry.incoming().to_vec();
        let prefix = entry.fib_prefix().clone();
        let sample = entry.outgoing_face(face).map(|o| now.saturating_sub(o.send_time));

        self.cs.add(&data, sched);

        let src = pdu.src().cloned();
        for record in incoming.iter().filter(|r| r.face != face) {
            if record.addrs.is_empty() {
                self.send_data(record.face, &data, src.as_ref(), None, now);
            }
            for addr in &record.addrs {
                self.send_data(record.face, &data, src.as_ref(), Some(addr), now);
            }
        }
        self.pit.note_satisfied(&data.name, now);

        if let (Some(sample), Some(fib_entry)) = (sample, self.fib.find_mut(&prefix)) {
            fib_entry.update_face_rtt(face, sample);
            fib_entry.update_status(face, FaceStatus::Green);
        }
        self.pit.mark_erased(id, sched);
    }

    /* ---- 3N routing ---- */

    fn rewrite_destination(&self, pdu: &mut Pdu) {
        let new = match pdu.dst().and_then(|dst| self.nnpt.find_paired_name(dst)) {
            Some(new) => new.clone(),
            None => return,
        };
        trace!("[Node {}] rewriting destination to {}", self.id.0, new);
        match pdu {
            Pdu::Do(p) => p.dst = new,
            Pdu::Du(p) => p.dst = new,
            _ => {}
        }
    }

    fn next_hop(&self, dst: &NnnAddress, exclude: Option<FaceId>) -> Option<(FaceId, Poa)> {
        let entry = self.nnst.closest_sector(dst)?;
        entry
            .metrics()
            .iter()
            .filter(|m| Some(m.face) != exclude)
            .find(|m| self.faces.get(&m.face).map_or(false, Face::is_up))
            .map(|m| (m.face, m.poa.clone()))
    }

    /// Sends a DO/DU towards its destination, or buffers it when there is no
    /// route. Returns the face used.
    fn forward_nnn(&mut self, in_face: Option<FaceId>, mut pdu: Pdu, sched: &mut dyn Scheduler) -> Option<FaceId> {
        let now = sched.now();
        self.rewrite_destination(&mut pdu);
        let dst = pdu.dst()?.clone();
        match self.next_hop(&dst, in_face) {
            Some((face, poa)) => {
                self.metrics.nnst_hits.increment();
                self.send_on(face, &pdu, Some(&poa), now).then_some(face)
            }
            None => {
                trace!("[Node {}] buffering {} for {}", self.id.0, pdu.kind(), dst);
                self.metrics.nnst_misses.increment();
                if in_face.is_some() {
                    self.metrics.pdus_buffered.increment();
                }
                self.buffer.push(&dst, &pdu, now);
                self.rearm_buffer(sched);
                None
            }
        }
    }

    fn retry_buffered(&mut self, sched: &mut dyn Scheduler) {
        self.buffer_timer.fired();
        for dst in self.buffer.destinations() {
            for wire in self.buffer.pop_queue(&dst) {
                match Pdu::from_wire(&wire) {
                    Ok(pdu) => {
                        self.forward_nnn(None, pdu, sched);
                    }
                    Err(e) => warn!("[Node {}] corrupt buffered PDU: {}", self.id.0, e),
                }
            }
        }
        self.rearm_buffer(sched);
    }

    /* ---- naming exchange ---- */

    fn allocate_child(&mut self) -> Option<NnnAddress> {
        if !self.config.produce_names {
            return None;
        }
        let me = self.name()?.clone();
        loop {
            self.last_child_label = self.last_child_label.checked_add(1)?;
            let candidate = me.clone().append(self.last_child_label).ok()?;
            if !self.nnst.found_name(&candidate) {
                return Some(candidate);
            }
        }
    }

    fn grant(&mut self, face: FaceId, name: &NnnAddress, poas: &[Poa], sched: &mut dyn Scheduler) -> Time {
        let now = sched.now();
        let lease = now + self.config.lease;
        self.nnst.add_poas(name, face, poas, lease, 0);
        self.nnst.update_lease_time(name, lease);
        self.rearm_nnst(sched);
        let aen = Pdu::Aen(AenPdu {
            header: PduHeader::default(),
            name: name.clone(),
            lease,
        });
        self.send_on(face, &aen, poas.first(), now);
        lease
    }

    fn on_en(&mut self, face: FaceId, en: EnPdu, sched: &mut dyn Scheduler) {
        let Some(child) = self.allocate_child() else {
            return;
        };
        info!("[Node {}] assigning {} on {}", self.id.0, child, face);
        self.metrics.names_assigned.increment();
        self.grant(face, &child, &en.poas, sched);
    }

    fn on_oen(&mut self, face: FaceId, oen: OenPdu, sched: &mut dyn Scheduler) {
        let Some(child) = self.allocate_child() else {
            return;
        };
        info!("[Node {}] {} re-enrolled as {}", self.id.0, oen.name, child);
        self.metrics.names_assigned.increment();
        let lease = self.grant(face, &child, &oen.poas, sched);
        self.nnpt.add_entry(&oen.name, &child, lease);
        self.rearm_nnpt(sched);

        let inf = InfPdu {
            header: PduHeader::default(),
            old_name: oen.name,
            new_name: child,
            remaining_lease: self.config.lease,
        };
        self.forward_inf(Some(face), inf, sched);
    }

    /// Sends an INF towards the sector of the old name.
    fn forward_inf(&mut self, in_face: Option<FaceId>, inf: InfPdu, sched: &mut dyn Scheduler) {
        let sector = inf.old_name.sector_name();
        if self.name() == Some(&sector) || sector.is_empty() {
            return;
        }
        if let Some((face, poa)) = self.next_hop(&sector, in_face) {
            self.send_on(face, &Pdu::Inf(inf), Some(&poa), sched.now());
        }
    }

    fn on_aen(&mut self, face: FaceId, aen: AenPdu, sched: &mut dyn Scheduler) {
        let known = self.names.found_name(&aen.name);
        if !known && !self.names.is_empty() {
            debug!("[Node {}] ignoring extra name {}", self.id.0, aen.name);
            return;
        }
        if known {
            self.names.update_lease_time(&aen.name, aen.lease);
        } else {
            info!("[Node {}] got 3N name {}", self.id.0, aen.name);
            self.names.add_entry(aen.name.clone(), aen.lease, false);
        }
        let parent = aen.name.sector_name();
        if !parent.is_empty() {
            self.nnst.add(&parent, face, Poa::default(), aen.lease, 0);
            self.nnst.update_lease_time(&parent, aen.lease);
            self.rearm_nnst(sched);
        }
        self.rearm_names(sched);
    }

    fn on_ren(&mut self, face: FaceId, ren: RenPdu, sched: &mut dyn Scheduler) {
        let mine = self.config.produce_names && self.name() == Some(&ren.name.sector_name());
        if !mine {
            return;
        }
        debug!("[Node {}] renewing {}", self.id.0, ren.name);
        self.grant(face, &ren.name, &ren.poas, sched);
    }

    fn on_inf(&mut self, face: FaceId, inf: InfPdu, sched: &mut dyn Scheduler) {
        if self.nnpt.find_paired_name(&inf.old_name) == Some(&inf.new_name) {
            return;
        }
        let lease = sched.now() + inf.remaining_lease;
        self.nnpt.add_entry(&inf.old_name, &inf.new_name, lease);
        self.rearm_nnpt(sched);
        self.forward_inf(Some(face), inf, sched);
    }

    /* ---- reporting ---- */

    pub fn report(&self) -> NodeReport {
        NodeReport {
            node: self.id.0,
            name: self.name().cloned(),
            metrics: self.metrics.snapshot(),
            faces: self
                .faces
                .iter()
                .map(|(id, f)| (id.0, f.counters().snapshot()))
                .collect(),
            apps: self
                .apps
                .iter()
                .map(|(id, slot)| (id.0, slot.app.counters()))
                .collect(),
            cs_entries: self.cs.len(),
            pit_entries: self.pit.len(),
            fib_entries: self.fib.len(),
            nnst_entries: self.nnst.len(),
        }
    }
}

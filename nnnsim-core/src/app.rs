//! Applications running on top of a node.
//!
//! Every app talks to its node through a dedicated application face. PDUs
//! arriving on that face are dispatched to the per-kind hooks of [`App`];
//! the default hooks unwrap the ICN packet and call `on_interest`,
//! `on_data` or `on_nack`.

pub mod consumer;
pub mod producer;

pub use consumer::ConsumerCbr;
pub use producer::Producer;

use crate::scheduler::{EventId, EventKind, Scheduler};
use crate::trace::{TraceEvent, Tracer};
use log::{debug, warn};
use nnnsim_common::pdu::{DoPdu, DuPdu, NullpPdu, PduPayload, SoPdu};
use nnnsim_common::{Data, FaceId, IcnPacket, Interest, Name, NnnAddress, Pdu, Time, WireFormat};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Identifier of an app, unique within a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppId(pub u32);

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "App({})", self.0)
    }
}

/// Timers apps can arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppTimer {
    SendPacket,
    CheckRetxTimeout,
}

/// Requests an app leaves for its node.
#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    Send(Pdu),
    RegisterPrefix { prefix: Name, cost: u16 },
}

/// The node as seen from an app.
pub struct AppContext<'a> {
    app: AppId,
    face: FaceId,
    sched: &'a mut dyn Scheduler,
    tracer: &'a Tracer,
    node_name: Option<NnnAddress>,
    actions: Vec<AppAction>,
}

impl<'a> AppContext<'a> {
    pub fn new(
        app: AppId,
        face: FaceId,
        sched: &'a mut dyn Scheduler,
        tracer: &'a Tracer,
        node_name: Option<NnnAddress>,
    ) -> Self {
        Self {
            app,
            face,
            sched,
            tracer,
            node_name,
            actions: Vec::new(),
        }
    }

    pub fn app(&self) -> AppId {
        self.app
    }

    pub fn face(&self) -> FaceId {
        self.face
    }

    pub fn now(&self) -> Time {
        self.sched.now()
    }

    pub fn schedule(&mut self, delay: Duration, timer: AppTimer) -> EventId {
        let app = self.app;
        self.sched.schedule(delay, EventKind::App { app, timer })
    }

    pub fn cancel(&mut self, id: EventId) -> bool {
        self.sched.cancel(id)
    }

    /// Hands `pdu` to the node through the app face.
    pub fn send(&mut self, pdu: Pdu) {
        self.actions.push(AppAction::Send(pdu));
    }

    /// Routes `prefix` to this app's face.
    pub fn register_prefix(&mut self, prefix: Name, cost: u16) {
        self.actions.push(AppAction::RegisterPrefix { prefix, cost });
    }

    /// Current 3N name of the node, if it has one.
    pub fn node_name(&self) -> Option<&NnnAddress> {
        self.node_name.as_ref()
    }

    pub fn trace(&self, event: TraceEvent) {
        self.tracer.emit(self.sched.now(), event);
    }

    pub fn into_actions(self) -> Vec<AppAction> {
        self.actions
    }
}

/// Decodes the ICN packet carried by a data PDU.
pub fn decode_icn(payload: &PduPayload) -> Option<IcnPacket> {
    match IcnPacket::from_wire(&payload.bytes) {
        Ok(packet) => Some(packet),
        Err(e) => {
            debug!("dropping undecodable ICN payload: {}", e);
            None
        }
    }
}

/// Wraps an ICN packet into a PDU payload.
pub fn encode_icn(packet: &IcnPacket) -> Option<PduPayload> {
    match packet.to_wire() {
        Ok(bytes) => Some(PduPayload::icn(bytes)),
        Err(e) => {
            warn!("dropping unencodable ICN packet {}: {}", packet.name(), e);
            None
        }
    }
}

/// An application.
#[allow(unused_variables)]
pub trait App: fmt::Debug {
    fn start(&mut self, ctx: &mut AppContext<'_>) {}

    fn stop(&mut self, ctx: &mut AppContext<'_>) {}

    fn on_timer(&mut self, timer: AppTimer, ctx: &mut AppContext<'_>) {}

    fn on_interest(&mut self, interest: Interest, ctx: &mut AppContext<'_>) {}

    fn on_data(&mut self, data: Data, ctx: &mut AppContext<'_>) {}

    fn on_nack(&mut self, interest: Interest, ctx: &mut AppContext<'_>) {}

    /// Records a 3N name replies can be addressed to.
    fn remember_destination(&mut self, address: &NnnAddress) {}

    fn on_icn(&mut self, payload: &PduPayload, ctx: &mut AppContext<'_>) {
        match decode_icn(payload) {
            Some(IcnPacket::Interest(i)) if i.is_nack() => self.on_nack(i, ctx),
            Some(IcnPacket::Interest(i)) => self.on_interest(i, ctx),
            Some(IcnPacket::Data(d)) => self.on_data(d, ctx),
            None => {}
        }
    }

    fn on_nullp(&mut self, pdu: NullpPdu, ctx: &mut AppContext<'_>) {
        self.on_icn(&pdu.payload, ctx);
    }

    fn on_so(&mut self, pdu: SoPdu, ctx: &mut AppContext<'_>) {
        self.remember_destination(&pdu.src);
        self.on_icn(&pdu.payload, ctx);
    }

    fn on_do(&mut self, pdu: DoPdu, ctx: &mut AppContext<'_>) {
        self.on_icn(&pdu.payload, ctx);
    }

    fn on_du(&mut self, pdu: DuPdu, ctx: &mut AppContext<'_>) {
        self.remember_destination(&pdu.src);
        self.on_icn(&pdu.payload, ctx);
    }

    /// Counters reported at the end of a run.
    fn counters(&self) -> BTreeMap<&'static str, u64> {
        BTreeMap::new()
    }
}

/// Routes a PDU from the app face to the matching hook.
pub fn dispatch(app: &mut dyn App, pdu: Pdu, ctx: &mut AppContext<'_>) {
    match pdu {
        Pdu::Nullp(p) => app.on_nullp(p, ctx),
        Pdu::So(p) => app.on_so(p, ctx),
        Pdu::Do(p) => app.on_do(p, ctx),
        Pdu::Du(p) => app.on_du(p, ctx),
        other => debug!("{} ignores {} PDU", ctx.app(), other.kind()),
    }
}

//! Faces: the points where PDUs enter and leave a node.
//!
//! A network-device face turns PDUs into wire bytes for its link. An
//! application face hands PDUs to the app that owns it within the same
//! simulated instant.

use crate::app::AppId;
use crate::trace::Direction;
use bytes::Bytes;
use log::{debug, trace, warn};
use nnnsim_common::metrics::PduCounters;
use nnnsim_common::{Error, FaceFlags, FaceId, Pdu, PduKind, Poa, Result, WireFormat};
use std::collections::VecDeque;
use std::fmt;

/// What sits behind a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceKind {
    /// Point-to-point link.
    NetDevice,
    /// Local application.
    Application(AppId),
}

/// Something a face was asked to send.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    /// Encoded PDU for the link, optionally aimed at one PoA.
    Wire { bytes: Bytes, dst: Option<Poa> },
    /// PDU for the local application.
    App(Pdu),
}

/// A face of a node.
#[derive(Debug)]
pub struct Face {
    /// Identifier, unique within the node
    id: FaceId,

    kind: FaceKind,

    /// Link-layer address of this end
    address: Poa,

    /// Whether the face accepts traffic
    up: bool,

    /// Routing metric used when the face is registered
    metric: u16,

    flags: FaceFlags,

    /// Sent but not yet picked up by the link or the app
    outbox: VecDeque<Outgoing>,

    counters: PduCounters,
}

impl Face {
    pub fn net_device(id: FaceId, address: Poa) -> Self {
        Self::new(id, FaceKind::NetDevice, address, FaceFlags::NNN | FaceFlags::ICN)
    }

    pub fn application(id: FaceId, app: AppId) -> Self {
        Self::new(
            id,
            FaceKind::Application(app),
            Poa::default(),
            FaceFlags::APPLICATION | FaceFlags::ICN,
        )
    }

    fn new(id: FaceId, kind: FaceKind, address: Poa, flags: FaceFlags) -> Self {
        Self {
            id,
            kind,
            address,
            up: true,
            metric: 0,
            flags,
            outbox: VecDeque::new(),
            counters: PduCounters::new(),
        }
    }

    pub fn id(&self) -> FaceId {
        self.id
    }

    pub fn kind(&self) -> FaceKind {
        self.kind
    }

    pub fn is_app(&self) -> bool {
        matches!(self.kind, FaceKind::Application(_))
    }

    pub fn app(&self) -> Option<AppId> {
        match self.kind {
            FaceKind::Application(app) => Some(app),
            FaceKind::NetDevice => None,
        }
    }

    pub fn address(&self) -> &Poa {
        &self.address
    }

    pub fn is_up(&self) -> bool {
        self.up
    }

    pub fn set_up(&mut self, up: bool) {
        debug!("[Face {}] {}", self.id.0, if up { "up" } else { "down" });
        self.up = up;
    }

    pub fn metric(&self) -> u16 {
        self.metric
    }

    pub fn set_metric(&mut self, metric: u16) {
        self.metric = metric;
    }

    pub fn flags(&self) -> FaceFlags {
        self.flags
    }

    pub fn counters(&self) -> &PduCounters {
        &self.counters
    }

    /// Sends `pdu`, optionally to one PoA on the link. Returns `false` when
    /// the face is down or the PDU cannot be encoded.
    pub fn send(&mut self, pdu: &Pdu, dst: Option<&Poa>) -> bool {
        if !self.up {
            self.count(pdu.kind(), Direction::Drop);
            return false;
        }
        match self.kind {
            FaceKind::NetDevice => {
                let bytes = match pdu.to_wire() {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!("[Face {}] dropping unencodable {}: {}", self.id.0, pdu.kind(), e);
                        self.count(pdu.kind(), Direction::Drop);
                        return false;
                    }
                };
                self.count(pdu.kind(), Direction::Out);
                trace!("[Face {}] -> {} ({} bytes)", self.id.0, pdu.kind(), bytes.len());
                self.outbox.push_back(Outgoing::Wire {
                    bytes,
                    dst: dst.cloned(),
                });
            }
            FaceKind::Application(_) => {
                self.count(pdu.kind(), Direction::Out);
                self.outbox.push_back(Outgoing::App(pdu.clone()));
            }
        }
        true
    }

    /// Decodes bytes that arrived from the link.
    pub fn receive_wire(&mut self, bytes: &[u8]) -> Result<Pdu> {
        if !self.up {
            return Err(Error::Other(format!("face {} is down", self.id.0)));
        }
        match Pdu::from_wire(bytes) {
            Ok(pdu) => {
                self.count(pdu.kind(), Direction::In);
                Ok(pdu)
            }
            Err(Error::UnknownHeader) => {
                warn!("[Face {}] dropping packet with unknown header", self.id.0);
                self.counters.unknown_headers.increment();
                Err(Error::UnknownHeader)
            }
            Err(e) => {
                if let Ok(kind) = nnnsim_common::wire::classify_nnn(bytes) {
                    self.count(kind, Direction::Drop);
                }
                debug!("[Face {}] undecodable PDU: {}", self.id.0, e);
                Err(e)
            }
        }
    }

    /// Counts a PDU handed over by the app that owns this face.
    pub fn receive_from_app(&mut self, pdu: &Pdu) -> bool {
        if !self.up {
            self.count(pdu.kind(), Direction::Drop);
            return false;
        }
        self.count(pdu.kind(), Direction::In);
        true
    }

    pub fn count(&self, kind: PduKind, direction: Direction) {
        let c = self.counters.kind(kind);
        match direction {
            Direction::In => c.incoming.increment(),
            Direction::Out => c.outgoing.increment(),
            Direction::Drop => c.dropped.increment(),
        }
    }

    pub fn take_outbox(&mut self) -> Vec<Outgoing> {
        self.outbox.drain(..).collect()
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outbox.is_empty()
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FaceKind::NetDevice => write!(f, "dev={} ({})", self.id.0, self.address),
            FaceKind::Application(app) => write!(f, "app={} ({})", self.id.0, app),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nnnsim_common::pdu::PduPayload;

    fn nullp() -> Pdu {
        Pdu::nullp(PduPayload::icn(Bytes::from_static(b"x")))
    }

    #[test]
    fn net_device_encodes_and_counts() {
        let mut face = Face::net_device(FaceId(1), Poa::from_u64(1));
        assert!(face.send(&nullp(), None));
        let out = face.take_outbox();
        let Outgoing::Wire { bytes, dst } = &out[0] else {
            panic!("expected wire bytes");
        };
        assert!(dst.is_none());
        assert_eq!(face.counters().kind(PduKind::Nullp).outgoing.value(), 1);

        let mut peer = Face::net_device(FaceId(0), Poa::from_u64(2));
        assert_eq!(peer.receive_wire(bytes).unwrap(), nullp());
        assert_eq!(peer.counters().kind(PduKind::Nullp).incoming.value(), 1);
    }

    #[test]
    fn down_faces_refuse() {
        let mut face = Face::net_device(FaceId(1), Poa::from_u64(1));
        face.set_up(false);
        assert!(!face.send(&nullp(), None));
        assert!(!face.has_outgoing());
        assert_eq!(face.counters().kind(PduKind::Nullp).dropped.value(), 1);
    }

    #[test]
    fn unencodable_pdus_are_dropped() {
        let mut face = Face::net_device(FaceId(1), Poa::from_u64(1));
        let poas = Pdu::En(nnnsim_common::pdu::EnPdu {
            header: Default::default(),
            poas: vec![Poa::new(vec![0u8; 70_000])],
        });
        assert!(!face.send(&poas, None));
        assert!(!face.has_outgoing());
        assert_eq!(face.counters().kind(PduKind::En).dropped.value(), 1);
        assert_eq!(face.counters().kind(PduKind::En).outgoing.value(), 0);
    }

    #[test]
    fn unknown_headers_are_counted() {
        let mut face = Face::net_device(FaceId(1), Poa::from_u64(1));
        assert!(matches!(
            face.receive_wire(&[0xff, 0xff, 0xff, 0xff, 0]),
            Err(Error::UnknownHeader)
        ));
        assert_eq!(face.counters().unknown_headers.value(), 1);
    }

    #[test]
    fn app_faces_queue_pdus() {
        let mut face = Face::application(FaceId(2), AppId(0));
        assert!(face.is_app());
        face.send(&nullp(), None);
        assert_eq!(face.take_outbox(), vec![Outgoing::App(nullp())]);
    }
}

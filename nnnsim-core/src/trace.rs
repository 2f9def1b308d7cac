//! Trace points.
//!
//! Components publish [`TraceEvent`]s to a [`Tracer`]; anything interested
//! subscribes a closure. Cloning a tracer shares the subscriber list, so one
//! subscription observes every table of a node.

use nnnsim_common::{FaceId, Name, NodeId, PduKind, Time};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

/// Direction of a PDU counted at a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
    Drop,
}

/// Events observable from outside the data plane.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    CacheHit { name: Name },
    CacheMiss { name: Name },
    DidAddEntry { name: Name },
    WillRemoveEntry { name: Name, dwell: Duration },
    SatisfiedInterest { name: Name },
    TimedOutInterest { name: Name },
    Pdu { face: FaceId, kind: PduKind, direction: Direction },
    FirstInterestDataDelay { name: Name, seq: u64, delay: Duration, retx: u32, hops: Option<u32> },
    LastRetransmittedInterestDataDelay { name: Name, seq: u64, delay: Duration, hops: Option<u32> },
}

impl TraceEvent {
    pub fn label(&self) -> &'static str {
        match self {
            TraceEvent::CacheHit { .. } => "CacheHit",
            TraceEvent::CacheMiss { .. } => "CacheMiss",
            TraceEvent::DidAddEntry { .. } => "DidAddEntry",
            TraceEvent::WillRemoveEntry { .. } => "WillRemoveEntry",
            TraceEvent::SatisfiedInterest { .. } => "SatisfiedInterest",
            TraceEvent::TimedOutInterest { .. } => "TimedOutInterest",
            TraceEvent::Pdu { direction: Direction::In, .. } => "PduIn",
            TraceEvent::Pdu { direction: Direction::Out, .. } => "PduOut",
            TraceEvent::Pdu { direction: Direction::Drop, .. } => "PduDrop",
            TraceEvent::FirstInterestDataDelay { .. } => "FirstInterestDataDelay",
            TraceEvent::LastRetransmittedInterestDataDelay { .. } => {
                "LastRetransmittedInterestDataDelay"
            }
        }
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::CacheHit { name }
            | TraceEvent::CacheMiss { name }
            | TraceEvent::DidAddEntry { name }
            | TraceEvent::SatisfiedInterest { name }
            | TraceEvent::TimedOutInterest { name } => write!(f, "{} {}", self.label(), name),
            TraceEvent::WillRemoveEntry { name, dwell } => {
                write!(f, "{} {} dwell={:?}", self.label(), name, dwell)
            }
            TraceEvent::Pdu { face, kind, .. } => write!(f, "{} {} {}", self.label(), face, kind),
            TraceEvent::FirstInterestDataDelay { name, delay, retx, .. } => {
                write!(f, "{} {} delay={:?} retx={}", self.label(), name, delay, retx)
            }
            TraceEvent::LastRetransmittedInterestDataDelay { name, delay, .. } => {
                write!(f, "{} {} delay={:?}", self.label(), name, delay)
            }
        }
    }
}

/// A trace event stamped with where and when it happened.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRecord {
    pub time: Time,
    pub node: NodeId,
    pub event: TraceEvent,
}

type Subscriber = Box<dyn FnMut(&TraceRecord)>;

/// Subscriber hub shared by the tables of a node.
#[derive(Clone, Default)]
pub struct Tracer {
    node: NodeId,
    subscribers: Rc<RefCell<Vec<Subscriber>>>,
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("node", &self.node)
            .field("subscribers", &self.subscribers.borrow().len())
            .finish()
    }
}

impl Tracer {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            subscribers: Rc::default(),
        }
    }

    /// A tracer for another node that shares this one's subscribers.
    pub fn for_node(&self, node: NodeId) -> Self {
        Self {
            node,
            subscribers: Rc::clone(&self.subscribers),
        }
    }

    pub fn subscribe(&self, f: impl FnMut(&TraceRecord) + 'static) {
        self.subscribers.borrow_mut().push(Box::new(f));
    }

    pub fn has_subscribers(&self) -> bool {
        !self.subscribers.borrow().is_empty()
    }

    pub fn emit(&self, time: Time, event: TraceEvent) {
        log::trace!("[{}] {:?} {}", self.node, time, event);
        let mut subs = self.subscribers.borrow_mut();
        if subs.is_empty() {
            return;
        }
        let record = TraceRecord {
            time,
            node: self.node,
            event,
        };
        for sub in subs.iter_mut() {
            sub(&record);
        }
    }

    /// Collects every record into a shared vector. Handy in tests.
    pub fn collect(&self) -> Rc<RefCell<Vec<TraceRecord>>> {
        let sink = Rc::new(RefCell::new(Vec::new()));
        let out = Rc::clone(&sink);
        self.subscribe(move |r| out.borrow_mut().push(r.clone()));
        sink
    }
}

//! Discrete-event scheduling.
//!
//! Components never block: they schedule an [`EventKind`] for later and
//! return. The [`EventQueue`] orders events by time, then by insertion, and
//! cancels lazily.

use crate::app::{AppId, AppTimer};
use bytes::Bytes;
use nnnsim_common::{FaceId, NodeId, Time};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

/// Handle of a scheduled event, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(u64);

/// What should happen when an event fires.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Wire bytes arriving on a network-device face.
    Deliver { face: FaceId, bytes: Bytes },
    /// Purge Content Store entries whose freshness ran out.
    ContentStoreCleanup,
    /// Purge PIT entries that timed out or finished their pruning delay.
    PitCleanup,
    /// Purge NNST routes whose lease ran out.
    NnstLeaseCheck,
    /// Purge expired NNPT pairs.
    NnptCleanup,
    /// Renew or drop the node's own 3N names.
    NamesLeaseCheck,
    /// Retry buffered PDUs whose destination had no route.
    PduBufferRetry,
    /// Start an application.
    AppStart(AppId),
    /// Stop an application.
    AppStop(AppId),
    /// Application-owned timer.
    App { app: AppId, timer: AppTimer },
}

/// The scheduling capability handed to components.
pub trait Scheduler {
    /// Current simulated time.
    fn now(&self) -> Time;

    /// Schedules `event` to fire `delay` from now.
    fn schedule(&mut self, delay: Duration, event: EventKind) -> EventId;

    /// Withdraws a pending event. Returns `false` if it already fired or was
    /// cancelled.
    fn cancel(&mut self, id: EventId) -> bool;

    /// Schedules at an absolute time; times in the past fire immediately.
    fn schedule_at(&mut self, at: Time, event: EventKind) -> EventId {
        let delay = at.saturating_sub(self.now());
        self.schedule(delay, event)
    }
}

/// An event popped from the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEvent {
    pub id: EventId,
    pub time: Time,
    pub node: NodeId,
    pub kind: EventKind,
}

/// Simulation-wide event queue.
#[derive(Debug, Default)]
pub struct EventQueue {
    now: Time,
    next_id: u64,
    heap: BinaryHeap<Reverse<(Time, u64)>>,
    pending: HashMap<u64, (NodeId, EventKind)>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Time {
        self.now
    }

    /// Number of live (not cancelled) events.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn schedule_at(&mut self, node: NodeId, at: Time, kind: EventKind) -> EventId {
        let at = at.max(self.now);
        let id = self.next_id;
        self.next_id += 1;
        self.heap.push(Reverse((at, id)));
        self.pending.insert(id, (node, kind));
        EventId(id)
    }

    pub fn schedule(&mut self, node: NodeId, delay: Duration, kind: EventKind) -> EventId {
        self.schedule_at(node, self.now + delay, kind)
    }

    pub fn cancel(&mut self, id: EventId) -> bool {
        self.pending.remove(&id.0).is_some()
    }

    pub fn is_pending(&self, id: EventId) -> bool {
        self.pending.contains_key(&id.0)
    }

    /// Time of the next live event.
    pub fn peek_time(&mut self) -> Option<Time> {
        while let Some(Reverse((time, id))) = self.heap.peek().copied() {
            if self.pending.contains_key(&id) {
                return Some(time);
            }
            self.heap.pop();
        }
        None
    }

    /// Pops the next live event and advances the clock to it.
    pub fn pop(&mut self) -> Option<ScheduledEvent> {
        while let Some(Reverse((time, id))) = self.heap.pop() {
            if let Some((node, kind)) = self.pending.remove(&id) {
                self.now = time;
                return Some(ScheduledEvent {
                    id: EventId(id),
                    time,
                    node,
                    kind,
                });
            }
        }
        None
    }

    /// Moves the clock forward without firing anything. Used by tests and by
    /// `run_until` when the queue drains early.
    pub fn advance_to(&mut self, time: Time) {
        self.now = self.now.max(time);
    }

    /// A [`Scheduler`] that tags everything it schedules with `node`.
    pub fn for_node(&mut self, node: NodeId) -> NodeScheduler<'_> {
        NodeScheduler { queue: self, node }
    }
}

/// Per-node view of the [`EventQueue`].
#[derive(Debug)]
pub struct NodeScheduler<'a> {
    queue: &'a mut EventQueue,
    node: NodeId,
}

impl NodeScheduler<'_> {
    pub fn node(&self) -> NodeId {
        self.node
    }
}

impl Scheduler for NodeScheduler<'_> {
    fn now(&self) -> Time {
        self.queue.now()
    }

    fn schedule(&mut self, delay: Duration, event: EventKind) -> EventId {
        self.queue.schedule(self.node, delay, event)
    }

    fn cancel(&mut self, id: EventId) -> bool {
        self.queue.cancel(id)
    }
}

/// A timer slot that owns at most one pending event.
///
/// Rescheduling always cancels the previous handle first, so an event never
/// fires twice for the same deadline.
#[derive(Debug, Default, Clone)]
pub struct TimerSlot {
    pending: Option<(EventId, Time)>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deadline of the pending event, if any.
    pub fn deadline(&self) -> Option<Time> {
        self.pending.map(|(_, at)| at)
    }

    /// Arms the slot for `at`, unless it is already armed for that instant.
    pub fn arm(&mut self, sched: &mut dyn Scheduler, at: Time, event: EventKind) {
        if self.deadline() == Some(at) {
            return;
        }
        self.disarm(sched);
        let id = sched.schedule_at(at, event);
        self.pending = Some((id, at));
    }

    /// Arms the slot for `at` or disarms it when there is nothing to wait for.
    pub fn rearm(&mut self, sched: &mut dyn Scheduler, at: Option<Time>, event: EventKind) {
        match at {
            Some(at) => self.arm(sched, at, event),
            None => self.disarm(sched),
        }
    }

    pub fn disarm(&mut self, sched: &mut dyn Scheduler) {
        if let Some((id, _)) = self.pending.take() {
            sched.cancel(id);
        }
    }

    /// Marks the slot as fired; call this from the event handler.
    pub fn fired(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_time_then_insertion_order() {
        let mut q = EventQueue::new();
        let n = NodeId(0);
        q.schedule(n, Duration::from_millis(20), EventKind::PitCleanup);
        q.schedule(n, Duration::from_millis(10), EventKind::ContentStoreCleanup);
        q.schedule(n, Duration::from_millis(10), EventKind::NnstLeaseCheck);

        assert_eq!(q.pop().unwrap().kind, EventKind::ContentStoreCleanup);
        assert_eq!(q.now(), Duration::from_millis(10));
        assert_eq!(q.pop().unwrap().kind, EventKind::NnstLeaseCheck);
        assert_eq!(q.pop().unwrap().kind, EventKind::PitCleanup);
        assert!(q.pop().is_none());
    }

    #[test]
    fn cancelled_events_never_fire() {
        let mut q = EventQueue::new();
        let id = q.schedule(NodeId(1), Duration::from_millis(5), EventKind::PitCleanup);
        q.schedule(NodeId(1), Duration::from_millis(6), EventKind::NnptCleanup);
        assert!(q.cancel(id));
        assert!(!q.cancel(id));
        assert_eq!(q.len(), 1);
        assert_eq!(q.peek_time(), Some(Duration::from_millis(6)));
        assert_eq!(q.pop().unwrap().kind, EventKind::NnptCleanup);
    }

    #[test]
    fn past_deadlines_fire_now() {
        let mut q = EventQueue::new();
        q.advance_to(Duration::from_secs(1));
        let mut sched = q.for_node(NodeId(3));
        sched.schedule_at(Duration::from_millis(1), EventKind::PitCleanup);
        let ev = q.pop().unwrap();
        assert_eq!(ev.time, Duration::from_secs(1));
        assert_eq!(ev.node, NodeId(3));
    }

    #[test]
    fn timer_slot_keeps_a_single_handle() {
        let mut q = EventQueue::new();
        let mut slot = TimerSlot::new();
        {
            let mut sched = q.for_node(NodeId(0));
            slot.arm(&mut sched, Duration::from_millis(50), EventKind::PitCleanup);
            slot.arm(&mut sched, Duration::from_millis(50), EventKind::PitCleanup);
            slot.arm(&mut sched, Duration::from_millis(30), EventKind::PitCleanup);
        }
        assert_eq!(q.len(), 1);
        assert_eq!(slot.deadline(), Some(Duration::from_millis(30)));
        {
            let mut sched = q.for_node(NodeId(0));
            slot.rearm(&mut sched, None, EventKind::PitCleanup);
        }
        assert!(q.is_empty());
    }
}

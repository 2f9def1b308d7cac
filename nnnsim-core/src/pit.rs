//! Pending Interest Table.
//!
//! Entries live in a [`PolicedTrie`] keyed by name. A secondary index
//! ordered by expiry time drives the cleanup timer; it is updated by every
//! method that changes an entry's expiry.

mod entry;

pub use entry::{IncomingFace, OutgoingFace, PitEntry};

use crate::config::PitConfig;
use crate::fib::Fib;
use crate::policy::{PolicyParams, PolicyRegistry, ReplacementPolicy};
use crate::scheduler::{EventKind, Scheduler, TimerSlot};
use crate::trace::{TraceEvent, Tracer};
use crate::trie::{ItemId, PolicedTrie, PolicyPayload};
use log::{debug, trace};
use nnnsim_common::metrics::NodeMetrics;
use nnnsim_common::{Error, FaceId, Interest, Name, NameComponent, Result, Time, WireFormat};
use std::collections::BTreeSet;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

pub type PitEntryId = ItemId;

impl PolicyPayload for PitEntry {
    fn wire_size(&self) -> usize {
        self.size
    }
}

#[derive(Debug)]
pub struct Pit {
    store: PolicedTrie<NameComponent, PitEntry>,
    by_expiry: BTreeSet<(Time, ItemId)>,
    cleanup: TimerSlot,
    pruning_timeout: Duration,
    max_lifetime: Duration,
    tracer: Tracer,
    metrics: Arc<NodeMetrics>,
}

impl Pit {
    pub fn new(
        policy: Box<dyn ReplacementPolicy>,
        pruning_timeout: Duration,
        max_lifetime: Duration,
        tracer: Tracer,
        metrics: Arc<NodeMetrics>,
    ) -> Self {
        Self {
            store: PolicedTrie::new(policy),
            by_expiry: BTreeSet::new(),
            cleanup: TimerSlot::new(),
            pruning_timeout,
            max_lifetime,
            tracer,
            metrics,
        }
    }

    pub fn from_config(
        config: &PitConfig,
        registry: &PolicyRegistry,
        tracer: Tracer,
        metrics: Arc<NodeMetrics>,
    ) -> Result<Self> {
        let policy = registry.create(
            &config.policy,
            &PolicyParams {
                max_size: config.max_size,
                seed: 0,
            },
        )?;
        Ok(Self::new(
            policy,
            config.pit_entry_pruning_timout,
            config.max_pit_entry_lifetime,
            tracer,
            metrics,
        ))
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn max_lifetime(&self) -> Duration {
        self.max_lifetime
    }

    pub fn pruning_timeout(&self) -> Duration {
        self.pruning_timeout
    }

    pub fn get(&self, id: PitEntryId) -> Option<&PitEntry> {
        self.store.get(id)
    }

    pub fn get_mut(&mut self, id: PitEntryId) -> Option<&mut PitEntry> {
        self.store.get_mut(id)
    }

    /// Live entry for exactly `name`. Entries waiting out their pruning
    /// delay are invisible to Interests.
    pub fn lookup(&mut self, name: &Name) -> Option<PitEntryId> {
        let id = self.store.trie().find(name.components())?;
        if self.store.get(id)?.is_erased() {
            return None;
        }
        self.store.touch(id);
        Some(id)
    }

    /// Entry whose name is the longest prefix of `data_name`, pruned ones
    /// included so duplicate Data are absorbed.
    pub fn lookup_data(&mut self, data_name: &Name) -> Option<PitEntryId> {
        let id = self.store.trie().longest_prefix_match(data_name.components())?;
        self.store.touch(id);
        Some(id)
    }

    /// Creates an entry for `interest`. Fails with [`Error::NoFaces`] when
    /// the FIB has no route.
    pub fn create(&mut self, interest: &Interest, fib: &Fib, sched: &mut dyn Scheduler) -> Result<PitEntryId> {
        let fib_entry = fib
            .longest_prefix_match(&interest.name)
            .ok_or_else(|| Error::NoFaces(interest.name.to_string()))?;
        let prefix = fib_entry.prefix().clone();
        self.create_for(interest, prefix, sched)
    }

    /// Creates an entry bound to `fib_prefix` without consulting the FIB,
    /// for Interests routed by 3N name.
    pub fn create_for(&mut self, interest: &Interest, fib_prefix: Name, sched: &mut dyn Scheduler) -> Result<PitEntryId> {
        let now = sched.now();
        if let Some(stale) = self.store.trie().find(interest.name.components()) {
            if self.store.get(stale).map_or(false, PitEntry::is_erased) {
                self.remove(stale);
            }
        }

        let lifetime = if self.max_lifetime.is_zero() {
            interest.lifetime
        } else {
            interest.lifetime.min(self.max_lifetime)
        };
        let mut entry = PitEntry::new(interest.name.clone(), fib_prefix, now, lifetime);
        entry.size = interest.serialized_size();
        let expire = entry.expire;

        let res = self.store.insert(interest.name.components(), entry, now);
        for (id, evicted) in res.evicted {
            debug!("PIT evicted {}", evicted.name());
            self.by_expiry.remove(&(evicted.expire, id));
        }
        let id = match (res.item, res.inserted) {
            (Some(id), true) => id,
            (Some(_), false) => {
                return Err(Error::Other(format!("PIT entry for {} already exists", interest.name)))
            }
            (None, _) => return Err(Error::Other(format!("PIT full, refusing {}", interest.name))),
        };
        self.by_expiry.insert((expire, id));
        self.metrics.pit_inserts.increment();
        self.metrics.pit_size.set(self.len() as u64);
        trace!("PIT entry created for {} until {:?}", interest.name, expire);
        self.reschedule(sched);
        Ok(id)
    }

    fn set_expire(&mut self, id: PitEntryId, expire: Time) {
        if let Some(entry) = self.store.get_mut(id) {
            self.by_expiry.remove(&(entry.expire, id));
            entry.expire = expire;
            self.by_expiry.insert((expire, id));
        }
    }

    /// Extends an entry's lifetime for a retransmitted or aggregated
    /// Interest.
    pub fn update_lifetime(&mut self, id: PitEntryId, offset: Duration, sched: &mut dyn Scheduler) {
        let now = sched.now();
        let max = self.max_lifetime;
        let Some(entry) = self.store.get_mut(id) else {
            return;
        };
        let old = entry.expire;
        if entry.update_lifetime(now, offset, max) {
            let new = entry.expire;
            self.by_expiry.remove(&(old, id));
            self.by_expiry.insert((new, id));
            self.reschedule(sched);
        }
    }

    /// Marks a satisfied entry; it disappears after the pruning timeout.
    pub fn mark_erased(&mut self, id: PitEntryId, sched: &mut dyn Scheduler) {
        let expire = sched.now() + self.pruning_timeout;
        match self.store.get_mut(id) {
            Some(entry) => {
                entry.erased = true;
                entry.clear_incoming();
            }
            None => return,
        }
        self.set_expire(id, expire);
        self.reschedule(sched);
    }

    fn remove(&mut self, id: PitEntryId) -> Option<PitEntry> {
        let entry = self.store.erase(id)?;
        self.by_expiry.remove(&(entry.expire, id));
        self.metrics.pit_size.set(self.len() as u64);
        Some(entry)
    }

    /// Removes an entry right away.
    pub fn erase(&mut self, id: PitEntryId, sched: &mut dyn Scheduler) -> Option<PitEntry> {
        let entry = self.remove(id);
        self.reschedule(sched);
        entry
    }

    /// Purges entries whose time ran out. Returns the names of Interests that
    /// timed out (not those that were already satisfied).
    pub fn clean_expired(&mut self, sched: &mut dyn Scheduler) -> Vec<Name> {
        self.cleanup.fired();
        let now = sched.now();
        let mut timed_out = Vec::new();
        while let Some((at, id)) = self.by_expiry.first().copied() {
            if at > now {
                break;
            }
            self.by_expiry.remove(&(at, id));
            if let Some(entry) = self.remove(id) {
                if !entry.is_erased() {
                    debug!("PIT entry for {} timed out", entry.name());
                    self.metrics.pit_expirations.increment();
                    self.metrics.interests_timed_out.increment();
                    self.tracer.emit(
                        now,
                        TraceEvent::TimedOutInterest {
                            name: entry.name().clone(),
                        },
                    );
                    timed_out.push(entry.name().clone());
                }
            }
        }
        self.reschedule(sched);
        timed_out
    }

    /// Arms the cleanup timer for the earliest expiry.
    pub fn reschedule(&mut self, sched: &mut dyn Scheduler) {
        let next = self.by_expiry.first().map(|(at, _)| *at);
        self.cleanup.rearm(sched, next, EventKind::PitCleanup);
    }

    /// Forgets `face` in every entry. Entries left without requesters are
    /// dropped.
    pub fn remove_face_references(&mut self, face: FaceId, sched: &mut dyn Scheduler) {
        let ids: Vec<_> = self.store.trie().iter().map(|(id, _)| id).collect();
        for id in ids {
            let orphan = match self.store.get_mut(id) {
                Some(entry) => {
                    entry.remove_incoming(face);
                    entry.remove_outgoing(face);
                    entry.incoming().is_empty() && !entry.is_erased()
                }
                None => false,
            };
            if orphan {
                self.remove(id);
            }
        }
        self.reschedule(sched);
    }

    pub fn iter(&self) -> impl Iterator<Item = (PitEntryId, &PitEntry)> + '_ {
        self.store.trie().iter()
    }

    pub fn print(&self) -> String {
        let mut out = String::new();
        for (_, entry) in self.iter() {
            let _ = writeln!(out, "{}", entry);
        }
        out
    }

    /// Reports a satisfied Interest to tracers and counters.
    pub(crate) fn note_satisfied(&self, name: &Name, now: Time) {
        self.metrics.interests_satisfied.increment();
        self.tracer.emit(now, TraceEvent::SatisfiedInterest { name: name.clone() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Persistent;
    use crate::scheduler::EventQueue;
    use nnnsim_common::NodeId;

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    fn pit() -> (Pit, Tracer) {
        let tracer = Tracer::new(NodeId(0));
        let pit = Pit::new(
            Box::new(Persistent::new(0)),
            Duration::from_millis(100),
            Duration::from_secs(2),
            tracer.clone(),
            Arc::new(NodeMetrics::new()),
        );
        (pit, tracer)
    }

    fn fib() -> Fib {
        let mut fib = Fib::new();
        fib.add(&name("/a"), FaceId(9), 0);
        fib
    }

    #[test]
    fn create_requires_a_route() {
        let (mut pit, _) = pit();
        let mut q = EventQueue::new();
        let mut sched = q.for_node(NodeId(0));
        let err = pit.create(&Interest::new(name("/z")), &fib(), &mut sched);
        assert!(matches!(err, Err(Error::NoFaces(_))));
        assert!(pit.is_empty());
    }

    #[test]
    fn two_faces_aggregate_into_one_entry() {
        let (mut pit, _) = pit();
        let mut q = EventQueue::new();
        let mut sched = q.for_node(NodeId(0));
        let interest = Interest::new(name("/a/b"));

        let id = pit.create(&interest, &fib(), &mut sched).unwrap();
        pit.get_mut(id).unwrap().add_incoming(FaceId(1), None, sched.now());
        let again = pit.lookup(&name("/a/b")).unwrap();
        assert_eq!(again, id);
        pit.get_mut(again).unwrap().add_incoming(FaceId(2), None, sched.now());

        assert_eq!(pit.len(), 1);
        assert_eq!(pit.get(id).unwrap().incoming().len(), 2);
        assert_eq!(pit.get(id).unwrap().fib_prefix(), &name("/a"));
        assert_eq!(pit.lookup_data(&name("/a/b/v1")), Some(id));
    }

    #[test]
    fn lifetime_is_capped_and_timeouts_are_traced() {
        let (mut pit, tracer) = pit();
        let events = tracer.collect();
        let mut q = EventQueue::new();
        {
            let mut sched = q.for_node(NodeId(0));
            let interest = Interest::new(name("/a/b")).with_lifetime(Duration::from_secs(4));
            let id = pit.create(&interest, &fib(), &mut sched).unwrap();
            assert_eq!(pit.get(id).unwrap().expire_time(), Duration::from_secs(2));
        }
        let ev = q.pop().unwrap();
        assert_eq!(ev.kind, EventKind::PitCleanup);
        assert_eq!(ev.time, Duration::from_secs(2));

        let mut sched = q.for_node(NodeId(0));
        assert_eq!(pit.clean_expired(&mut sched), vec![name("/a/b")]);
        assert!(pit.is_empty());
        assert_eq!(events.borrow()[0].event.label(), "TimedOutInterest");
    }

    #[test]
    fn satisfied_entries_linger_then_vanish_silently() {
        let (mut pit, tracer) = pit();
        let events = tracer.collect();
        let mut q = EventQueue::new();
        let id = {
            let mut sched = q.for_node(NodeId(0));
            let id = pit.create(&Interest::new(name("/a/b")), &fib(), &mut sched).unwrap();
            pit.mark_erased(id, &mut sched);
            id
        };
        assert!(pit.lookup(&name("/a/b")).is_none());
        assert_eq!(pit.lookup_data(&name("/a/b")), Some(id));

        let ev = q.pop().unwrap();
        assert_eq!(ev.time, Duration::from_millis(100));
        let mut sched = q.for_node(NodeId(0));
        assert!(pit.clean_expired(&mut sched).is_empty());
        assert!(pit.is_empty());
        assert!(events.borrow().is_empty());
        assert!(q.is_empty());
    }

    #[test]
    fn recreating_over_a_pruned_entry() {
        let (mut pit, _) = pit();
        let mut q = EventQueue::new();
        let mut sched = q.for_node(NodeId(0));
        let id = pit.create(&Interest::new(name("/a/b")), &fib(), &mut sched).unwrap();
        pit.mark_erased(id, &mut sched);
        let fresh = pit.create(&Interest::new(name("/a/b")), &fib(), &mut sched).unwrap();
        assert!(!pit.get(fresh).unwrap().is_erased());
        assert_eq!(pit.len(), 1);
    }

    #[test]
    fn removing_a_face_drops_orphans() {
        let (mut pit, _) = pit();
        let mut q = EventQueue::new();
        let mut sched = q.for_node(NodeId(0));
        let a = pit.create(&Interest::new(name("/a/1")), &fib(), &mut sched).unwrap();
        let b = pit.create(&Interest::new(name("/a/2")), &fib(), &mut sched).unwrap();
        pit.get_mut(a).unwrap().add_incoming(FaceId(1), None, sched.now());
        pit.get_mut(b).unwrap().add_incoming(FaceId(1), None, sched.now());
        pit.get_mut(b).unwrap().add_incoming(FaceId(2), None, sched.now());

        pit.remove_face_references(FaceId(1), &mut sched);
        assert_eq!(pit.len(), 1);
        assert!(pit.lookup(&name("/a/2")).is_some());
        assert!(pit.print().contains("/a/2"));
    }
}

//! Content Store.
//!
//! Cached Data live in a [`PolicedTrie`] keyed by name components. Lookups
//! follow ICN matching: the Interest name must prefix the Data name, and the
//! exact node wins over deeper ones. Hits hand out stripped copies.

use crate::config::ContentStoreConfig;
use crate::policy::{
    Freshness, LifetimeStats, Multi, PolicyParams, PolicyRegistry, Probability, ReplacementPolicy,
};
use crate::scheduler::{EventKind, Scheduler, TimerSlot};
use crate::trace::{TraceEvent, Tracer};
use crate::trie::{ItemId, PolicedTrie, PolicyPayload};
use log::{debug, trace};
use nnnsim_common::metrics::NodeMetrics;
use nnnsim_common::{Data, Interest, Name, NameComponent, Result, Time, WireFormat};
use std::fmt::{self, Write};
use std::sync::Arc;
use std::time::Duration;

/// A cached Data packet.
#[derive(Debug, Clone, PartialEq)]
pub struct CsEntry {
    pub data: Data,
    pub inserted: Time,
}

impl CsEntry {
    pub fn name(&self) -> &Name {
        &self.data.name
    }
}

impl PolicyPayload for CsEntry {
    fn freshness(&self) -> Option<Duration> {
        self.data.freshness_period()
    }

    fn wire_size(&self) -> usize {
        self.data.serialized_size()
    }
}

pub trait ContentStore: fmt::Debug {
    /// Finds cached Data matching `interest`. Returns a copy.
    fn lookup(&mut self, interest: &Interest, sched: &mut dyn Scheduler) -> Option<Data>;

    /// Caches `data`. `false` when the name is already cached or the policy
    /// refused it.
    fn add(&mut self, data: &Data, sched: &mut dyn Scheduler) -> bool;

    /// Handles a [`EventKind::ContentStoreCleanup`] event.
    fn on_cleanup(&mut self, _sched: &mut dyn Scheduler) {}

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn max_size(&self) -> usize;

    fn set_max_size(&mut self, max: usize);

    /// Cached entries in policy order.
    fn entries(&self) -> Vec<&CsEntry>;

    fn print(&self) -> String {
        let mut out = String::new();
        for entry in self.entries() {
            let _ = writeln!(out, "{}", entry.data.name);
        }
        out
    }
}

/// Builds the store described by `config`.
pub fn create_content_store(
    config: &ContentStoreConfig,
    registry: &PolicyRegistry,
    tracer: Tracer,
    metrics: Arc<NodeMetrics>,
) -> Result<Box<dyn ContentStore>> {
    config.validate()?;
    if config.is_disabled() {
        return Ok(Box::new(NoCache::new(tracer, metrics)));
    }
    Ok(Box::new(CsImpl::from_config(config, registry, tracer, metrics)?))
}

/* ---------------------------------------------------------------- *
 * Policy-backed store
 * ---------------------------------------------------------------- */

#[derive(Debug)]
pub struct CsImpl {
    store: PolicedTrie<NameComponent, CsEntry>,
    description: String,
    freshness: bool,
    stats: bool,
    cleanup: TimerSlot,
    tracer: Tracer,
    metrics: Arc<NodeMetrics>,
}

impl CsImpl {
    pub fn new(policy: Box<dyn ReplacementPolicy>, tracer: Tracer, metrics: Arc<NodeMetrics>) -> Self {
        let description = policy.name().to_string();
        Self {
            store: PolicedTrie::new(policy),
            description,
            freshness: false,
            stats: false,
            cleanup: TimerSlot::new(),
            tracer,
            metrics,
        }
    }

    pub fn from_config(
        config: &ContentStoreConfig,
        registry: &PolicyRegistry,
        tracer: Tracer,
        metrics: Arc<NodeMetrics>,
    ) -> Result<Self> {
        let base = registry.create(
            &config.policy,
            &PolicyParams {
                max_size: config.max_size,
                seed: config.seed,
            },
        )?;
        let mut description = base.name().to_string();

        let mut layers: Vec<Box<dyn ReplacementPolicy>> = Vec::new();
        if let Some(p) = config.cache_probability {
            layers.push(Box::new(Probability::new(p, config.seed.wrapping_add(1))));
            description.push_str("+Probability");
        }
        layers.push(base);
        if config.freshness {
            layers.push(Box::new(Freshness::new()));
            description.push_str("+Freshness");
        }
        if config.stats {
            layers.push(Box::new(LifetimeStats::new()));
            description.push_str("+Stats");
        }

        let policy: Box<dyn ReplacementPolicy> = if layers.len() == 1 {
            layers.remove(0)
        } else {
            let mut multi = Multi::new(layers);
            multi.set_max_size(config.max_size);
            Box::new(multi)
        };

        let mut cs = Self::new(policy, tracer, metrics);
        cs.description = description;
        cs.freshness = config.freshness;
        cs.stats = config.stats;
        Ok(cs)
    }

    pub fn with_freshness(mut self) -> Self {
        self.freshness = true;
        self
    }

    pub fn with_stats(mut self) -> Self {
        self.stats = true;
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Exact-name access without touching the policy.
    pub fn find_exact(&self, name: &Name) -> Option<&Data> {
        let id = self.store.trie().find(name.components())?;
        self.store.get(id).map(|e| &e.data)
    }

    fn remove(&mut self, id: ItemId, now: Time) {
        let dwell = self.store.policy().dwell_time(id, now);
        if let Some(entry) = self.store.erase(id) {
            if self.stats {
                let dwell = dwell.unwrap_or_else(|| now.saturating_sub(entry.inserted));
                self.tracer.emit(
                    now,
                    TraceEvent::WillRemoveEntry {
                        name: entry.data.name,
                        dwell,
                    },
                );
            }
            self.metrics.cs_evictions.increment();
        }
    }

    fn purge_expired(&mut self, now: Time) {
        if !self.freshness {
            return;
        }
        while let Some((at, id)) = self.store.policy().next_expiry() {
            if at > now {
                break;
            }
            trace!("CS entry {} expired at {:?}", id, at);
            self.remove(id, now);
        }
        self.metrics.cs_size.set(self.store.len() as u64);
    }

    fn reschedule_cleanup(&mut self, sched: &mut dyn Scheduler) {
        if !self.freshness {
            return;
        }
        let next = self.store.policy().next_expiry().map(|(at, _)| at);
        self.cleanup.rearm(sched, next, EventKind::ContentStoreCleanup);
    }
}

impl ContentStore for CsImpl {
    fn lookup(&mut self, interest: &Interest, sched: &mut dyn Scheduler) -> Option<Data> {
        let now = sched.now();
        self.purge_expired(now);

        let key = interest.name.components();
        let hit = match interest.exclude.as_ref().filter(|ex| !ex.is_empty()) {
            Some(exclude) => self
                .store
                .trie()
                .deepest_prefix_match_if_next_level(key, |c| !exclude.is_excluded(c)),
            None => self.store.trie().deepest_prefix_match(key),
        };

        match hit {
            Some(id) => {
                self.store.touch(id);
                let data = self.store.get(id)?.data.stripped();
                debug!("CS hit for {} -> {}", interest.name, data.name);
                self.metrics.cs_hits.increment();
                self.tracer.emit(
                    now,
                    TraceEvent::CacheHit {
                        name: interest.name.clone(),
                    },
                );
                Some(data)
            }
            None => {
                trace!("CS miss for {}", interest.name);
                self.metrics.cs_misses.increment();
                self.tracer.emit(
                    now,
                    TraceEvent::CacheMiss {
                        name: interest.name.clone(),
                    },
                );
                None
            }
        }
    }

    fn add(&mut self, data: &Data, sched: &mut dyn Scheduler) -> bool {
        let now = sched.now();
        let entry = CsEntry {
            data: data.stripped(),
            inserted: now,
        };
        let res = self.store.insert(data.name.components(), entry, now);

        for (_, evicted) in res.evicted {
            self.metrics.cs_evictions.increment();
            if self.stats {
                self.tracer.emit(
                    now,
                    TraceEvent::WillRemoveEntry {
                        dwell: now.saturating_sub(evicted.inserted),
                        name: evicted.data.name,
                    },
                );
            }
        }

        if res.inserted {
            debug!("CS cached {}", data.name);
            self.metrics.cs_inserts.increment();
            self.tracer.emit(
                now,
                TraceEvent::DidAddEntry {
                    name: data.name.clone(),
                },
            );
            self.reschedule_cleanup(sched);
        }
        self.metrics.cs_size.set(self.store.len() as u64);
        res.inserted
    }

    fn on_cleanup(&mut self, sched: &mut dyn Scheduler) {
        self.cleanup.fired();
        self.purge_expired(sched.now());
        self.reschedule_cleanup(sched);
    }

    fn len(&self) -> usize {
        self.store.len()
    }

    fn max_size(&self) -> usize {
        self.store.max_size()
    }

    fn set_max_size(&mut self, max: usize) {
        self.store.set_max_size(max);
    }

    fn entries(&self) -> Vec<&CsEntry> {
        self.store
            .items()
            .into_iter()
            .filter_map(|id| self.store.get(id))
            .collect()
    }
}

/* ---------------------------------------------------------------- *
 * Disabled store
 * ---------------------------------------------------------------- */

/// Caches nothing. Every lookup misses.
#[derive(Debug)]
pub struct NoCache {
    tracer: Tracer,
    metrics: Arc<NodeMetrics>,
}

impl NoCache {
    pub fn new(tracer: Tracer, metrics: Arc<NodeMetrics>) -> Self {
        Self { tracer, metrics }
    }
}

impl ContentStore for NoCache {
    fn lookup(&mut self, interest: &Interest, sched: &mut dyn Scheduler) -> Option<Data> {
        self.metrics.cs_misses.increment();
        self.tracer.emit(
            sched.now(),
            TraceEvent::CacheMiss {
                name: interest.name.clone(),
            },
        );
        None
    }

    fn add(&mut self, _data: &Data, _sched: &mut dyn Scheduler) -> bool {
        false
    }

    fn len(&self) -> usize {
        0
    }

    fn max_size(&self) -> usize {
        0
    }

    fn set_max_size(&mut self, _max: usize) {}

    fn entries(&self) -> Vec<&CsEntry> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::EventQueue;
    use nnnsim_common::{Exclude, NodeId};

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    fn store(config: ContentStoreConfig) -> (Box<dyn ContentStore>, Tracer) {
        let tracer = Tracer::new(NodeId(0));
        let cs = create_content_store(
            &config,
            &PolicyRegistry::new(),
            tracer.clone(),
            Arc::new(NodeMetrics::new()),
        )
        .unwrap();
        (cs, tracer)
    }

    #[test]
    fn hit_returns_an_unaliased_copy() {
        let (mut cs, tracer) = store(ContentStoreConfig::default());
        let events = tracer.collect();
        let mut q = EventQueue::new();
        let mut sched = q.for_node(NodeId(0));

        let data = Data::new(name("/a/b"), &b"payload"[..]);
        assert!(cs.add(&data, &mut sched));
        assert!(!cs.add(&data, &mut sched));

        let mut copy = cs.lookup(&Interest::new(name("/a/b")), &mut sched).unwrap();
        assert_eq!(copy.payload, data.payload);
        copy.payload = bytes::Bytes::from_static(b"mutated");
        copy.tags.hop_count = Some(9);

        let again = cs.lookup(&Interest::new(name("/a/b")), &mut sched).unwrap();
        assert_eq!(&again.payload[..], b"payload");
        assert_eq!(again.tags.hop_count, None);

        assert!(cs.lookup(&Interest::new(name("/a/c")), &mut sched).is_none());
        let labels: Vec<_> = events.borrow().iter().map(|r| r.event.label()).collect();
        assert_eq!(labels, vec!["DidAddEntry", "CacheHit", "CacheHit", "CacheMiss"]);
    }

    #[test]
    fn interest_prefix_matches_longer_data() {
        let (mut cs, _) = store(ContentStoreConfig::default());
        let mut q = EventQueue::new();
        let mut sched = q.for_node(NodeId(0));
        cs.add(&Data::new(name("/video/seg/1"), &b"1"[..]), &mut sched);
        cs.add(&Data::new(name("/video/seg/2"), &b"2"[..]), &mut sched);

        let hit = cs.lookup(&Interest::new(name("/video/seg")), &mut sched).unwrap();
        assert_eq!(hit.name, name("/video/seg/1"));

        let mut exclude = Exclude::new();
        exclude.exclude_one(NameComponent::from("1"));
        let hit = cs
            .lookup(&Interest::new(name("/video/seg")).with_exclude(exclude), &mut sched)
            .unwrap();
        assert_eq!(hit.name, name("/video/seg/2"));
    }

    #[test]
    fn lru_capacity_is_enforced() {
        let config = ContentStoreConfig {
            max_size: 2,
            ..Default::default()
        };
        let (mut cs, _) = store(config);
        let mut q = EventQueue::new();
        let mut sched = q.for_node(NodeId(0));
        for n in ["/a", "/b"] {
            cs.add(&Data::new(name(n), &b""[..]), &mut sched);
        }
        cs.lookup(&Interest::new(name("/a")), &mut sched);
        cs.add(&Data::new(name("/c"), &b""[..]), &mut sched);

        assert_eq!(cs.len(), 2);
        assert!(cs.lookup(&Interest::new(name("/b")), &mut sched).is_none());
        assert!(cs.lookup(&Interest::new(name("/a")), &mut sched).is_some());
    }

    #[test]
    fn freshness_expires_entries() {
        let config = ContentStoreConfig {
            freshness: true,
            stats: true,
            ..Default::default()
        };
        let (mut cs, tracer) = store(config);
        let events = tracer.collect();
        let mut q = EventQueue::new();
        {
            let mut sched = q.for_node(NodeId(0));
            let data = Data::new(name("/f"), &b""[..]).with_freshness(Duration::from_secs(1));
            cs.add(&data, &mut sched);
        }
        assert_eq!(q.len(), 1);

        q.advance_to(Duration::from_millis(999));
        {
            let mut sched = q.for_node(NodeId(0));
            assert!(cs.lookup(&Interest::new(name("/f")), &mut sched).is_some());
        }

        let ev = q.pop().unwrap();
        assert_eq!(ev.kind, EventKind::ContentStoreCleanup);
        assert_eq!(ev.time, Duration::from_secs(1));
        let mut sched = q.for_node(NodeId(0));
        cs.on_cleanup(&mut sched);
        cs.on_cleanup(&mut sched);
        assert!(cs.lookup(&Interest::new(name("/f")), &mut sched).is_none());
        assert!(cs.is_empty());

        let removed: Vec<_> = events
            .borrow()
            .iter()
            .filter_map(|r| match &r.event {
                TraceEvent::WillRemoveEntry { dwell, .. } => Some(*dwell),
                _ => None,
            })
            .collect();
        assert_eq!(removed, vec![Duration::from_secs(1)]);
    }

    #[test]
    fn no_cache_never_stores() {
        let config = ContentStoreConfig {
            policy: "None".into(),
            ..Default::default()
        };
        let (mut cs, _) = store(config);
        let mut q = EventQueue::new();
        let mut sched = q.for_node(NodeId(0));
        assert!(!cs.add(&Data::new(name("/a"), &b""[..]), &mut sched));
        assert!(cs.lookup(&Interest::new(name("/a")), &mut sched).is_none());
    }

    #[test]
    fn probability_zero_caches_nothing() {
        let config = ContentStoreConfig {
            cache_probability: Some(0.0),
            ..Default::default()
        };
        let (mut cs, _) = store(config);
        let mut q = EventQueue::new();
        let mut sched = q.for_node(NodeId(0));
        assert!(!cs.add(&Data::new(name("/a"), &b""[..]), &mut sched));
        assert!(cs.is_empty());
    }
}

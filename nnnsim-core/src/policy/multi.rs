use super::{Admission, ItemMeta, ReplacementPolicy};
use crate::trie::ItemId;
use nnnsim_common::Time;
use std::time::Duration;

/// Runs several policies over the same items.
///
/// An item is admitted only if every policy admits it. Admission is settled
/// before any policy makes room, so a refused item evicts nothing.
/// Evictions of any policy are applied to all of them. Size queries answer for the first policy.
#[derive(Debug)]
pub struct Multi {
    policies: Vec<Box<dyn ReplacementPolicy>>,
}

impl Multi {
    pub fn new(policies: Vec<Box<dyn ReplacementPolicy>>) -> Self {
        Self { policies }
    }

    pub fn push(&mut self, policy: Box<dyn ReplacementPolicy>) {
        self.policies.push(policy);
    }

    pub fn policies(&self) -> &[Box<dyn ReplacementPolicy>] {
        &self.policies
    }
}

impl ReplacementPolicy for Multi {
    fn name(&self) -> &'static str {
        self.policies.first().map_or("Multi", |p| p.name())
    }

    fn admits(&mut self, meta: &ItemMeta) -> bool {
        self.policies.iter_mut().all(|p| p.admits(meta))
    }

    fn insert(&mut self, id: ItemId, meta: &ItemMeta) -> Admission {
        if !self.admits(meta) {
            return Admission::refuse();
        }
        let mut evicted = Vec::new();
        let mut admitted = true;
        for policy in self.policies.iter_mut() {
            let adm = policy.insert(id, meta);
            evicted.extend(adm.evicted);
            admitted &= adm.admitted;
        }
        if !admitted {
            for policy in self.policies.iter_mut() {
                policy.erase(id);
            }
        }
        evicted.sort();
        evicted.dedup();
        for victim in &evicted {
            for policy in self.policies.iter_mut() {
                policy.erase(*victim);
            }
        }
        Admission { admitted, evicted }
    }

    fn lookup(&mut self, id: ItemId) {
        for policy in self.policies.iter_mut() {
            policy.lookup(id);
        }
    }

    fn erase(&mut self, id: ItemId) {
        for policy in self.policies.iter_mut() {
            policy.erase(id);
        }
    }

    fn clear(&mut self) {
        for policy in self.policies.iter_mut() {
            policy.clear();
        }
    }

    fn set_max_size(&mut self, max: usize) {
        for policy in self.policies.iter_mut() {
            policy.set_max_size(max);
        }
    }

    fn max_size(&self) -> usize {
        self.policies.first().map_or(0, |p| p.max_size())
    }

    fn len(&self) -> usize {
        self.policies.first().map_or(0, |p| p.len())
    }

    fn items(&self) -> Vec<ItemId> {
        self.policies.first().map(|p| p.items()).unwrap_or_default()
    }

    fn next_expiry(&self) -> Option<(Time, ItemId)> {
        self.policies.iter().filter_map(|p| p.next_expiry()).min()
    }

    fn dwell_time(&self, id: ItemId, now: Time) -> Option<Duration> {
        self.policies.iter().find_map(|p| p.dwell_time(id, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Freshness, LifetimeStats, Lru, Persistent};

    #[test]
    fn admission_is_unanimous_with_rollback() {
        let mut multi = Multi::new(vec![Box::new(Lru::new(10)), Box::new(Persistent::new(1))]);
        let meta = ItemMeta::at(Duration::ZERO);
        assert!(multi.insert(ItemId(1), &meta).admitted);
        assert!(!multi.insert(ItemId(2), &meta).admitted);
        assert_eq!(multi.len(), 1);
        assert_eq!(multi.items(), vec![ItemId(1)]);
    }

    #[test]
    fn refused_item_evicts_nothing() {
        let mut multi = Multi::new(vec![Box::new(Lru::new(1)), Box::new(Persistent::new(1))]);
        let meta = ItemMeta::at(Duration::ZERO);
        assert!(multi.insert(ItemId(1), &meta).admitted);

        let adm = multi.insert(ItemId(2), &meta);
        assert!(!adm.admitted);
        assert!(adm.evicted.is_empty());
        for policy in multi.policies() {
            assert_eq!(policy.items(), vec![ItemId(1)], "{}", policy.name());
        }
    }

    #[test]
    fn evictions_reach_every_policy() {
        let mut multi = Multi::new(vec![
            Box::new(Lru::new(1)),
            Box::new(Freshness::new()),
            Box::new(LifetimeStats::new()),
        ]);
        let fresh = ItemMeta {
            now: Duration::ZERO,
            freshness: Some(Duration::from_secs(1)),
            size: 1,
        };
        multi.insert(ItemId(1), &fresh);
        assert!(multi.next_expiry().is_some());
        assert!(multi.dwell_time(ItemId(1), Duration::from_secs(2)).is_some());

        let adm = multi.insert(ItemId(2), &ItemMeta::at(Duration::ZERO));
        assert_eq!(adm.evicted, vec![ItemId(1)]);
        assert_eq!(multi.next_expiry(), None);
        assert_eq!(multi.dwell_time(ItemId(1), Duration::from_secs(2)), None);
    }
}

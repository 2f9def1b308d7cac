use super::{Admission, ItemMeta, ReplacementPolicy};
use crate::trie::ItemId;
use nnnsim_common::Time;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Counts admitted items; capacity is advisory.
#[derive(Debug, Clone, Default)]
pub struct Counting {
    items: BTreeMap<ItemId, ()>,
    max_size: usize,
}

impl Counting {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplacementPolicy for Counting {
    fn name(&self) -> &'static str {
        "Counting"
    }

    fn insert(&mut self, id: ItemId, _meta: &ItemMeta) -> Admission {
        self.items.insert(id, ());
        Admission::admit()
    }

    fn lookup(&mut self, _id: ItemId) {}

    fn erase(&mut self, id: ItemId) {
        self.items.remove(&id);
    }

    fn clear(&mut self) {
        self.items.clear();
    }

    fn set_max_size(&mut self, max: usize) {
        self.max_size = max;
    }

    fn max_size(&self) -> usize {
        self.max_size
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn items(&self) -> Vec<ItemId> {
        self.items.keys().copied().collect()
    }
}

/// Records when each item was admitted so removal can report dwell time.
#[derive(Debug, Clone, Default)]
pub struct LifetimeStats {
    inserted: HashMap<ItemId, Time>,
    max_size: usize,
}

impl LifetimeStats {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplacementPolicy for LifetimeStats {
    fn name(&self) -> &'static str {
        "LifetimeStats"
    }

    fn insert(&mut self, id: ItemId, meta: &ItemMeta) -> Admission {
        self.inserted.insert(id, meta.now);
        Admission::admit()
    }

    fn lookup(&mut self, _id: ItemId) {}

    fn erase(&mut self, id: ItemId) {
        self.inserted.remove(&id);
    }

    fn clear(&mut self) {
        self.inserted.clear();
    }

    fn set_max_size(&mut self, max: usize) {
        self.max_size = max;
    }

    fn max_size(&self) -> usize {
        self.max_size
    }

    fn len(&self) -> usize {
        self.inserted.len()
    }

    fn items(&self) -> Vec<ItemId> {
        let mut items: Vec<_> = self.inserted.iter().map(|(id, at)| (*at, *id)).collect();
        items.sort();
        items.into_iter().map(|(_, id)| id).collect()
    }

    fn dwell_time(&self, id: ItemId, now: Time) -> Option<Duration> {
        self.inserted.get(&id).map(|at| now.saturating_sub(*at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dwell_time_is_measured_from_admission() {
        let mut stats = LifetimeStats::new();
        stats.insert(ItemId(1), &ItemMeta::at(Duration::from_millis(250)));
        assert_eq!(
            stats.dwell_time(ItemId(1), Duration::from_secs(1)),
            Some(Duration::from_millis(750))
        );
        stats.erase(ItemId(1));
        assert_eq!(stats.dwell_time(ItemId(1), Duration::from_secs(1)), None);
    }

    #[test]
    fn counting_never_refuses() {
        let mut c = Counting::new();
        c.set_max_size(1);
        for i in 0..3 {
            assert!(c.insert(ItemId(i), &ItemMeta::at(Duration::ZERO)).admitted);
        }
        assert_eq!(c.len(), 3);
    }
}

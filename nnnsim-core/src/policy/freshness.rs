use super::{Admission, ItemMeta, ReplacementPolicy};
use crate::trie::ItemId;
use nnnsim_common::Time;
use std::collections::{BTreeSet, HashMap};

/// Indexes items by absolute expiry. Items without a freshness period are
/// admitted but never expire. Capacity is not enforced here.
#[derive(Debug, Clone, Default)]
pub struct Freshness {
    expiries: BTreeSet<(Time, ItemId)>,
    index: HashMap<ItemId, Time>,
    max_size: usize,
}

impl Freshness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Items whose expiry is at or before `now`, earliest first.
    pub fn expired(&self, now: Time) -> Vec<ItemId> {
        self.expiries
            .iter()
            .take_while(|(at, _)| *at <= now)
            .map(|(_, id)| *id)
            .collect()
    }
}

impl ReplacementPolicy for Freshness {
    fn name(&self) -> &'static str {
        "Freshness"
    }

    fn insert(&mut self, id: ItemId, meta: &ItemMeta) -> Admission {
        self.erase(id);
        if let Some(fresh) = meta.freshness.filter(|f| !f.is_zero()) {
            let at = meta.now + fresh;
            self.expiries.insert((at, id));
            self.index.insert(id, at);
        }
        Admission::admit()
    }

    fn lookup(&mut self, _id: ItemId) {}

    fn erase(&mut self, id: ItemId) {
        if let Some(at) = self.index.remove(&id) {
            self.expiries.remove(&(at, id));
        }
    }

    fn clear(&mut self) {
        self.expiries.clear();
        self.index.clear();
    }

    fn set_max_size(&mut self, max: usize) {
        self.max_size = max;
    }

    fn max_size(&self) -> usize {
        self.max_size
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn items(&self) -> Vec<ItemId> {
        self.expiries.iter().map(|(_, id)| *id).collect()
    }

    fn next_expiry(&self) -> Option<(Time, ItemId)> {
        self.expiries.first().copied()
    }
}

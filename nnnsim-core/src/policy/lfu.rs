use super::{Admission, ItemMeta, ReplacementPolicy};
use crate::trie::ItemId;
use std::collections::{BTreeSet, HashMap};

/// Least frequently used. Ties go to the oldest item.
#[derive(Debug, Clone)]
pub struct Lfu {
    order: BTreeSet<(u64, u64, ItemId)>,
    index: HashMap<ItemId, (u64, u64)>,
    next: u64,
    max_size: usize,
}

impl Lfu {
    pub fn new(max_size: usize) -> Self {
        Self {
            order: BTreeSet::new(),
            index: HashMap::new(),
            next: 0,
            max_size,
        }
    }

    /// Access count recorded for `id`.
    pub fn hits(&self, id: ItemId) -> Option<u64> {
        self.index.get(&id).map(|(hits, _)| *hits)
    }
}

impl ReplacementPolicy for Lfu {
    fn name(&self) -> &'static str {
        "Lfu"
    }

    fn insert(&mut self, id: ItemId, _meta: &ItemMeta) -> Admission {
        let mut evicted = Vec::new();
        if self.max_size != 0 && self.index.len() >= self.max_size {
            if let Some((_, _, victim)) = self.order.pop_first() {
                self.index.remove(&victim);
                evicted.push(victim);
            }
        }
        self.erase(id);
        let seq = self.next;
        self.next += 1;
        self.order.insert((0, seq, id));
        self.index.insert(id, (0, seq));
        Admission::evicting(evicted)
    }

    fn lookup(&mut self, id: ItemId) {
        if let Some((hits, seq)) = self.index.get_mut(&id) {
            self.order.remove(&(*hits, *seq, id));
            *hits += 1;
            self.order.insert((*hits, *seq, id));
        }
    }

    fn erase(&mut self, id: ItemId) {
        if let Some((hits, seq)) = self.index.remove(&id) {
            self.order.remove(&(hits, seq, id));
        }
    }

    fn clear(&mut self) {
        self.order.clear();
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
        self.order.iter().map(|(_, _, id)| *id).collect()
    }
}

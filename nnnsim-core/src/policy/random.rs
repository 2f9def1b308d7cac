use super::{Admission, ItemMeta, ReplacementPolicy};
use crate::trie::ItemId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Evicts a uniformly chosen item on overflow.
#[derive(Debug, Clone)]
pub struct Random {
    items: Vec<ItemId>,
    index: HashMap<ItemId, usize>,
    max_size: usize,
    rng: StdRng,
}

impl Random {
    pub fn new(max_size: usize, seed: u64) -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
            max_size,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn remove_at(&mut self, pos: usize) -> ItemId {
        let id = self.items.swap_remove(pos);
        self.index.remove(&id);
        if let Some(moved) = self.items.get(pos) {
            self.index.insert(*moved, pos);
        }
        id
    }
}

impl ReplacementPolicy for Random {
    fn name(&self) -> &'static str {
        "Random"
    }

    fn insert(&mut self, id: ItemId, _meta: &ItemMeta) -> Admission {
        let mut evicted = Vec::new();
        if self.max_size != 0 && self.items.len() >= self.max_size && !self.items.is_empty() {
            let pos = self.rng.gen_range(0..self.items.len());
            evicted.push(self.remove_at(pos));
        }
        self.index.insert(id, self.items.len());
        self.items.push(id);
        Admission::evicting(evicted)
    }

    fn lookup(&mut self, _id: ItemId) {}

    fn erase(&mut self, id: ItemId) {
        if let Some(pos) = self.index.get(&id).copied() {
            self.remove_at(pos);
        }
    }

    fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
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
        self.items.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn stays_within_capacity() {
        let mut r = Random::new(3, 7);
        let meta = ItemMeta::at(Duration::ZERO);
        let mut evicted = 0;
        for i in 0..10 {
            let adm = r.insert(ItemId(i), &meta);
            assert!(adm.admitted);
            evicted += adm.evicted.len();
        }
        assert_eq!(r.len(), 3);
        assert_eq!(evicted, 7);
        for id in r.items() {
            r.erase(id);
        }
        assert!(r.is_empty());
    }
}

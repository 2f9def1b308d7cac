use super::{Admission, ItemMeta, ReplacementPolicy};
use crate::trie::ItemId;
use std::collections::{BTreeMap, HashMap};

/// Items in arrival order; the front is the oldest.
#[derive(Debug, Default, Clone)]
struct SeqQueue {
    order: BTreeMap<u64, ItemId>,
    index: HashMap<ItemId, u64>,
    next: u64,
}

impl SeqQueue {
    fn push_back(&mut self, id: ItemId) {
        self.remove(id);
        let seq = self.next;
        self.next += 1;
        self.order.insert(seq, id);
        self.index.insert(id, seq);
    }

    fn pop_front(&mut self) -> Option<ItemId> {
        let (_, id) = self.order.pop_first()?;
        self.index.remove(&id);
        Some(id)
    }

    fn remove(&mut self, id: ItemId) -> bool {
        match self.index.remove(&id) {
            Some(seq) => {
                self.order.remove(&seq);
                true
            }
            None => false,
        }
    }

    fn contains(&self, id: ItemId) -> bool {
        self.index.contains_key(&id)
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn items(&self) -> Vec<ItemId> {
        self.order.values().copied().collect()
    }

    fn clear(&mut self) {
        self.order.clear();
        self.index.clear();
    }
}

/// Least recently used. A full store evicts the front before appending.
#[derive(Debug, Clone)]
pub struct Lru {
    queue: SeqQueue,
    max_size: usize,
}

impl Lru {
    pub fn new(max_size: usize) -> Self {
        Self {
            queue: SeqQueue::default(),
            max_size,
        }
    }
}

impl ReplacementPolicy for Lru {
    fn name(&self) -> &'static str {
        "Lru"
    }

    fn insert(&mut self, id: ItemId, _meta: &ItemMeta) -> Admission {
        let mut evicted = Vec::new();
        if self.max_size != 0 && self.queue.len() >= self.max_size {
            evicted.extend(self.queue.pop_front());
        }
        self.queue.push_back(id);
        Admission::evicting(evicted)
    }

    fn lookup(&mut self, id: ItemId) {
        if self.queue.contains(id) {
            self.queue.push_back(id);
        }
    }

    fn erase(&mut self, id: ItemId) {
        self.queue.remove(id);
    }

    fn clear(&mut self) {
        self.queue.clear();
    }

    fn set_max_size(&mut self, max: usize) {
        self.max_size = max;
    }

    fn max_size(&self) -> usize {
        self.max_size
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn items(&self) -> Vec<ItemId> {
        self.queue.items()
    }
}

/// First in, first out: like [`Lru`] without promotion on access.
#[derive(Debug, Clone)]
pub struct Fifo {
    queue: SeqQueue,
    max_size: usize,
}

impl Fifo {
    pub fn new(max_size: usize) -> Self {
        Self {
            queue: SeqQueue::default(),
            max_size,
        }
    }
}

impl ReplacementPolicy for Fifo {
    fn name(&self) -> &'static str {
        "Fifo"
    }

    fn insert(&mut self, id: ItemId, _meta: &ItemMeta) -> Admission {
        let mut evicted = Vec::new();
        if self.max_size != 0 && self.queue.len() >= self.max_size {
            evicted.extend(self.queue.pop_front());
        }
        self.queue.push_back(id);
        Admission::evicting(evicted)
    }

    fn lookup(&mut self, _id: ItemId) {}

    fn erase(&mut self, id: ItemId) {
        self.queue.remove(id);
    }

    fn clear(&mut self) {
        self.queue.clear();
    }

    fn set_max_size(&mut self, max: usize) {
        self.max_size = max;
    }

    fn max_size(&self) -> usize {
        self.max_size
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn items(&self) -> Vec<ItemId> {
        self.queue.items()
    }
}

/// Never evicts; refuses new items once full.
#[derive(Debug, Clone)]
pub struct Persistent {
    queue: SeqQueue,
    max_size: usize,
}

impl Persistent {
    pub fn new(max_size: usize) -> Self {
        Self {
            queue: SeqQueue::default(),
            max_size,
        }
    }
}

impl ReplacementPolicy for Persistent {
    fn name(&self) -> &'static str {
        "Persistent"
    }

    fn admits(&mut self, _meta: &ItemMeta) -> bool {
        self.max_size == 0 || self.queue.len() < self.max_size
    }

    fn insert(&mut self, id: ItemId, meta: &ItemMeta) -> Admission {
        if !self.admits(meta) {
            return Admission::refuse();
        }
        self.queue.push_back(id);
        Admission::admit()
    }

    fn lookup(&mut self, _id: ItemId) {}

    fn erase(&mut self, id: ItemId) {
        self.queue.remove(id);
    }

    fn clear(&mut self) {
        self.queue.clear();
    }

    fn set_max_size(&mut self, max: usize) {
        self.max_size = max;
    }

    fn max_size(&self) -> usize {
        self.max_size
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn items(&self) -> Vec<ItemId> {
        self.queue.items()
    }
}

/// Capacity counted in bytes. Evicts the oldest items until the newcomer
/// fits; an item larger than the whole capacity is refused.
#[derive(Debug, Clone)]
pub struct SerializedSize {
    queue: SeqQueue,
    sizes: HashMap<ItemId, usize>,
    total: usize,
    max_size: usize,
}

impl SerializedSize {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            queue: SeqQueue::default(),
            sizes: HashMap::new(),
            total: 0,
            max_size: max_bytes,
        }
    }

    /// Bytes currently accounted.
    pub fn total(&self) -> usize {
        self.total
    }

    fn forget(&mut self, id: ItemId) {
        if let Some(size) = self.sizes.remove(&id) {
            self.total -= size;
        }
    }
}

impl ReplacementPolicy for SerializedSize {
    fn name(&self) -> &'static str {
        "SerializedSize"
    }

    fn admits(&mut self, meta: &ItemMeta) -> bool {
        self.max_size == 0 || meta.size <= self.max_size
    }

    fn insert(&mut self, id: ItemId, meta: &ItemMeta) -> Admission {
        if !self.admits(meta) {
            return Admission::refuse();
        }
        let mut evicted = Vec::new();
        while self.max_size != 0 && self.total + meta.size > self.max_size {
            let Some(victim) = self.queue.pop_front() else {
                break;
            };
            self.forget(victim);
            evicted.push(victim);
        }
        self.queue.push_back(id);
        self.sizes.insert(id, meta.size);
        self.total += meta.size;
        Admission::evicting(evicted)
    }

    fn lookup(&mut self, id: ItemId) {
        if self.queue.contains(id) {
            self.queue.push_back(id);
        }
    }

    fn erase(&mut self, id: ItemId) {
        self.queue.remove(id);
        self.forget(id);
    }

    fn clear(&mut self) {
        self.queue.clear();
        self.sizes.clear();
        self.total = 0;
    }

    fn set_max_size(&mut self, max: usize) {
        self.max_size = max;
    }

    fn max_size(&self) -> usize {
        self.max_size
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn items(&self) -> Vec<ItemId> {
        self.queue.items()
    }
}

use super::{Admission, ItemMeta, ReplacementPolicy};
use crate::trie::ItemId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

/// Admits each item with probability `p`.
#[derive(Debug, Clone)]
pub struct Probability {
    items: HashSet<ItemId>,
    probability: f64,
    max_size: usize,
    rng: StdRng,
    /// Outcome of the last `admits` draw, consumed by the next insert
    pending: Option<bool>,
}

impl Probability {
    pub fn new(probability: f64, seed: u64) -> Self {
        Self {
            items: HashSet::new(),
            probability: probability.clamp(0.0, 1.0),
            max_size: 0,
            rng: StdRng::seed_from_u64(seed),
            pending: None,
        }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn set_probability(&mut self, probability: f64) {
        self.probability = probability.clamp(0.0, 1.0);
    }
}

impl ReplacementPolicy for Probability {
    fn name(&self) -> &'static str {
        "Probability"
    }

    fn admits(&mut self, _meta: &ItemMeta) -> bool {
        let admitted = self.rng.gen::<f64>() < self.probability;
        self.pending = Some(admitted);
        admitted
    }

    fn insert(&mut self, id: ItemId, _meta: &ItemMeta) -> Admission {
        let admitted = match self.pending.take() {
            Some(admitted) => admitted,
            None => self.rng.gen::<f64>() < self.probability,
        };
        if admitted {
            self.items.insert(id);
            Admission::admit()
        } else {
            Admission::refuse()
        }
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
        let mut items: Vec<_> = self.items.iter().copied().collect();
        items.sort();
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn extremes_are_deterministic() {
        let meta = ItemMeta::at(Duration::ZERO);
        let mut never = Probability::new(0.0, 1);
        let mut always = Probability::new(1.0, 1);
        for i in 0..50 {
            assert!(!never.insert(ItemId(i), &meta).admitted);
            assert!(always.insert(ItemId(i), &meta).admitted);
        }
        assert!(never.is_empty());
        assert_eq!(always.len(), 50);
    }

    #[test]
    fn admits_roughly_p() {
        let meta = ItemMeta::at(Duration::ZERO);
        let mut half = Probability::new(0.5, 42);
        let admitted = (0..1000)
            .filter(|i| half.insert(ItemId(*i), &meta).admitted)
            .count();
        assert!((400..600).contains(&admitted), "admitted {}", admitted);
    }
}

use super::{Counting, Fifo, Lfu, Lru, Persistent, Random, ReplacementPolicy, SerializedSize};
use nnnsim_common::{Error, Result};
use std::collections::BTreeMap;

/// Arguments handed to a policy factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyParams {
    pub max_size: usize,
    pub seed: u64,
}

type Factory = fn(&PolicyParams) -> Box<dyn ReplacementPolicy>;

/// Maps policy names to constructors. Built once at start-up.
#[derive(Debug, Clone)]
pub struct PolicyRegistry {
    factories: BTreeMap<&'static str, Factory>,
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("Lru", |p| Box::new(Lru::new(p.max_size)));
        registry.register("Fifo", |p| Box::new(Fifo::new(p.max_size)));
        registry.register("Random", |p| Box::new(Random::new(p.max_size, p.seed)));
        registry.register("Lfu", |p| Box::new(Lfu::new(p.max_size)));
        registry.register("Persistent", |p| Box::new(Persistent::new(p.max_size)));
        registry.register("SerializedSize", |p| Box::new(SerializedSize::new(p.max_size)));
        registry.register("Counting", |p| {
            let mut c = Counting::new();
            c.set_max_size(p.max_size);
            Box::new(c)
        });
        registry
    }
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, name: &'static str, factory: Factory) {
        self.factories.insert(name, factory);
    }

    /// Builds a policy by name, ignoring ASCII case.
    pub fn create(&self, name: &str, params: &PolicyParams) -> Result<Box<dyn ReplacementPolicy>> {
        self.factories
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, f)| f(params))
            .ok_or_else(|| Error::UnknownPolicy(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.keys().any(|k| k.eq_ignore_ascii_case(name))
    }
}

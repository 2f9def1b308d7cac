//! Replacement policies.
//!
//! A policy tracks [`ItemId`]s of a [`PolicedTrie`](crate::trie::PolicedTrie)
//! in its own order and decides admission and eviction. Policies never fail:
//! a refused insert means "not cached".

mod freshness;
mod lfu;
mod lru;
mod multi;
mod probability;
mod random;
mod registry;
mod stats;

pub use freshness::Freshness;
pub use lfu::Lfu;
pub use lru::{Fifo, Lru, Persistent, SerializedSize};
pub use multi::Multi;
pub use probability::Probability;
pub use random::Random;
pub use registry::{PolicyParams, PolicyRegistry};
pub use stats::{Counting, LifetimeStats};

use crate::trie::ItemId;
use nnnsim_common::Time;
use std::fmt;
use std::time::Duration;

/// Default capacity of size-bounded policies.
pub const DEFAULT_MAX_SIZE: usize = 100;

/// Facts about an item at insertion time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemMeta {
    pub now: Time,
    pub freshness: Option<Duration>,
    pub size: usize,
}

impl ItemMeta {
    pub fn at(now: Time) -> Self {
        Self {
            now,
            freshness: None,
            size: 1,
        }
    }
}

/// Outcome of [`ReplacementPolicy::insert`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Admission {
    pub admitted: bool,
    /// Items the policy dropped from its own container to make room. The
    /// owner must erase them from the trie.
    pub evicted: Vec<ItemId>,
}

impl Admission {
    pub fn admit() -> Self {
        Self {
            admitted: true,
            evicted: Vec::new(),
        }
    }

    pub fn refuse() -> Self {
        Self::default()
    }

    pub fn evicting(evicted: Vec<ItemId>) -> Self {
        Self {
            admitted: true,
            evicted,
        }
    }
}

pub trait ReplacementPolicy: fmt::Debug {
    fn name(&self) -> &'static str;

    /// Decides admission without touching tracked items. A following
    /// `insert` of the same item honours this decision.
    fn admits(&mut self, _meta: &ItemMeta) -> bool {
        true
    }

    fn insert(&mut self, id: ItemId, meta: &ItemMeta) -> Admission;

    /// A tracked item was accessed.
    fn lookup(&mut self, id: ItemId);

    /// Stops tracking `id`. Erasing an untracked item is a no-op.
    fn erase(&mut self, id: ItemId);

    fn clear(&mut self);

    /// `0` means unbounded.
    fn set_max_size(&mut self, max: usize);

    fn max_size(&self) -> usize;

    /// Number of tracked items.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tracked items in policy order, next eviction candidate first.
    fn items(&self) -> Vec<ItemId>;

    /// Earliest expiry among tracked items, for time-aware policies.
    fn next_expiry(&self) -> Option<(Time, ItemId)> {
        None
    }

    /// Time since `id` was admitted, for policies that record it.
    fn dwell_time(&self, _id: ItemId, _now: Time) -> Option<Duration> {
        None
    }
}

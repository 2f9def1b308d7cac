//! Generic prefix trie.
//!
//! Nodes live in an arena and are addressed by [`ItemId`]. Children are kept
//! in a `BTreeMap`, so iteration and next-level scans follow the component
//! order. The trie itself keeps no eviction order; [`PolicedTrie`] pairs it
//! with a [`ReplacementPolicy`](crate::policy::ReplacementPolicy).

use crate::policy::{ItemMeta, ReplacementPolicy};
use nnnsim_common::Time;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Arena index of a trie node. Stable until the node is erased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub(crate) usize);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({})", self.0)
    }
}

const ROOT: ItemId = ItemId(0);

#[derive(Debug, Clone)]
struct TrieNode<C, P> {
    key: Option<C>,
    parent: Option<ItemId>,
    children: BTreeMap<C, ItemId>,
    payload: Option<P>,
}

impl<C, P> TrieNode<C, P> {
    fn new(key: Option<C>, parent: Option<ItemId>) -> Self {
        Self {
            key,
            parent,
            children: BTreeMap::new(),
            payload: None,
        }
    }
}

/// Prefix trie keyed by sequences of `C`, carrying an optional payload `P`
/// on every node.
#[derive(Debug, Clone)]
pub struct Trie<C, P> {
    nodes: Vec<Option<TrieNode<C, P>>>,
    free: Vec<usize>,
    len: usize,
}

impl<C: Ord + Clone, P> Default for Trie<C, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Ord + Clone, P> Trie<C, P> {
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(TrieNode::new(None, None))],
            free: Vec::new(),
            len: 0,
        }
    }

    fn node(&self, id: ItemId) -> Option<&TrieNode<C, P>> {
        self.nodes.get(id.0).and_then(|n| n.as_ref())
    }

    fn node_mut(&mut self, id: ItemId) -> Option<&mut TrieNode<C, P>> {
        self.nodes.get_mut(id.0).and_then(|n| n.as_mut())
    }

    fn alloc(&mut self, node: TrieNode<C, P>) -> ItemId {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                ItemId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                ItemId(self.nodes.len() - 1)
            }
        }
    }

    fn child(&self, id: ItemId, component: &C) -> Option<ItemId> {
        self.node(id).and_then(|n| n.children.get(component).copied())
    }

    /// Number of nodes carrying a payload.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of allocated nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Walks or creates the path for `key`. When the terminal node already
    /// carries a payload it is kept and `payload` is dropped.
    pub fn insert(&mut self, key: &[C], payload: P) -> (ItemId, bool) {
        let mut cur = ROOT;
        for component in key {
            cur = match self.child(cur, component) {
                Some(next) => next,
                None => {
                    let next = self.alloc(TrieNode::new(Some(component.clone()), Some(cur)));
                    if let Some(node) = self.node_mut(cur) {
                        node.children.insert(component.clone(), next);
                    }
                    next
                }
            };
        }
        match self.node_mut(cur) {
            Some(node) if node.payload.is_none() => {
                node.payload = Some(payload);
                self.len += 1;
                (cur, true)
            }
            _ => (cur, false),
        }
    }

    /// Node reached by walking `key` exactly, with or without a payload.
    pub fn find_node(&self, key: &[C]) -> Option<ItemId> {
        key.iter().try_fold(ROOT, |cur, c| self.child(cur, c))
    }

    /// Exact match on a node that carries a payload.
    pub fn find(&self, key: &[C]) -> Option<ItemId> {
        self.find_node(key).filter(|id| self.get(*id).is_some())
    }

    /// Deepest node on the path of `key` that carries a payload.
    pub fn longest_prefix_match(&self, key: &[C]) -> Option<ItemId> {
        self.longest_prefix_match_if(key, |_| true)
    }

    /// Deepest node on the path of `key` whose payload satisfies `pred`.
    /// Shallower matches are used when deeper ones are rejected.
    pub fn longest_prefix_match_if(&self, key: &[C], pred: impl Fn(&P) -> bool) -> Option<ItemId> {
        let mut best = None;
        let mut cur = ROOT;
        let mut depth = 0;
        loop {
            if let Some(p) = self.get(cur) {
                if pred(p) {
                    best = Some(cur);
                }
            }
            match key.get(depth).and_then(|c| self.child(cur, c)) {
                Some(next) => {
                    cur = next;
                    depth += 1;
                }
                None => return best,
            }
        }
    }

    /// Node of `key` if it has a payload, otherwise the first payload in its
    /// subtree. `None` unless the whole key is present as a path.
    pub fn deepest_prefix_match(&self, key: &[C]) -> Option<ItemId> {
        self.find_node(key).and_then(|id| self.first_in_subtree(id))
    }

    /// Like [`deepest_prefix_match`](Self::deepest_prefix_match), but only
    /// descends into children whose component satisfies `pred`.
    pub fn deepest_prefix_match_if_next_level(
        &self,
        key: &[C],
        pred: impl Fn(&C) -> bool,
    ) -> Option<ItemId> {
        let node = self.find_node(key)?;
        self.node(node)?
            .children
            .iter()
            .filter(|(c, _)| pred(c))
            .find_map(|(_, child)| self.first_in_subtree(*child))
    }

    /// First node carrying a payload in pre-order, starting at `id`.
    pub fn first_in_subtree(&self, id: ItemId) -> Option<ItemId> {
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            let node = self.node(cur)?;
            if node.payload.is_some() {
                return Some(cur);
            }
            stack.extend(node.children.values().rev().copied());
        }
        None
    }

    /// Removes the payload of `id` and prunes payload-less leaves upward.
    pub fn erase(&mut self, id: ItemId) -> Option<P> {
        let payload = self.node_mut(id)?.payload.take()?;
        self.len -= 1;
        self.prune(id);
        Some(payload)
    }

    fn prune(&mut self, mut id: ItemId) {
        while id != ROOT {
            let (parent, key) = match self.node(id) {
                Some(n) if n.payload.is_none() && n.children.is_empty() => (n.parent, n.key.clone()),
                _ => return,
            };
            self.nodes[id.0] = None;
            self.free.push(id.0);
            match (parent, key) {
                (Some(parent), Some(key)) => {
                    if let Some(p) = self.node_mut(parent) {
                        p.children.remove(&key);
                    }
                    id = parent;
                }
                _ => return,
            }
        }
    }

    pub fn get(&self, id: ItemId) -> Option<&P> {
        self.node(id).and_then(|n| n.payload.as_ref())
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut P> {
        self.node_mut(id).and_then(|n| n.payload.as_mut())
    }

    /// Full key of a node, root first.
    pub fn key(&self, id: ItemId) -> Vec<C> {
        let mut key = Vec::new();
        let mut cur = self.node(id);
        while let Some(node) = cur {
            if let Some(k) = &node.key {
                key.push(k.clone());
            }
            cur = node.parent.and_then(|p| self.node(p));
        }
        key.reverse();
        key
    }

    pub fn parent(&self, id: ItemId) -> Option<ItemId> {
        self.node(id).and_then(|n| n.parent)
    }

    /// Direct children of a node in component order.
    pub fn children(&self, id: ItemId) -> impl Iterator<Item = (&C, ItemId)> + '_ {
        self.node(id)
            .into_iter()
            .flat_map(|n| n.children.iter().map(|(c, id)| (c, *id)))
    }

    /// Payload-carrying nodes in pre-order.
    pub fn iter(&self) -> Iter<'_, C, P> {
        Iter {
            trie: self,
            stack: vec![ROOT],
        }
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

/// Pre-order iterator over payload-carrying nodes.
pub struct Iter<'a, C, P> {
    trie: &'a Trie<C, P>,
    stack: Vec<ItemId>,
}

impl<'a, C: Ord + Clone, P> Iterator for Iter<'a, C, P> {
    type Item = (ItemId, &'a P);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            let Some(node) = self.trie.node(id) else {
                continue;
            };
            self.stack.extend(node.children.values().rev().copied());
            if let Some(p) = &node.payload {
                return Some((id, p));
            }
        }
        None
    }
}

/* ---------------------------------------------------------------- *
 * Trie with a replacement policy
 * ---------------------------------------------------------------- */

/// What a policy needs to know about a payload.
pub trait PolicyPayload {
    /// Freshness period of the payload, if it expires.
    fn freshness(&self) -> Option<Duration> {
        None
    }

    /// Size accounted by size-bounded policies.
    fn wire_size(&self) -> usize {
        1
    }
}

/// Result of [`PolicedTrie::insert`].
#[derive(Debug)]
pub struct Insert<P> {
    /// Node of the new payload; `None` when the policy refused it.
    pub item: Option<ItemId>,
    /// `false` when the key was already present or admission was refused.
    pub inserted: bool,
    /// Payloads evicted to make room.
    pub evicted: Vec<(ItemId, P)>,
}

/// A [`Trie`] whose membership is governed by a replacement policy.
#[derive(Debug)]
pub struct PolicedTrie<C, P> {
    trie: Trie<C, P>,
    policy: Box<dyn ReplacementPolicy>,
}

impl<C: Ord + Clone, P: PolicyPayload> PolicedTrie<C, P> {
    pub fn new(policy: Box<dyn ReplacementPolicy>) -> Self {
        Self {
            trie: Trie::new(),
            policy,
        }
    }

    pub fn trie(&self) -> &Trie<C, P> {
        &self.trie
    }

    pub fn policy(&self) -> &dyn ReplacementPolicy {
        self.policy.as_ref()
    }

    pub fn policy_mut(&mut self) -> &mut dyn ReplacementPolicy {
        self.policy.as_mut()
    }

    pub fn len(&self) -> usize {
        self.trie.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    /// Inserts `payload` under `key`. An existing payload is left alone and
    /// the policy is not consulted.
    pub fn insert(&mut self, key: &[C], payload: P, now: Time) -> Insert<P> {
        let meta = ItemMeta {
            now,
            freshness: payload.freshness(),
            size: payload.wire_size(),
        };
        let (id, inserted) = self.trie.insert(key, payload);
        if !inserted {
            return Insert {
                item: Some(id),
                inserted: false,
                evicted: Vec::new(),
            };
        }

        let admission = self.policy.insert(id, &meta);
        let mut admitted = admission.admitted;
        let mut evicted = Vec::with_capacity(admission.evicted.len());
        for victim in admission.evicted {
            if victim == id {
                admitted = false;
                continue;
            }
            if let Some(p) = self.trie.erase(victim) {
                evicted.push((victim, p));
            }
        }

        if !admitted {
            self.policy.erase(id);
            self.trie.erase(id);
            return Insert {
                item: None,
                inserted: false,
                evicted,
            };
        }
        Insert {
            item: Some(id),
            inserted: true,
            evicted,
        }
    }

    /// Exact lookup; a hit is reported to the policy.
    pub fn find(&mut self, key: &[C]) -> Option<ItemId> {
        let id = self.trie.find(key)?;
        self.policy.lookup(id);
        Some(id)
    }

    /// Reports an access found through another trie query.
    pub fn touch(&mut self, id: ItemId) {
        self.policy.lookup(id);
    }

    pub fn get(&self, id: ItemId) -> Option<&P> {
        self.trie.get(id)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut P> {
        self.trie.get_mut(id)
    }

    pub fn erase(&mut self, id: ItemId) -> Option<P> {
        self.policy.erase(id);
        self.trie.erase(id)
    }

    pub fn set_max_size(&mut self, max: usize) {
        self.policy.set_max_size(max);
    }

    pub fn max_size(&self) -> usize {
        self.policy.max_size()
    }

    /// Items in policy order (eviction candidates first).
    pub fn items(&self) -> Vec<ItemId> {
        self.policy.items()
    }

    pub fn clear(&mut self) {
        self.policy.clear();
        self.trie.clear();
    }
}

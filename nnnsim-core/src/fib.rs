//! Forwarding Information Base.
//!
//! Name prefixes map to ranked next hops. Each entry keeps its
//! [`FaceMetric`]s ordered by `(status, routing cost)` so the best candidate
//! is always at the front; RED faces sort last.

use crate::trie::Trie;
use log::debug;
use nnnsim_common::types::INFINITE_COST;
use nnnsim_common::{Error, FaceId, Name, NameComponent, Result};
use serde::Serialize;
use std::fmt::{self, Write};
use std::time::Duration;

/// Health of a next hop. Lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[repr(u8)]
pub enum FaceStatus {
    Green = 1,
    Yellow = 2,
    Red = 3,
}

impl fmt::Display for FaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FaceStatus::Green => "GREEN",
            FaceStatus::Yellow => "YELLOW",
            FaceStatus::Red => "RED",
        })
    }
}

/// Round-trip statistics of a next hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RttStats {
    /// Smoothed RTT; `None` until the first sample.
    pub srtt: Option<Duration>,
    pub rttvar: Duration,
}

impl RttStats {
    /// Jacobson update: α = 1/8, β = 1/4. The first sample sets
    /// `srtt = s` and `rttvar = s / 2`.
    pub fn update(&mut self, sample: Duration) {
        match self.srtt {
            None => {
                self.srtt = Some(sample);
                self.rttvar = sample / 2;
            }
            Some(srtt) => {
                let err = if srtt > sample { srtt - sample } else { sample - srtt };
                self.rttvar = (self.rttvar * 3 + err) / 4;
                self.srtt = Some((srtt * 7 + sample) / 8);
            }
        }
    }
}

/// Next-hop record of a FIB entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaceMetric {
    pub face: FaceId,
    pub status: FaceStatus,
    pub routing_cost: u16,
    pub rtt: RttStats,
    /// Propagation delay towards the producer, when known.
    pub real_delay: Duration,
}

impl FaceMetric {
    pub fn new(face: FaceId, routing_cost: u16) -> Self {
        Self {
            face,
            status: if routing_cost == INFINITE_COST {
                FaceStatus::Red
            } else {
                FaceStatus::Yellow
            },
            routing_cost,
            rtt: RttStats::default(),
            real_delay: Duration::ZERO,
        }
    }

    pub fn update_rtt(&mut self, sample: Duration) {
        self.rtt.update(sample);
    }

    pub fn set_real_delay(&mut self, delay: Duration) {
        self.real_delay = delay;
    }

    pub fn srtt(&self) -> Option<Duration> {
        self.rtt.srtt
    }

    pub fn rttvar(&self) -> Duration {
        self.rtt.rttvar
    }

    fn rank(&self) -> (FaceStatus, u16) {
        (self.status, self.routing_cost)
    }
}

impl fmt::Display for FaceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, cost {}, srtt {:?})",
            self.face, self.status, self.routing_cost, self.rtt.srtt
        )
    }
}

/// Routing-metric bookkeeping shared by FIB and NNST style entries.
pub(crate) fn apply_routing_metric(status: &mut FaceStatus, cost: &mut u16, new_cost: u16) {
    if new_cost == INFINITE_COST {
        *cost = new_cost;
        *status = FaceStatus::Red;
    } else if *cost > new_cost || *status == FaceStatus::Red {
        *cost = new_cost;
        *status = FaceStatus::Yellow;
    }
}

/* ---------------------------------------------------------------- *
 * Entry
 * ---------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq)]
pub struct FibEntry {
    prefix: Name,
    faces: Vec<FaceMetric>,
}

impl FibEntry {
    pub fn new(prefix: Name) -> Self {
        Self {
            prefix,
            faces: Vec::new(),
        }
    }

    pub fn prefix(&self) -> &Name {
        &self.prefix
    }

    /// Next hops, best first.
    pub fn faces(&self) -> &[FaceMetric] {
        &self.faces
    }

    pub fn face(&self, face: FaceId) -> Option<&FaceMetric> {
        self.faces.iter().find(|m| m.face == face)
    }

    pub fn has_faces(&self) -> bool {
        !self.faces.is_empty()
    }

    fn reorder(&mut self) {
        self.faces.sort_by_key(FaceMetric::rank);
    }

    fn face_mut(&mut self, face: FaceId) -> Option<&mut FaceMetric> {
        self.faces.iter_mut().find(|m| m.face == face)
    }

    pub fn update_status(&mut self, face: FaceId, status: FaceStatus) {
        if let Some(m) = self.face_mut(face) {
            m.status = status;
            self.reorder();
        }
    }

    /// Adds `face` or updates its cost. An existing cost is only lowered,
    /// unless the face is RED, in which case it comes back as YELLOW. An
    /// infinite cost turns the face RED.
    pub fn add_or_update_routing_metric(&mut self, face: FaceId, cost: u16) {
        match self.face_mut(face) {
            Some(m) => apply_routing_metric(&mut m.status, &mut m.routing_cost, cost),
            None => self.faces.push(FaceMetric::new(face, cost)),
        }
        self.reorder();
    }

    /// Keeps the entry but marks every next hop unusable.
    pub fn invalidate(&mut self) {
        for m in self.faces.iter_mut() {
            m.routing_cost = INFINITE_COST;
            m.status = FaceStatus::Red;
        }
        self.reorder();
    }

    pub fn update_face_rtt(&mut self, face: FaceId, sample: Duration) {
        if let Some(m) = self.face_mut(face) {
            m.update_rtt(sample);
        }
    }

    pub fn set_real_delay(&mut self, face: FaceId, delay: Duration) {
        if let Some(m) = self.face_mut(face) {
            m.set_real_delay(delay);
        }
    }

    /// The `skip mod n`-th next hop in ranking order.
    pub fn find_best_candidate(&self, skip: usize) -> Result<&FaceMetric> {
        if self.faces.is_empty() {
            return Err(Error::NoFaces(self.prefix.to_string()));
        }
        Ok(&self.faces[skip % self.faces.len()])
    }

    pub fn remove_face(&mut self, face: FaceId) -> bool {
        let before = self.faces.len();
        self.faces.retain(|m| m.face != face);
        before != self.faces.len()
    }
}

impl fmt::Display for FibEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} nexthops={{", self.prefix)?;
        for (i, m) in self.faces.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", m)?;
        }
        f.write_str("}")
    }
}

/* ---------------------------------------------------------------- *
 * Table
 * ---------------------------------------------------------------- */

#[derive(Debug, Clone, Default)]
pub struct Fib {
    trie: Trie<NameComponent, FibEntry>,
}

impl Fib {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.trie.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    /// Deepest entry on the path of `name` that has at least one next hop.
    pub fn longest_prefix_match(&self, name: &Name) -> Option<&FibEntry> {
        let id = self
            .trie
            .longest_prefix_match_if(name.components(), FibEntry::has_faces)?;
        self.trie.get(id)
    }

    pub fn find(&self, prefix: &Name) -> Option<&FibEntry> {
        self.trie.find(prefix.components()).and_then(|id| self.trie.get(id))
    }

    pub fn find_mut(&mut self, prefix: &Name) -> Option<&mut FibEntry> {
        let id = self.trie.find(prefix.components())?;
        self.trie.get_mut(id)
    }

    /// Adds a next hop under `prefix`, creating the entry if needed.
    pub fn add(&mut self, prefix: &Name, face: FaceId, cost: u16) {
        let (id, created) = self
            .trie
            .insert(prefix.components(), FibEntry::new(prefix.clone()));
        if created {
            debug!("FIB entry created for {}", prefix);
        }
        if let Some(entry) = self.trie.get_mut(id) {
            entry.add_or_update_routing_metric(face, cost);
        }
    }

    pub fn update_status(&mut self, prefix: &Name, face: FaceId, status: FaceStatus) {
        if let Some(entry) = self.find_mut(prefix) {
            entry.update_status(face, status);
        }
    }

    pub fn remove(&mut self, prefix: &Name) -> Option<FibEntry> {
        let id = self.trie.find(prefix.components())?;
        self.trie.erase(id)
    }

    pub fn invalidate_all(&mut self) {
        let ids: Vec<_> = self.trie.iter().map(|(id, _)| id).collect();
        for id in ids {
            if let Some(entry) = self.trie.get_mut(id) {
                entry.invalidate();
            }
        }
    }

    /// Drops `face` from every entry and prunes entries left without next
    /// hops.
    pub fn remove_from_all(&mut self, face: FaceId) {
        let ids: Vec<_> = self.trie.iter().map(|(id, _)| id).collect();
        for id in ids {
            let empty = match self.trie.get_mut(id) {
                Some(entry) => {
                    entry.remove_face(face);
                    !entry.has_faces()
                }
                None => false,
            };
            if empty {
                self.trie.erase(id);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &FibEntry> + '_ {
        self.trie.iter().map(|(_, e)| e)
    }

    pub fn print(&self) -> String {
        let mut out = String::new();
        for entry in self.iter() {
            let _ = writeln!(out, "{}", entry);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    #[test]
    fn green_beats_cheaper_faces() {
        let mut entry = FibEntry::new(name("/a"));
        for (face, cost) in [(0, 1), (1, 5), (2, 2)] {
            entry.add_or_update_routing_metric(FaceId(face), cost);
        }
        entry.update_status(FaceId(0), FaceStatus::Red);
        entry.update_status(FaceId(1), FaceStatus::Green);

        assert_eq!(entry.find_best_candidate(0).unwrap().face, FaceId(1));
        assert_eq!(entry.find_best_candidate(1).unwrap().face, FaceId(2));
        assert_eq!(entry.find_best_candidate(2).unwrap().face, FaceId(0));
        assert_eq!(entry.find_best_candidate(3).unwrap().face, FaceId(1));
    }

    #[test]
    fn empty_entry_has_no_faces() {
        let entry = FibEntry::new(name("/a"));
        assert!(matches!(entry.find_best_candidate(0), Err(Error::NoFaces(_))));
    }

    #[test]
    fn routing_metric_only_improves_unless_red() {
        let mut entry = FibEntry::new(name("/a"));
        entry.add_or_update_routing_metric(FaceId(1), 10);
        entry.add_or_update_routing_metric(FaceId(1), 20);
        assert_eq!(entry.face(FaceId(1)).unwrap().routing_cost, 10);

        entry.add_or_update_routing_metric(FaceId(1), INFINITE_COST);
        assert_eq!(entry.face(FaceId(1)).unwrap().status, FaceStatus::Red);

        entry.add_or_update_routing_metric(FaceId(1), 30);
        let m = entry.face(FaceId(1)).unwrap();
        assert_eq!((m.status, m.routing_cost), (FaceStatus::Yellow, 30));
    }

    #[test]
    fn jacobson_rtt_update() {
        let mut rtt = RttStats::default();
        rtt.update(Duration::from_millis(100));
        assert_eq!(rtt.srtt, Some(Duration::from_millis(100)));
        assert_eq!(rtt.rttvar, Duration::from_millis(50));

        rtt.update(Duration::from_millis(180));
        assert_eq!(rtt.srtt, Some(Duration::from_millis(110)));
        assert_eq!(rtt.rttvar, Duration::from_millis(57_500) / 1000);
    }

    #[test]
    fn lpm_skips_entries_without_faces() {
        let mut fib = Fib::new();
        fib.add(&name("/a"), FaceId(1), 0);
        fib.add(&name("/a/b"), FaceId(2), 0);
        assert_eq!(fib.longest_prefix_match(&name("/a/b/c")).unwrap().prefix(), &name("/a/b"));

        fib.find_mut(&name("/a/b")).unwrap().remove_face(FaceId(2));
        assert_eq!(fib.longest_prefix_match(&name("/a/b/c")).unwrap().prefix(), &name("/a"));
        assert!(fib.longest_prefix_match(&name("/z")).is_none());
    }

    #[test]
    fn remove_from_all_prunes_empty_entries() {
        let mut fib = Fib::new();
        fib.add(&name("/a"), FaceId(1), 0);
        fib.add(&name("/b"), FaceId(1), 0);
        fib.add(&name("/b"), FaceId(2), 0);
        fib.remove_from_all(FaceId(1));
        assert_eq!(fib.len(), 1);
        assert!(fib.find(&name("/a")).is_none());
        assert_eq!(fib.find(&name("/b")).unwrap().faces().len(), 1);

        fib.invalidate_all();
        assert_eq!(fib.find(&name("/b")).unwrap().faces()[0].status, FaceStatus::Red);
        assert!(fib.print().contains("RED"));
    }
}

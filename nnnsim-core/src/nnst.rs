//! 3N Name-to-Sector Table.
//!
//! The NNST is the FIB of 3N names. Every entry maps a sector address to one
//! or more `(face, PoA)` next hops, each with its own lease. When no entry
//! covers a destination, routing falls back to the closest known sector.

use crate::fib::{apply_routing_metric, FaceStatus, RttStats};
use crate::trie::Trie;
use log::debug;
use nnnsim_common::types::INFINITE_COST;
use nnnsim_common::{Error, FaceId, NnnAddress, Poa, Result, Time};
use std::collections::BTreeSet;
use std::fmt::{self, Write};
use std::time::Duration;

/// Next hop towards a sector: a face plus the link-layer address behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NnstFaceMetric {
    pub face: FaceId,
    pub poa: Poa,
    pub status: FaceStatus,
    pub routing_cost: u16,
    pub rtt: RttStats,
    pub real_delay: Duration,
    pub lease_expire: Time,
}

impl NnstFaceMetric {
    pub fn new(face: FaceId, poa: Poa, lease_expire: Time, routing_cost: u16) -> Self {
        Self {
            face,
            poa,
            status: if routing_cost == INFINITE_COST {
                FaceStatus::Red
            } else {
                FaceStatus::Yellow
            },
            routing_cost,
            rtt: RttStats::default(),
            real_delay: Duration::ZERO,
            lease_expire,
        }
    }

    fn rank(&self) -> (FaceStatus, u16, FaceId) {
        (self.status, self.routing_cost, self.face)
    }
}

impl fmt::Display for NnstFaceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} poa={} {} cost={} lease={:?}",
            self.face, self.poa, self.status, self.routing_cost, self.lease_expire
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NnstEntry {
    address: NnnAddress,
    metrics: Vec<NnstFaceMetric>,
}

impl NnstEntry {
    pub fn new(address: NnnAddress) -> Self {
        Self {
            address,
            metrics: Vec::new(),
        }
    }

    pub fn address(&self) -> &NnnAddress {
        &self.address
    }

    /// Next hops, best first.
    pub fn metrics(&self) -> &[NnstFaceMetric] {
        &self.metrics
    }

    pub fn has_metrics(&self) -> bool {
        !self.metrics.is_empty()
    }

    fn reorder(&mut self) {
        self.metrics.sort_by_key(NnstFaceMetric::rank);
    }

    /// Adds or refreshes the `(face, poa)` pair. A known pair takes the new
    /// lease and cost.
    pub fn add_poa(&mut self, face: FaceId, poa: Poa, lease_expire: Time, cost: u16) {
        match self
            .metrics
            .iter_mut()
            .find(|m| m.face == face && m.poa == poa)
        {
            Some(m) => {
                m.lease_expire = m.lease_expire.max(lease_expire);
                apply_routing_metric(&mut m.status, &mut m.routing_cost, cost);
            }
            None => self
                .metrics
                .push(NnstFaceMetric::new(face, poa, lease_expire, cost)),
        }
        self.reorder();
    }

    pub fn update_status(&mut self, face: FaceId, status: FaceStatus) {
        for m in self.metrics.iter_mut().filter(|m| m.face == face) {
            m.status = status;
        }
        self.reorder();
    }

    pub fn update_lease_time(&mut self, lease_expire: Time) {
        for m in self.metrics.iter_mut() {
            m.lease_expire = lease_expire;
        }
    }

    pub fn add_or_update_routing_metric(&mut self, face: FaceId, cost: u16) {
        for m in self.metrics.iter_mut().filter(|m| m.face == face) {
            apply_routing_metric(&mut m.status, &mut m.routing_cost, cost);
        }
        self.reorder();
    }

    pub fn update_face_rtt(&mut self, face: FaceId, sample: Duration) {
        for m in self.metrics.iter_mut().filter(|m| m.face == face) {
            m.rtt.update(sample);
        }
    }

    pub fn invalidate(&mut self) {
        for m in self.metrics.iter_mut() {
            m.routing_cost = INFINITE_COST;
            m.status = FaceStatus::Red;
        }
        self.reorder();
    }

    pub fn find_best_candidate(&self, skip: usize) -> Result<&NnstFaceMetric> {
        if self.metrics.is_empty() {
            return Err(Error::NoFaces(self.address.to_string()));
        }
        Ok(&self.metrics[skip % self.metrics.len()])
    }

    pub fn remove_face(&mut self, face: FaceId) {
        self.metrics.retain(|m| m.face != face);
    }

    pub fn remove_poa(&mut self, poa: &Poa) {
        self.metrics.retain(|m| &m.poa != poa);
    }

    /// Drops next hops whose lease ran out. Returns how many went.
    pub fn clean_expired(&mut self, now: Time) -> usize {
        let before = self.metrics.len();
        self.metrics.retain(|m| m.lease_expire > now);
        before - self.metrics.len()
    }

    pub fn next_lease_expiry(&self) -> Option<Time> {
        self.metrics.iter().map(|m| m.lease_expire).min()
    }

    pub fn poas(&self) -> Vec<Poa> {
        let mut poas: Vec<Poa> = Vec::new();
        for m in &self.metrics {
            if !poas.contains(&m.poa) {
                poas.push(m.poa.clone());
            }
        }
        poas
    }
}

impl fmt::Display for NnstEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)?;
        for m in &self.metrics {
            write!(f, "\n  {}", m)?;
        }
        Ok(())
    }
}

/// Face and PoA to reach a sector through.
pub type FaceInfo = (FaceId, Poa);

#[derive(Debug, Clone, Default)]
pub struct Nnst {
    trie: Trie<u64, NnstEntry>,
}

impl Nnst {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.trie.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NnstEntry> + '_ {
        self.trie.iter().map(|(_, e)| e)
    }

    pub fn find(&self, address: &NnnAddress) -> Option<&NnstEntry> {
        let id = self.trie.find(address.labels())?;
        self.trie.get(id)
    }

    fn find_mut(&mut self, address: &NnnAddress) -> Option<&mut NnstEntry> {
        let id = self.trie.find(address.labels())?;
        self.trie.get_mut(id)
    }

    pub fn found_name(&self, address: &NnnAddress) -> bool {
        self.find(address).is_some()
    }

    /// Best entry to route `address` through.
    ///
    /// Tries the exact sector, then the deepest known ancestor, then the
    /// entry with the smallest sector distance. Equal distances resolve to
    /// the smaller address.
    pub fn closest_sector(&self, address: &NnnAddress) -> Option<&NnstEntry> {
        if let Some(id) = self
            .trie
            .longest_prefix_match_if(address.labels(), NnstEntry::has_metrics)
        {
            return self.trie.get(id);
        }
        self.iter()
            .filter(|e| e.has_metrics())
            .min_by(|a, b| {
                address
                    .distance(a.address())
                    .cmp(&address.distance(b.address()))
                    .then_with(|| a.address().cmp(b.address()))
            })
    }

    pub fn closest_sector_name_info(&self, address: &NnnAddress) -> Option<NnnAddress> {
        self.closest_sector(address).map(|e| e.address().clone())
    }

    pub fn closest_sector_face_info(&self, address: &NnnAddress, skip: usize) -> Option<FaceInfo> {
        let metric = self.closest_sector(address)?.find_best_candidate(skip).ok()?;
        Some((metric.face, metric.poa.clone()))
    }

    fn sub_sectors(&self, address: &NnnAddress) -> Vec<&NnstEntry> {
        let Some(node) = self.trie.find_node(address.labels()) else {
            return Vec::new();
        };
        self.trie
            .children(node)
            .filter_map(|(_, child)| self.trie.get(child))
            .filter(|e| e.has_metrics())
            .collect()
    }

    fn parent_sector(&self, address: &NnnAddress) -> Option<&NnstEntry> {
        if address.len() < 2 {
            return None;
        }
        self.find(&address.sector_name()).filter(|e| e.has_metrics())
    }

    pub fn one_hop_sub_sector_name_info(&self, address: &NnnAddress) -> Vec<NnnAddress> {
        self.sub_sectors(address)
            .into_iter()
            .map(|e| e.address().clone())
            .collect()
    }

    pub fn one_hop_sub_sector_face_info(&self, address: &NnnAddress, skip: usize) -> Vec<FaceInfo> {
        face_infos(self.sub_sectors(address), skip)
    }

    pub fn one_hop_parent_sector_name_info(&self, address: &NnnAddress) -> Vec<NnnAddress> {
        self.parent_sector(address)
            .map(|e| e.address().clone())
            .into_iter()
            .collect()
    }

    pub fn one_hop_parent_sector_face_info(&self, address: &NnnAddress, skip: usize) -> Vec<FaceInfo> {
        face_infos(self.parent_sector(address).into_iter().collect(), skip)
    }

    /// Sectors one hop away: the parent first, then the sub-sectors.
    pub fn one_hop_name_info(&self, address: &NnnAddress) -> Vec<NnnAddress> {
        let mut names = self.one_hop_parent_sector_name_info(address);
        names.extend(self.one_hop_sub_sector_name_info(address));
        names
    }

    pub fn one_hop_face_info(&self, address: &NnnAddress, skip: usize) -> Vec<FaceInfo> {
        let mut entries: Vec<&NnstEntry> = self.parent_sector(address).into_iter().collect();
        entries.extend(self.sub_sectors(address));
        face_infos(entries, skip)
    }

    pub fn get_all_poas(&self, address: &NnnAddress) -> Vec<Poa> {
        self.find(address).map(NnstEntry::poas).unwrap_or_default()
    }

    /* ---- updates ---- */

    pub fn add(&mut self, address: &NnnAddress, face: FaceId, poa: Poa, lease_expire: Time, cost: u16) {
        self.add_poas(address, face, std::slice::from_ref(&poa), lease_expire, cost);
    }

    pub fn add_poas(&mut self, address: &NnnAddress, face: FaceId, poas: &[Poa], lease_expire: Time, cost: u16) {
        let (id, created) = self
            .trie
            .insert(address.labels(), NnstEntry::new(address.clone()));
        if created {
            debug!("NNST entry created for {}", address);
        }
        if let Some(entry) = self.trie.get_mut(id) {
            for poa in poas {
                entry.add_poa(face, poa.clone(), lease_expire, cost);
            }
        }
    }

    /// Adds the same PoA behind several faces.
    pub fn add_faces(&mut self, address: &NnnAddress, faces: &[FaceId], poa: Poa, lease_expire: Time, cost: u16) {
        for face in faces {
            self.add(address, *face, poa.clone(), lease_expire, cost);
        }
    }

    pub fn update_status(&mut self, address: &NnnAddress, face: FaceId, status: FaceStatus) {
        if let Some(e) = self.find_mut(address) {
            e.update_status(face, status);
        }
    }

    pub fn update_lease_time(&mut self, address: &NnnAddress, lease_expire: Time) {
        if let Some(e) = self.find_mut(address) {
            e.update_lease_time(lease_expire);
        }
    }

    pub fn add_or_update_routing_metric(&mut self, address: &NnnAddress, face: FaceId, cost: u16) {
        if let Some(e) = self.find_mut(address) {
            e.add_or_update_routing_metric(face, cost);
        }
    }

    pub fn update_face_rtt(&mut self, address: &NnnAddress, face: FaceId, sample: Duration) {
        if let Some(e) = self.find_mut(address) {
            e.update_face_rtt(face, sample);
        }
    }

    pub fn invalidate_all(&mut self) {
        self.for_each_entry(|e| {
            e.invalidate();
            false
        });
    }

    pub fn remove(&mut self, address: &NnnAddress) -> Option<NnstEntry> {
        let id = self.trie.find(address.labels())?;
        self.trie.erase(id)
    }

    /// Removes DEN-announced PoAs of `address`; the entry goes once empty.
    pub fn remove_poas(&mut self, address: &NnnAddress, poas: &[Poa]) {
        let Some(id) = self.trie.find(address.labels()) else {
            return;
        };
        let empty = match self.trie.get_mut(id) {
            Some(e) => {
                for poa in poas {
                    e.remove_poa(poa);
                }
                !e.has_metrics()
            }
            None => false,
        };
        if empty {
            self.trie.erase(id);
        }
    }

    pub fn remove_from_all_face(&mut self, face: FaceId) {
        self.for_each_entry(|e| {
            e.remove_face(face);
            !e.has_metrics()
        });
    }

    pub fn remove_from_all_poa(&mut self, poa: &Poa) {
        self.for_each_entry(|e| {
            e.remove_poa(poa);
            !e.has_metrics()
        });
    }

    /// Drops expired leases, then entries left without next hops. Returns the
    /// addresses that disappeared.
    pub fn clean_expired(&mut self, now: Time) -> Vec<NnnAddress> {
        let mut gone = Vec::new();
        self.for_each_entry(|e| {
            e.clean_expired(now);
            let empty = !e.has_metrics();
            if empty {
                gone.push(e.address().clone());
            }
            empty
        });
        if !gone.is_empty() {
            debug!("NNST leases expired for {:?}", gone);
        }
        gone
    }

    pub fn next_lease_expiry(&self) -> Option<Time> {
        self.iter().filter_map(NnstEntry::next_lease_expiry).min()
    }

    // Applies `f` to every entry, erasing those for which it returns true.
    fn for_each_entry(&mut self, mut f: impl FnMut(&mut NnstEntry) -> bool) {
        let ids: Vec<_> = self.trie.iter().map(|(id, _)| id).collect();
        for id in ids {
            let erase = self.trie.get_mut(id).map_or(false, &mut f);
            if erase {
                self.trie.erase(id);
            }
        }
    }

    /* ---- printing ---- */

    fn rows(&self) -> Vec<(&NnnAddress, &NnstFaceMetric)> {
        self.iter()
            .flat_map(|e| e.metrics().iter().map(move |m| (e.address(), m)))
            .collect()
    }

    fn render(rows: Vec<(&NnnAddress, &NnstFaceMetric)>) -> String {
        let mut out = String::new();
        for (addr, m) in rows {
            let _ = writeln!(out, "{} {}", addr, m);
        }
        out
    }

    pub fn print_by_address(&self) -> String {
        Self::render(self.rows())
    }

    pub fn print_by_metric(&self) -> String {
        let mut rows = self.rows();
        rows.sort_by_key(|(a, m)| (m.status, m.routing_cost, (*a).clone()));
        Self::render(rows)
    }

    pub fn print_by_lease(&self) -> String {
        let mut rows = self.rows();
        rows.sort_by_key(|(a, m)| (m.lease_expire, (*a).clone()));
        Self::render(rows)
    }

    pub fn print_by_face(&self) -> String {
        let mut rows = self.rows();
        rows.sort_by_key(|(a, m)| (m.face, (*a).clone()));
        Self::render(rows)
    }

    /// Faces that carry at least one route.
    pub fn faces(&self) -> BTreeSet<FaceId> {
        self.rows().into_iter().map(|(_, m)| m.face).collect()
    }
}

fn face_infos(entries: Vec<&NnstEntry>, skip: usize) -> Vec<FaceInfo> {
    entries
        .into_iter()
        .filter_map(|e| e.find_best_candidate(skip).ok())
        .map(|m| (m.face, m.poa.clone()))
        .collect()
}

//! 3N Name Pairing Table: remembers which old name a mobile node now answers
//! to, so traffic for the old name can be rewritten until its lease ends.

use log::debug;
use nnnsim_common::{NnnAddress, Time};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NnptEntry {
    pub old_name: NnnAddress,
    pub new_name: NnnAddress,
    pub lease_expire: Time,
}

#[derive(Debug, Clone, Default)]
pub struct Nnpt {
    by_old: BTreeMap<NnnAddress, NnptEntry>,
    by_new: BTreeMap<NnnAddress, NnnAddress>,
    by_lease: BTreeSet<(Time, NnnAddress)>,
}

impl Nnpt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_old.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_old.is_empty()
    }

    /// Pairs `old` with `new`. Any pair that already uses either name is
    /// replaced; both indexes stay unique.
    pub fn add_entry(&mut self, old: &NnnAddress, new: &NnnAddress, lease_expire: Time) {
        self.delete_entry(old);
        self.delete_by_new(new);
        debug!("NNPT pair {} -> {} until {:?}", old, new, lease_expire);
        self.by_new.insert(new.clone(), old.clone());
        self.by_lease.insert((lease_expire, old.clone()));
        self.by_old.insert(
            old.clone(),
            NnptEntry {
                old_name: old.clone(),
                new_name: new.clone(),
                lease_expire,
            },
        );
    }

    pub fn delete_entry(&mut self, old: &NnnAddress) -> Option<NnptEntry> {
        let entry = self.by_old.remove(old)?;
        self.by_new.remove(&entry.new_name);
        self.by_lease.remove(&(entry.lease_expire, entry.old_name.clone()));
        Some(entry)
    }

    /// Deletes the pair only if `old` is currently paired with `new`.
    pub fn delete_pair(&mut self, old: &NnnAddress, new: &NnnAddress) -> Option<NnptEntry> {
        match self.by_old.get(old) {
            Some(e) if &e.new_name == new => self.delete_entry(old),
            _ => None,
        }
    }

    pub fn delete_by_new(&mut self, new: &NnnAddress) -> Option<NnptEntry> {
        let old = self.by_new.get(new)?.clone();
        self.delete_entry(&old)
    }

    pub fn found_old_name(&self, old: &NnnAddress) -> bool {
        self.by_old.contains_key(old)
    }

    pub fn found_new_name(&self, new: &NnnAddress) -> bool {
        self.by_new.contains_key(new)
    }

    pub fn find_paired_name(&self, old: &NnnAddress) -> Option<&NnnAddress> {
        self.by_old.get(old).map(|e| &e.new_name)
    }

    pub fn find_paired_old_name(&self, new: &NnnAddress) -> Option<&NnnAddress> {
        self.by_new.get(new)
    }

    /// Entry where `name` appears as either side of the pair.
    pub fn find_entry(&self, name: &NnnAddress) -> Option<&NnptEntry> {
        self.by_old
            .get(name)
            .or_else(|| self.by_new.get(name).and_then(|old| self.by_old.get(old)))
    }

    pub fn find_name_expire_time(&self, name: &NnnAddress) -> Option<Time> {
        self.find_entry(name).map(|e| e.lease_expire)
    }

    pub fn next_expiring(&self) -> Option<&NnptEntry> {
        let (_, old) = self.by_lease.iter().next()?;
        self.by_old.get(old)
    }

    pub fn update_lease_time(&mut self, old: &NnnAddress, lease_expire: Time) -> bool {
        let Some(entry) = self.by_old.get_mut(old) else {
            return false;
        };
        self.by_lease.remove(&(entry.lease_expire, old.clone()));
        entry.lease_expire = lease_expire;
        self.by_lease.insert((lease_expire, old.clone()));
        true
    }

    /// Removes pairs whose lease is at or before `now`.
    pub fn clean_expired(&mut self, now: Time) -> Vec<NnptEntry> {
        let expired: Vec<NnnAddress> = self
            .by_lease
            .iter()
            .take_while(|(lease, _)| *lease <= now)
            .map(|(_, old)| old.clone())
            .collect();
        expired
            .iter()
            .filter_map(|old| self.delete_entry(old))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NnptEntry> + '_ {
        self.by_old.values()
    }

    pub fn print(&self) -> String {
        let mut out = String::new();
        for e in self.iter() {
            let _ = writeln!(out, "{} -> {} ({:?})", e.old_name, e.new_name, e.lease_expire);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn addr(s: &str) -> NnnAddress {
        s.parse().unwrap()
    }

    #[test]
    fn pairs_are_unique_on_both_sides() {
        let mut nnpt = Nnpt::new();
        nnpt.add_entry(&addr("1.1"), &addr("2.1"), Duration::from_secs(5));
        nnpt.add_entry(&addr("1.2"), &addr("2.1"), Duration::from_secs(6));
        assert_eq!(nnpt.len(), 1);
        assert!(!nnpt.found_old_name(&addr("1.1")));
        assert_eq!(nnpt.find_paired_old_name(&addr("2.1")), Some(&addr("1.2")));
        assert_eq!(nnpt.find_paired_name(&addr("1.2")), Some(&addr("2.1")));
        assert_eq!(nnpt.find_entry(&addr("2.1")).unwrap().old_name, addr("1.2"));
    }

    #[test]
    fn delete_pair_checks_both_names() {
        let mut nnpt = Nnpt::new();
        nnpt.add_entry(&addr("1"), &addr("2"), Duration::from_secs(5));
        assert!(nnpt.delete_pair(&addr("1"), &addr("3")).is_none());
        assert!(nnpt.delete_pair(&addr("1"), &addr("2")).is_some());
        assert!(nnpt.is_empty());
    }

    #[test]
    fn leases_order_expiry() {
        let mut nnpt = Nnpt::new();
        nnpt.add_entry(&addr("1"), &addr("5"), Duration::from_secs(10));
        nnpt.add_entry(&addr("2"), &addr("6"), Duration::from_secs(3));
        assert_eq!(nnpt.next_expiring().unwrap().old_name, addr("2"));

        nnpt.update_lease_time(&addr("2"), Duration::from_secs(20));
        assert_eq!(nnpt.next_expiring().unwrap().old_name, addr("1"));
        assert_eq!(nnpt.find_name_expire_time(&addr("6")), Some(Duration::from_secs(20)));

        let gone = nnpt.clean_expired(Duration::from_secs(10));
        assert_eq!(gone.len(), 1);
        assert!(nnpt.found_new_name(&addr("6")));
        assert!(nnpt.print().contains("2 -> 6"));
    }
}

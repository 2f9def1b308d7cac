//! The 3N names a node currently holds, each with its lease.

use log::{debug, info};
use nnnsim_common::{NnnAddress, Time};
use std::fmt::Write;
use std::time::Duration;

pub const DEFAULT_RENEWAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamesEntry {
    pub name: NnnAddress,
    pub lease_expire: Time,
    pub renew_time: Time,
    /// Fixed names are never cleaned up.
    pub fixed: bool,
    renewal_due: bool,
}

/// What a timer tick asks the owner to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamesEvent {
    /// The newest name reached its renew time; ask for a lease extension.
    Renew(NnnAddress),
    /// The last leased name expired and the node is now unnamed.
    NoName,
}

#[derive(Debug, Clone)]
pub struct NamesContainer {
    entries: Vec<NamesEntry>,
    renewal: Duration,
}

impl Default for NamesContainer {
    fn default() -> Self {
        Self::new(DEFAULT_RENEWAL)
    }
}

impl NamesContainer {
    pub fn new(renewal: Duration) -> Self {
        Self {
            entries: Vec::new(),
            renewal,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set_default_renewal(&mut self, renewal: Duration) {
        self.renewal = renewal;
        for e in self.entries.iter_mut() {
            e.renew_time = e.lease_expire.saturating_sub(renewal);
        }
    }

    pub fn default_renewal(&self) -> Duration {
        self.renewal
    }

    fn sort(&mut self) {
        self.entries
            .sort_by(|a, b| b.lease_expire.cmp(&a.lease_expire).then_with(|| a.name.cmp(&b.name)));
    }

    pub fn add_entry(&mut self, name: NnnAddress, lease_expire: Time, fixed: bool) {
        self.entries.retain(|e| e.name != name);
        info!("Adopting 3N name {} until {:?}", name, lease_expire);
        self.entries.push(NamesEntry {
            renew_time: lease_expire.saturating_sub(self.renewal),
            name,
            lease_expire,
            fixed,
            renewal_due: true,
        });
        self.sort();
    }

    pub fn delete_entry(&mut self, name: &NnnAddress) -> Option<NamesEntry> {
        let pos = self.entries.iter().position(|e| &e.name == name)?;
        Some(self.entries.remove(pos))
    }

    pub fn found_name(&self, name: &NnnAddress) -> bool {
        self.find_entry(name).is_some()
    }

    pub fn find_entry(&self, name: &NnnAddress) -> Option<&NamesEntry> {
        self.entries.iter().find(|e| &e.name == name)
    }

    /// Name with the furthest lease.
    pub fn find_newest_name(&self) -> Option<&NnnAddress> {
        self.entries.first().map(|e| &e.name)
    }

    pub fn update_lease_time(&mut self, name: &NnnAddress, lease_expire: Time) -> bool {
        let renewal = self.renewal;
        let Some(e) = self.entries.iter_mut().find(|e| &e.name == name) else {
            return false;
        };
        e.lease_expire = lease_expire;
        e.renew_time = lease_expire.saturating_sub(renewal);
        e.renewal_due = true;
        self.sort();
        true
    }

    pub fn is_fixed(&self, name: &NnnAddress) -> bool {
        self.find_entry(name).map_or(false, |e| e.fixed)
    }

    pub fn has_fixed_name(&self) -> bool {
        self.entries.iter().any(|e| e.fixed)
    }

    pub fn find_name_expire_time(&self, name: &NnnAddress) -> Option<Time> {
        self.find_entry(name).map(|e| e.lease_expire)
    }

    /// Removes leased names that expired at or before `now`.
    pub fn clean_expired(&mut self, now: Time) -> Vec<NnnAddress> {
        let mut gone = Vec::new();
        self.entries.retain(|e| {
            let keep = e.fixed || e.lease_expire > now;
            if !keep {
                gone.push(e.name.clone());
            }
            keep
        });
        gone
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamesEntry> + '_ {
        self.entries.iter()
    }

    /// Earliest instant at which [`NamesContainer::on_timer`] has work.
    pub fn next_deadline(&self) -> Option<Time> {
        let renewal = self
            .entries
            .first()
            .filter(|e| !e.fixed && e.renewal_due)
            .map(|e| e.renew_time);
        let expiry = self
            .entries
            .iter()
            .filter(|e| !e.fixed)
            .map(|e| e.lease_expire)
            .min();
        match (renewal, expiry) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn on_timer(&mut self, now: Time) -> Vec<NamesEvent> {
        let mut events = Vec::new();
        let had_names = !self.entries.is_empty();
        let gone = self.clean_expired(now);
        if !gone.is_empty() {
            debug!("3N names expired: {:?}", gone);
        }
        if let Some(newest) = self.entries.first_mut() {
            if !newest.fixed && newest.renewal_due && newest.renew_time <= now {
                newest.renewal_due = false;
                events.push(NamesEvent::Renew(newest.name.clone()));
            }
        } else if had_names {
            events.push(NamesEvent::NoName);
        }
        events
    }

    pub fn print(&self) -> String {
        let mut out = String::new();
        for e in &self.entries {
            let _ = writeln!(
                out,
                "{} lease={:?} renew={:?}{}",
                e.name,
                e.lease_expire,
                e.renew_time,
                if e.fixed { " fixed" } else { "" }
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> NnnAddress {
        s.parse().unwrap()
    }

    fn secs(s: u64) -> Time {
        Duration::from_secs(s)
    }

    #[test]
    fn newest_name_has_the_furthest_lease() {
        let mut names = NamesContainer::new(secs(2));
        names.add_entry(addr("1.1"), secs(10), false);
        names.add_entry(addr("1.2"), secs(20), false);
        assert_eq!(names.find_newest_name(), Some(&addr("1.2")));
        assert_eq!(names.find_entry(&addr("1.2")).unwrap().renew_time, secs(18));

        names.update_lease_time(&addr("1.1"), secs(30));
        assert_eq!(names.find_newest_name(), Some(&addr("1.1")));
        assert_eq!(names.find_name_expire_time(&addr("1.1")), Some(secs(30)));
    }

    #[test]
    fn timer_renews_then_reports_no_name() {
        let mut names = NamesContainer::new(secs(2));
        names.add_entry(addr("5"), secs(10), false);
        assert_eq!(names.next_deadline(), Some(secs(8)));

        assert_eq!(names.on_timer(secs(8)), vec![NamesEvent::Renew(addr("5"))]);
        assert!(names.on_timer(secs(9)).is_empty());
        assert_eq!(names.next_deadline(), Some(secs(10)));

        assert_eq!(names.on_timer(secs(10)), vec![NamesEvent::NoName]);
        assert!(names.is_empty());
        assert!(names.on_timer(secs(11)).is_empty());
    }

    #[test]
    fn fixed_names_survive() {
        let mut names = NamesContainer::default();
        names.add_entry(addr("1"), secs(1), true);
        names.add_entry(addr("2"), secs(1), false);
        assert!(names.has_fixed_name());
        assert_eq!(names.clean_expired(secs(5)), vec![addr("2")]);
        assert!(names.is_fixed(&addr("1")));
        assert_eq!(names.next_deadline(), None);
        names.clear();
        assert!(names.print().is_empty());
    }
}

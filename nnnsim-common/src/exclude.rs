//! Interest exclude filter.
//!
//! The filter is a sorted set of boundary components. A boundary flagged
//! `any` excludes every component from itself up to (not including) the next
//! larger boundary; an unflagged boundary excludes just itself.

use crate::error::Error;
use crate::name::NameComponent;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Exclude {
    entries: BTreeMap<NameComponent, bool>,
}

impl Exclude {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Boundaries in ascending order with their `any` flag.
    pub fn iter(&self) -> impl Iterator<Item = (&NameComponent, bool)> {
        self.entries.iter().map(|(c, any)| (c, *any))
    }

    fn floor(&self, comp: &NameComponent) -> Option<(NameComponent, bool)> {
        self.entries
            .range(..=comp.clone())
            .next_back()
            .map(|(c, any)| (c.clone(), *any))
    }

    pub fn is_excluded(&self, comp: &NameComponent) -> bool {
        match self.floor(comp) {
            None => false,
            Some((_, true)) => true,
            Some((boundary, false)) => &boundary == comp,
        }
    }

    pub fn exclude_one(&mut self, comp: NameComponent) -> &mut Self {
        if !self.is_excluded(&comp) {
            self.entries.insert(comp, false);
        }
        self
    }

    /// Excludes every component in `[from, to]`.
    pub fn exclude_range(&mut self, from: NameComponent, to: NameComponent) -> Result<&mut Self, Error> {
        if from >= to {
            return Err(Error::Exclude(format!(
                "Invalid exclude range [{}, {}] (for single name exclude use exclude_one)",
                from, to
            )));
        }

        let start = self.open_range_at(from);

        let (floor_key, floor_any) = self
            .floor(&to)
            .ok_or_else(|| Error::Other("exclude range lost its lower boundary".into()))?;

        if floor_key == start || !floor_any {
            self.entries.entry(to.clone()).or_insert(false);
            self.erase_between(&start, Bound::Excluded(to));
        } else {
            self.erase_between(&start, Bound::Included(floor_key));
        }

        Ok(self)
    }

    /// Excludes every component strictly smaller than or equal to `to`.
    pub fn exclude_before(&mut self, to: NameComponent) -> Result<&mut Self, Error> {
        self.exclude_range(NameComponent::new(Bytes::new()), to)
    }

    /// Excludes `from` and every component after it.
    pub fn exclude_after(&mut self, from: NameComponent) -> &mut Self {
        let start = self.open_range_at(from);
        self.erase_between(&start, Bound::Unbounded);
        self
    }

    /// Makes sure an `any` boundary covers `from` and returns that boundary.
    fn open_range_at(&mut self, from: NameComponent) -> NameComponent {
        match self.floor(&from) {
            Some((boundary, true)) => boundary,
            _ => {
                self.entries.insert(from.clone(), true);
                from
            }
        }
    }

    fn erase_between(&mut self, start: &NameComponent, end: Bound<NameComponent>) {
        let doomed: Vec<NameComponent> = self
            .entries
            .range((Bound::Excluded(start.clone()), end))
            .map(|(c, _)| c.clone())
            .collect();
        for comp in doomed {
            self.entries.remove(&comp);
        }
    }

    /// Inserts a raw boundary, as read from the wire.
    pub fn append_exclude(&mut self, comp: NameComponent, any: bool) {
        self.entries.entry(comp).or_insert(any);
    }
}

impl fmt::Display for Exclude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (comp, any) in &self.entries {
            write!(f, "{} ", comp)?;
            if *any {
                write!(f, "----> ")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(s: &str) -> NameComponent {
        NameComponent::from(s)
    }

    #[test]
    fn exclude_one_matches_only_itself() {
        let mut ex = Exclude::new();
        ex.exclude_one(c("b"));
        assert!(ex.is_excluded(&c("b")));
        assert!(!ex.is_excluded(&c("a")));
        assert!(!ex.is_excluded(&c("c")));
    }

    #[test]
    fn exclude_range_is_inclusive() {
        let mut ex = Exclude::new();
        ex.exclude_range(c("b"), c("d")).unwrap();
        assert!(!ex.is_excluded(&c("a")));
        assert!(ex.is_excluded(&c("b")));
        assert!(ex.is_excluded(&c("c")));
        assert!(ex.is_excluded(&c("d")));
        assert!(!ex.is_excluded(&c("e")));
    }

    #[test]
    fn exclude_range_swallows_inner_boundaries() {
        let mut ex = Exclude::new();
        ex.exclude_one(c("c"));
        ex.exclude_range(c("b"), c("e")).unwrap();
        assert_eq!(ex.len(), 2);
        assert!(ex.is_excluded(&c("c")));
        assert!(!ex.is_excluded(&c("f")));
    }

    #[test]
    fn merging_overlapping_ranges() {
        let mut ex = Exclude::new();
        ex.exclude_range(c("b"), c("d")).unwrap();
        ex.exclude_range(c("c"), c("f")).unwrap();
        for s in ["b", "c", "d", "e", "f"] {
            assert!(ex.is_excluded(&c(s)), "{} should be excluded", s);
        }
        assert!(!ex.is_excluded(&c("g")));
    }

    #[test]
    fn invalid_range() {
        let mut ex = Exclude::new();
        assert!(ex.exclude_range(c("d"), c("b")).is_err());
        assert!(ex.exclude_range(c("b"), c("b")).is_err());
    }

    #[test]
    fn exclude_after_covers_the_tail() {
        let mut ex = Exclude::new();
        ex.exclude_one(c("x"));
        ex.exclude_after(c("m"));
        assert!(!ex.is_excluded(&c("a")));
        assert!(ex.is_excluded(&c("m")));
        assert!(ex.is_excluded(&c("zz")));
        assert_eq!(ex.len(), 1);
    }

    #[test]
    fn exclude_before_covers_the_head() {
        let mut ex = Exclude::new();
        ex.exclude_before(c("m")).unwrap();
        assert!(ex.is_excluded(&c("a")));
        assert!(ex.is_excluded(&c("m")));
        assert!(!ex.is_excluded(&c("n")));
    }
}

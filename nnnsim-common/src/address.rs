//! Hierarchical 3N addresses.
//!
//! An address such as `1.a.3` is a sequence of up to
//! [`MAX_NNN_ADDRESS_COMPONENTS`] hexadecimal labels. Every prefix of an
//! address names a *sector*; `1.a` is the sector that contains `1.a.3`.

use crate::error::Error;
use crate::types::MAX_NNN_ADDRESS_COMPONENTS;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Index};
use std::str::FromStr;

/// Label separator in the textual form.
pub const SEPARATOR: char = '.';

/// A 3N address.
///
/// Ordering is label by label on the numeric value, with a prefix sorting
/// before any longer address it prefixes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NnnAddress {
    labels: Vec<u64>,
}

impl NnnAddress {
    /// Creates the empty address.
    pub fn new() -> Self {
        Self { labels: Vec::new() }
    }

    /// Builds an address from numeric labels.
    pub fn from_labels(labels: impl Into<Vec<u64>>) -> Result<Self, Error> {
        let labels = labels.into();
        if labels.len() > MAX_NNN_ADDRESS_COMPONENTS {
            return Err(Error::NnnAddress(format!(
                "NNN address should not have more than {} labels",
                MAX_NNN_ADDRESS_COMPONENTS
            )));
        }
        Ok(Self { labels })
    }

    /// Parses the dot-hex textual form.
    pub fn parse(s: &str) -> Result<Self, Error> {
        if s.chars().any(|c| c != SEPARATOR && !c.is_ascii_hexdigit()) {
            return Err(Error::NnnAddress(
                "NNN address should be composed of only hexadecimal characters and dots!".into(),
            ));
        }

        if s.matches(SEPARATOR).count() > MAX_NNN_ADDRESS_COMPONENTS - 1 {
            return Err(Error::NnnAddress(format!(
                "NNN address should not have more than {} '.'",
                MAX_NNN_ADDRESS_COMPONENTS - 1
            )));
        }

        let mut labels = Vec::new();
        let mut rest = s;
        while !rest.is_empty() {
            let dots = rest.len() - rest.trim_start_matches(SEPARATOR).len();
            rest = &rest[dots..];

            if dots > 1 || (dots != 0 && rest.is_empty()) {
                return Err(Error::NnnAddress(
                    "NNN address dot must be followed by a hexadecimal number!".into(),
                ));
            }
            if rest.is_empty() {
                break;
            }

            let end = rest.find(SEPARATOR).unwrap_or(rest.len());
            let label = u64::from_str_radix(&rest[..end], 16).map_err(|_| {
                Error::NnnAddress(format!("NNN address label '{}' does not fit in 64 bits", &rest[..end]))
            })?;
            labels.push(label);
            rest = &rest[end..];
        }

        Ok(Self { labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[u64] {
        &self.labels
    }

    /// Returns the label at `index`; negative values count from the end.
    pub fn get(&self, index: isize) -> Result<u64, Error> {
        let len = self.labels.len();
        let resolved = if index < 0 {
            len.checked_sub(index.unsigned_abs())
        } else {
            Some(index as usize)
        };

        resolved
            .and_then(|i| self.labels.get(i).copied())
            .ok_or(Error::AddressOutOfRange { index, len })
    }

    /// Appends a label, returning `self` for chaining.
    pub fn append(mut self, label: u64) -> Result<Self, Error> {
        if !self.can_append_component() {
            return Err(Error::NnnAddress(format!(
                "cannot append to {}: already {} labels",
                self, MAX_NNN_ADDRESS_COMPONENTS
            )));
        }
        self.labels.push(label);
        Ok(self)
    }

    pub fn can_append_component(&self) -> bool {
        self.labels.len() < MAX_NNN_ADDRESS_COMPONENTS
    }

    /// The full address (a copy of `self`).
    pub fn name(&self) -> NnnAddress {
        self.clone()
    }

    /// The sector containing this address: every label but the last.
    pub fn sector_name(&self) -> NnnAddress {
        let mut labels = self.labels.clone();
        labels.pop();
        Self { labels }
    }

    /// The last label as a one-label address.
    pub fn last_label(&self) -> NnnAddress {
        Self {
            labels: self.labels.last().copied().into_iter().collect(),
        }
    }

    pub fn is_toplvl_sector(&self) -> bool {
        self.labels.len() == 1
    }

    /// Both addresses live in the same sector.
    pub fn is_same_sector(&self, other: &NnnAddress) -> bool {
        self.sector_name() == other.sector_name()
    }

    /// `self` lies inside the sector named by `other` (or equals it).
    pub fn is_sub_sector(&self, other: &NnnAddress) -> bool {
        other.labels.len() <= self.labels.len() && self.labels.starts_with(&other.labels)
    }

    /// `self` is a strict ancestor sector of `other`.
    pub fn is_parent_sector(&self, other: &NnnAddress) -> bool {
        other.labels.len() > self.labels.len() && other.labels.starts_with(&self.labels)
    }

    /// Label-by-label comparison where, on a shared prefix, the shorter
    /// address orders *after* the longer one.
    pub fn compare_labels(&self, other: &NnnAddress) -> Ordering {
        match (self.is_empty(), other.is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }

        for (a, b) in self.labels.iter().zip(other.labels.iter()) {
            if a != b {
                return a.cmp(b);
            }
        }

        other.labels.len().cmp(&self.labels.len())
    }

    /// Walks both addresses up their sector chains until they meet.
    ///
    /// When either side is a top-level sector the answer is the first label
    /// of `other`.
    pub fn closest_sector(&self, other: &NnnAddress) -> NnnAddress {
        if self.is_empty() || other.is_empty() {
            return NnnAddress::new();
        }

        if self.is_toplvl_sector() || other.is_toplvl_sector() {
            return Self {
                labels: vec![other.labels[0]],
            };
        }

        match self.cmp(other) {
            Ordering::Equal => self.clone(),
            Ordering::Greater => self.sector_name().closest_sector(other),
            Ordering::Less => self.closest_sector(&other.sector_name()),
        }
    }

    /// Hop distance between two addresses in the sector hierarchy.
    pub fn distance(&self, other: &NnnAddress) -> usize {
        let ordering = self.cmp(other);
        if ordering == Ordering::Equal {
            return 0;
        }

        if self.is_empty() {
            return other.len();
        }
        if other.is_empty() {
            return self.len();
        }

        let same_root = self.labels[0] == other.labels[0];
        if self.is_toplvl_sector() {
            return if same_root { other.len() - 1 } else { other.len() };
        }
        if other.is_toplvl_sector() {
            return if same_root { self.len() - 1 } else { self.len() };
        }

        let (s1, s2) = (self.len(), other.len());
        if s1 == s2 {
            if self.is_same_sector(other) {
                return 2;
            }
            if ordering == Ordering::Greater {
                self.sector_name().distance(other) + 1
            } else {
                self.distance(&other.sector_name()) + 1
            }
        } else if s1 > s2 {
            self.sector_name().distance(other) + 1
        } else {
            self.distance(&other.sector_name()) + 1
        }
    }

    /// Dot-hex textual form.
    pub fn to_dot_hex(&self) -> String {
        self.to_string()
    }
}

impl Index<usize> for NnnAddress {
    type Output = u64;

    fn index(&self, index: usize) -> &u64 {
        &self.labels[index]
    }
}

impl Add for &NnnAddress {
    type Output = NnnAddress;

    /// Concatenation; labels beyond the maximum depth are dropped.
    fn add(self, rhs: &NnnAddress) -> NnnAddress {
        let labels = self
            .labels
            .iter()
            .chain(rhs.labels.iter())
            .copied()
            .take(MAX_NNN_ADDRESS_COMPONENTS)
            .collect();
        NnnAddress { labels }
    }
}

impl FromStr for NnnAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NnnAddress::parse(s)
    }
}

impl fmt::Display for NnnAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, label) in self.labels.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", SEPARATOR)?;
            }
            write!(f, "{:x}", label)?;
        }
        Ok(())
    }
}

impl Serialize for NnnAddress {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for NnnAddress {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let text = String::deserialize(d)?;
        NnnAddress::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> NnnAddress {
        s.parse().unwrap()
    }

    #[test]
    fn parses_dot_hex() {
        let a = addr("1.a.ff");
        assert_eq!(a.labels(), &[1, 10, 255]);
        assert_eq!(a.to_string(), "1.a.ff");
        assert!(addr("").is_empty());
        // a single leading dot is tolerated
        assert_eq!(addr(".1.2"), addr("1.2"));
    }

    #[test]
    fn rejects_malformed() {
        assert!(NnnAddress::parse("1.g").is_err());
        assert!(NnnAddress::parse("1..2").is_err());
        assert!(NnnAddress::parse("1.2.").is_err());
        assert!(NnnAddress::parse("1-2").is_err());
        let too_deep = vec!["1"; 17].join(".");
        assert!(NnnAddress::parse(&too_deep).is_err());
        let max_depth = vec!["1"; 16].join(".");
        assert_eq!(NnnAddress::parse(&max_depth).unwrap().len(), 16);
    }

    #[test]
    fn indexing() {
        let a = addr("1.2.3");
        assert_eq!(a.get(0).unwrap(), 1);
        assert_eq!(a.get(-1).unwrap(), 3);
        assert_eq!(a.get(-3).unwrap(), 1);
        assert!(matches!(
            a.get(3),
            Err(Error::AddressOutOfRange { index: 3, len: 3 })
        ));
        assert!(a.get(-4).is_err());
    }

    #[test]
    fn sector_relations() {
        let a = addr("1.2.3");
        assert_eq!(a.sector_name(), addr("1.2"));
        assert_eq!(a.last_label(), addr("3"));
        assert!(a.is_same_sector(&addr("1.2.7")));
        assert!(!a.is_same_sector(&addr("1.3.3")));
        assert!(a.is_sub_sector(&addr("1.2")));
        assert!(a.is_sub_sector(&addr("1.2.3")));
        assert!(!addr("1.2").is_sub_sector(&a));
        assert!(addr("1.2").is_parent_sector(&a));
        assert!(!a.is_parent_sector(&a));
        assert!(addr("4").is_toplvl_sector());
    }

    #[test]
    fn ordering_is_numeric() {
        assert!(addr("1.2") < addr("1.2.3"));
        assert!(addr("1.9") < addr("1.a"));
        assert!(addr("2") > addr("1.f.f"));
        assert_eq!(addr("1.2").compare_labels(&addr("1.2.3")), Ordering::Greater);
        assert_eq!(addr("1.2").compare_labels(&addr("1.3")), Ordering::Less);
    }

    #[test]
    fn distance_between_sectors() {
        assert_eq!(addr("1.2.3").distance(&addr("1.2.3")), 0);
        assert_eq!(addr("1.2").distance(&addr("1.2.3")), 1);
        assert_eq!(addr("1.2.3").distance(&addr("1.2")), 1);
        assert_eq!(addr("1.2.3").distance(&addr("1.2.4")), 2);
        assert_eq!(addr("1").distance(&addr("1.2.3")), 2);
        assert_eq!(addr("1").distance(&addr("2.2.3")), 3);
        assert_eq!(addr("1.2.3").distance(&addr("1.4.5")), 4);
    }

    #[test]
    fn closest_sector() {
        assert_eq!(addr("1.2.3").closest_sector(&addr("1.2.3")), addr("1.2.3"));
        assert_eq!(addr("1.2.3").closest_sector(&addr("1.2.4")), addr("1.2"));
        assert_eq!(addr("1.2.3").closest_sector(&addr("1.5")), addr("1"));
        assert_eq!(addr("1.2.3").closest_sector(&addr("1.2.3.4")), addr("1.2.3"));
        assert_eq!(addr("3").closest_sector(&addr("1.2")), addr("1"));
        assert!(addr("1.2").closest_sector(&NnnAddress::new()).is_empty());
    }

    #[test]
    fn concatenation() {
        assert_eq!(&addr("1.2") + &addr("3"), addr("1.2.3"));
        let full = NnnAddress::from_labels(vec![1u64; 16]).unwrap();
        assert!(!full.can_append_component());
        assert!(full.clone().append(2).is_err());
        assert_eq!((&full + &addr("2")).len(), 16);
    }

    #[test]
    fn serde_as_string() {
        let json = serde_json::to_string(&addr("1.a")).unwrap();
        assert_eq!(json, "\"1.a\"");
        let back: NnnAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr("1.a"));
    }
}

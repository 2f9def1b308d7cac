//! ICN names.
//!
//! A [`Name`] is a flat sequence of opaque components. Components compare in
//! canonical order (shorter first, then byte-wise), which is the order the
//! prefix tries keep children in.

use crate::error::Error;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Leading byte of a component that carries a sequence number.
pub const SEQ_NUM_MARKER: u8 = 0x00;

const SEQ_URI_PREFIX: &str = "%seq=";

/// Represents an ICN name component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameComponent(pub Bytes);

impl NameComponent {
    /// Creates a new name component from a byte slice.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Creates a component holding a sequence number.
    pub fn from_seq_num(seq: u64) -> Self {
        let mut buf = BytesMut::with_capacity(9);
        buf.put_u8(SEQ_NUM_MARKER);
        buf.put_u64(seq);
        Self(buf.freeze())
    }

    /// Returns the sequence number if this component was built by
    /// [`NameComponent::from_seq_num`].
    pub fn to_seq_num(&self) -> Option<u64> {
        if self.0.len() != 9 || self.0[0] != SEQ_NUM_MARKER {
            return None;
        }
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.0[1..]);
        Some(u64::from_be_bytes(raw))
    }

    /// Returns the component as bytes.
    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for NameComponent {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl Ord for NameComponent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.as_ref().cmp(other.0.as_ref()))
    }
}

impl PartialOrd for NameComponent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(seq) = self.to_seq_num() {
            return write!(f, "{}{}", SEQ_URI_PREFIX, seq);
        }

        // Print printable ASCII characters directly, otherwise use hex
        let printable = self
            .0
            .iter()
            .all(|&b| (b.is_ascii_graphic() && b != b'/') || b == b' ');

        if printable {
            write!(f, "{}", String::from_utf8_lossy(&self.0))
        } else {
            write!(f, "0x")?;
            for &b in self.0.iter() {
                write!(f, "{:02x}", b)?;
            }
            Ok(())
        }
    }
}

/// Represents an ICN name, which is a sequence of name components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Name {
    components: Vec<NameComponent>,
}

impl Name {
    /// Creates a new empty name.
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Parses a `/`-separated URI such as `/waseda/satolab/%seq=0`.
    pub fn from_uri(uri: &str) -> Result<Self, Error> {
        let mut components = Vec::new();
        for comp in uri.split('/').filter(|comp| !comp.is_empty()) {
            if let Some(seq) = comp.strip_prefix(SEQ_URI_PREFIX) {
                let seq = seq
                    .parse::<u64>()
                    .map_err(|_| Error::Name(format!("invalid sequence number in '{}'", uri)))?;
                components.push(NameComponent::from_seq_num(seq));
            } else if let Some(hex) = comp.strip_prefix("0x") {
                components.push(NameComponent::new(decode_hex(hex).ok_or_else(|| {
                    Error::Name(format!("invalid hex component '{}' in '{}'", comp, uri))
                })?));
            } else {
                components.push(NameComponent::from(comp));
            }
        }

        Ok(Self { components })
    }

    /// Builds a name from already-split components.
    pub fn from_components(components: Vec<NameComponent>) -> Self {
        Self { components }
    }

    /// Adds a component to the name.
    pub fn push(&mut self, component: NameComponent) -> &mut Self {
        self.components.push(component);
        self
    }

    /// Returns a copy of this name with `component` appended.
    pub fn append(mut self, component: impl Into<NameComponent>) -> Self {
        self.components.push(component.into());
        self
    }

    /// Returns a copy of this name with every component of `other` appended.
    pub fn concat(&self, other: &Name) -> Self {
        let mut components = self.components.clone();
        components.extend(other.components.iter().cloned());
        Self { components }
    }

    /// Returns a copy of this name with a sequence-number component appended.
    pub fn append_seq_num(&self, seq: u64) -> Self {
        let mut name = self.clone();
        name.push(NameComponent::from_seq_num(seq));
        name
    }

    /// Returns the number of components in the name.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns true if the name has no components.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns the name components.
    pub fn components(&self) -> &[NameComponent] {
        &self.components
    }

    /// Gets a component; negative indexes count from the end.
    pub fn get(&self, index: isize) -> Option<&NameComponent> {
        let idx = if index < 0 {
            self.components.len().checked_sub(index.unsigned_abs())?
        } else {
            index as usize
        };
        self.components.get(idx)
    }

    /// Returns the last component, if any.
    pub fn last(&self) -> Option<&NameComponent> {
        self.components.last()
    }

    /// Returns a prefix of this name with the specified length.
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            components: self.components.iter().take(len).cloned().collect(),
        }
    }

    /// Checks if this name is a prefix of another name.
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.len() <= other.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| a == b)
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.components.iter().zip(other.components.iter()) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                non_eq => return non_eq,
            }
        }
        self.components.len().cmp(&other.components.len())
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Name::from_uri(s)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }

        for component in &self.components {
            write!(f, "/{}", component)?;
        }

        Ok(())
    }
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Names serialize as their URI.
impl Serialize for Name {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let uri = String::deserialize(d)?;
        Name::from_uri(&uri).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_creation() {
        let name = Name::from_uri("/test/data/1").unwrap();

        assert_eq!(name.components().len(), 3);
        assert_eq!(name.components()[0].as_bytes().as_ref(), b"test");
        assert_eq!(name.components()[2].as_bytes().as_ref(), b"1");
        assert_eq!(name.to_string(), "/test/data/1");
        assert_eq!(Name::new().to_string(), "/");
    }

    #[test]
    fn test_seq_num_component() {
        let name = Name::from_uri("/waseda/satolab").unwrap().append_seq_num(0);
        assert_eq!(name.to_string(), "/waseda/satolab/%seq=0");
        assert_eq!(name.last().and_then(|c| c.to_seq_num()), Some(0));

        let parsed: Name = "/waseda/satolab/%seq=0".parse().unwrap();
        assert_eq!(parsed, name);
        assert!(Name::from_uri("/a/%seq=x").is_err());
    }

    #[test]
    fn test_name_compare() {
        let name1 = Name::from_uri("/a/b/c").unwrap();
        let name3 = Name::from_uri("/a/b/d").unwrap();
        let name4 = Name::from_uri("/a/b").unwrap();

        assert!(name4.is_prefix_of(&name1));
        assert!(!name1.is_prefix_of(&name4));
        assert!(!name3.is_prefix_of(&name1));

        assert!(name4 < name1);
        assert!(name1 < name3);
    }

    #[test]
    fn test_component_canonical_order() {
        // shorter components sort first regardless of content
        assert!(NameComponent::from("z") < NameComponent::from("aa"));
        assert!(NameComponent::from("ab") < NameComponent::from("ac"));
    }

    #[test]
    fn test_negative_index() {
        let name = Name::from_uri("/a/b/c").unwrap();
        assert_eq!(name.get(-1), Some(&NameComponent::from("c")));
        assert_eq!(name.get(0), Some(&NameComponent::from("a")));
        assert_eq!(name.get(-4), None);
        assert_eq!(name.get(3), None);
    }

    #[test]
    fn test_binary_component_roundtrip_through_uri() {
        let name = Name::new().append(NameComponent::new(vec![0x01u8, 0xff]));
        assert_eq!(name.to_string(), "/0x01ff");
        assert_eq!(Name::from_uri("/0x01ff").unwrap(), name);
    }
}

//! Identifiers and small value types shared across the 3N stack.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr};
use std::time::Duration;

/// Simulated time, measured from the start of the simulation.
pub type Time = Duration;

/// Maximum number of labels in a 3N address.
pub const MAX_NNN_ADDRESS_COMPONENTS: usize = 16;

/// Maximum length of an ICN name component.
pub const MAX_NAME_COMPONENT_LENGTH: usize = 65_535;

/// Maximum size of a PDU on the wire.
pub const MAX_PDU_SIZE: usize = 8800;

/// Current 3N PDU version.
pub const NNN_PDU_VERSION: u16 = 1;

/// Routing cost that marks a face as unreachable.
pub const INFINITE_COST: u16 = u16::MAX;

/// Identifier of a simulated node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Unique identifier for a face within one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FaceId(pub u32);

impl fmt::Display for FaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FaceId({})", self.0)
    }
}

/// Face type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum FaceType {
    /// Point-to-point network device.
    NetDevice = 0,
    /// Internal application face.
    App = 1,
}

/// Capability flags attached to a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FaceFlags(pub u8);

impl FaceFlags {
    pub const NONE: FaceFlags = FaceFlags(0);
    pub const NNN: FaceFlags = FaceFlags(1);
    pub const APPLICATION: FaceFlags = FaceFlags(2);
    pub const ICN: FaceFlags = FaceFlags(4);

    pub fn contains(self, other: FaceFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for FaceFlags {
    type Output = FaceFlags;

    fn bitor(self, rhs: FaceFlags) -> FaceFlags {
        FaceFlags(self.0 | rhs.0)
    }
}

impl BitAnd for FaceFlags {
    type Output = FaceFlags;

    fn bitand(self, rhs: FaceFlags) -> FaceFlags {
        FaceFlags(self.0 & rhs.0)
    }
}

/// Point of attachment: the link-layer address of a face.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Poa(pub Bytes);

impl Poa {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Builds a 48-bit MAC-style address from the low bytes of `value`.
    pub fn from_u64(value: u64) -> Self {
        let bytes = value.to_be_bytes();
        Self(Bytes::copy_from_slice(&bytes[2..]))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Poa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poa_prints_as_mac() {
        assert_eq!(Poa::from_u64(1).to_string(), "00:00:00:00:00:01");
        assert_eq!(Poa::from_u64(0xabcdef).to_string(), "00:00:00:ab:cd:ef");
    }

    #[test]
    fn face_flags_combine() {
        let flags = FaceFlags::NNN | FaceFlags::APPLICATION;
        assert!(flags.contains(FaceFlags::APPLICATION));
        assert!(!flags.contains(FaceFlags::ICN));
    }
}

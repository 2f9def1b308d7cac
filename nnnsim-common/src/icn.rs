//! ICN Interest and Data packets.
//!
//! These travel as the payload of 3N data PDUs (NULLp, SO, DO, DU).

use crate::exclude::Exclude;
use crate::name::Name;
use crate::types::Time;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Interest lifetime.
pub const DEFAULT_INTEREST_LIFETIME: Duration = Duration::from_secs(4);

/// Interest NACK kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum NackType {
    /// A regular Interest, not a NACK.
    NormalInterest = 0,
    /// The Interest looped back to a node that already saw its nonce.
    Loop = 10,
    /// The Interest could not be forwarded because of congestion.
    Congestion = 11,
    /// The node gave up on the PIT entry (no route or all faces failed).
    GiveupPit = 12,
}

impl NackType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(NackType::NormalInterest),
            10 => Some(NackType::Loop),
            11 => Some(NackType::Congestion),
            12 => Some(NackType::GiveupPit),
            _ => None,
        }
    }
}

/// Transient per-hop annotations. Never encoded on the wire and never kept
/// in the Content Store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketTags {
    /// Number of hops the packet travelled so far.
    pub hop_count: Option<u32>,
}

impl PacketTags {
    pub fn is_empty(&self) -> bool {
        self.hop_count.is_none()
    }
}

/// Represents an ICN Interest packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interest {
    /// The name requested in the Interest.
    pub name: Name,

    /// A nonce value to detect loops.
    pub nonce: u32,

    /// Forwarding scope; `None` means unlimited.
    pub scope: Option<u8>,

    /// NACK marker.
    pub nack: NackType,

    /// Interest lifetime.
    pub lifetime: Duration,

    /// Optional exclude filter applied to the component after `name`.
    pub exclude: Option<Exclude>,

    #[serde(skip)]
    pub tags: PacketTags,
}

impl Interest {
    /// Creates a new Interest packet.
    pub fn new(name: Name) -> Self {
        Self {
            name,
            nonce: 0,
            scope: None,
            nack: NackType::NormalInterest,
            lifetime: DEFAULT_INTEREST_LIFETIME,
            exclude: None,
            tags: PacketTags::default(),
        }
    }

    /// Sets the Interest lifetime.
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Sets the nonce value.
    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn with_scope(mut self, scope: u8) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_exclude(mut self, exclude: Exclude) -> Self {
        self.exclude = Some(exclude);
        self
    }

    pub fn with_nack(mut self, nack: NackType) -> Self {
        self.nack = nack;
        self
    }

    pub fn is_nack(&self) -> bool {
        self.nack != NackType::NormalInterest
    }
}

/// Represents an ICN Data packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Data {
    /// The name of the Data packet.
    pub name: Name,

    /// The content of the Data packet.
    pub payload: Bytes,

    /// How long caches may serve this Data; zero means no expiry.
    pub freshness: Duration,

    /// Production time.
    pub timestamp: Time,

    /// Opaque signature bits; zero means unsigned.
    pub signature: u32,

    /// Name of the signing key, if any.
    pub key_locator: Option<Name>,

    #[serde(skip)]
    pub tags: PacketTags,
}

impl Data {
    /// Creates a new Data packet.
    pub fn new(name: Name, payload: impl Into<Bytes>) -> Self {
        Self {
            name,
            payload: payload.into(),
            freshness: Duration::ZERO,
            timestamp: Duration::ZERO,
            signature: 0,
            key_locator: None,
            tags: PacketTags::default(),
        }
    }

    /// Sets the freshness period.
    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }

    pub fn with_timestamp(mut self, timestamp: Time) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_signature(mut self, signature: u32) -> Self {
        self.signature = signature;
        self
    }

    pub fn with_key_locator(mut self, key_locator: Name) -> Self {
        self.key_locator = Some(key_locator);
        self
    }

    /// Freshness as an optional value (`None` when unlimited).
    pub fn freshness_period(&self) -> Option<Duration> {
        (!self.freshness.is_zero()).then_some(self.freshness)
    }

    /// Returns a copy with all transient tags removed.
    pub fn stripped(&self) -> Self {
        let mut copy = self.clone();
        copy.tags = PacketTags::default();
        copy
    }
}

/// An ICN packet of either kind.
#[derive(Debug, Clone, PartialEq)]
pub enum IcnPacket {
    Interest(Interest),
    Data(Data),
}

impl IcnPacket {
    pub fn name(&self) -> &Name {
        match self {
            IcnPacket::Interest(interest) => &interest.name,
            IcnPacket::Data(data) => &data.name,
        }
    }

    /// Get the type of the packet as a string
    pub fn packet_type(&self) -> &'static str {
        match self {
            IcnPacket::Interest(i) if i.is_nack() => "Nack",
            IcnPacket::Interest(_) => "Interest",
            IcnPacket::Data(_) => "Data",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interest_builder() {
        let interest = Interest::new(Name::from_uri("/a/b").unwrap())
            .with_nonce(42)
            .with_lifetime(Duration::from_secs(2))
            .with_nack(NackType::GiveupPit);
        assert_eq!(interest.nonce, 42);
        assert_eq!(interest.lifetime, Duration::from_secs(2));
        assert!(interest.is_nack());
        assert_eq!(IcnPacket::Interest(interest).packet_type(), "Nack");
    }

    #[test]
    fn data_stripped_drops_tags() {
        let mut data = Data::new(Name::from_uri("/a").unwrap(), &b"x"[..]);
        data.tags.hop_count = Some(3);
        let copy = data.stripped();
        assert!(copy.tags.is_empty());
        assert_eq!(copy.payload, data.payload);
        assert_eq!(data.freshness_period(), None);
        assert_eq!(
            data.with_freshness(Duration::from_secs(1)).freshness_period(),
            Some(Duration::from_secs(1))
        );
    }

    #[test]
    fn nack_type_codes() {
        for nack in [NackType::NormalInterest, NackType::Loop, NackType::Congestion, NackType::GiveupPit] {
            assert_eq!(NackType::from_u8(nack as u8), Some(nack));
        }
        assert_eq!(NackType::from_u8(7), None);
    }
}

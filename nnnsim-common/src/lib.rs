//! Common types for the nnnsim 3N network stack.
//!
//! This crate holds the vocabulary every other part of the stack speaks:
//! ICN names and 3N addresses, Interest/Data packets, the 3N PDU family,
//! their wire formats, the error type and the metric primitives.

pub mod address;
pub mod error;
pub mod exclude;
pub mod icn;
pub mod metrics;
pub mod name;
pub mod pdu;
pub mod time;
pub mod types;
pub mod wire;

/// Reexport of common types
pub use address::NnnAddress;
pub use error::Error;
pub use exclude::Exclude;
pub use icn::{Data, IcnPacket, Interest, NackType};
pub use name::{Name, NameComponent};
pub use pdu::{Pdu, PduKind};
pub use types::{FaceFlags, FaceId, NodeId, Poa, Time};
pub use wire::WireFormat;

pub type Result<T> = std::result::Result<T, Error>;

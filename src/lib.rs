//! nnnsim: a 3N (Named Node Networking) data plane.
//!
//! This crate re-exports the workspace members. [`nnnsim_common`] holds
//! names, addresses, PDUs and their wire formats; [`nnnsim_core`] holds the
//! forwarding tables, nodes, applications and the simulator.

pub use nnnsim_common;
pub use nnnsim_core;

pub use nnnsim_common::{Data, Interest, Name, NnnAddress, Pdu, PduKind};
pub use nnnsim_core::{Node, NodeConfig, ScenarioConfig, Simulator};

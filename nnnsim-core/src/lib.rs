//! Data plane of the nnnsim 3N stack.
//!
//! Nodes forward ICN Interests and Data over named faces while 3N names,
//! handed out by neighbours through the enrollment exchange, let PDUs reach
//! nodes that move. The [`sim::Simulator`] drives any number of nodes over
//! point-to-point links with a discrete-event clock.

pub mod app;
pub mod config;
pub mod cs;
pub mod face;
pub mod fib;
pub mod names;
pub mod nnpt;
pub mod nnst;
pub mod node;
pub mod pdu_buffer;
pub mod pit;
pub mod policy;
pub mod rtt;
pub mod scheduler;
pub mod sim;
pub mod strategy;
pub mod trace;
pub mod trie;

pub use app::{App, AppContext, AppId, ConsumerCbr, Producer};
pub use config::{NodeConfig, ScenarioConfig};
pub use cs::{create_content_store, ContentStore};
pub use face::{Face, FaceKind};
pub use fib::{FaceStatus, Fib, FibEntry};
pub use names::NamesContainer;
pub use nnpt::Nnpt;
pub use nnst::Nnst;
pub use node::{Node, NodeReport};
pub use pdu_buffer::PduBuffer;
pub use pit::{Pit, PitEntry};
pub use policy::PolicyRegistry;
pub use scheduler::{EventKind, EventQueue, Scheduler};
pub use sim::Simulator;
pub use strategy::ForwardingStrategy;
pub use trace::{TraceEvent, TraceRecord, Tracer};

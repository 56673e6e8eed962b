//! Directional flow registries.
//!
//! # Architecture
//!
//! ```text
//! FlowInfo ──> FlowKey::from_flow_info(ignore_destination_port)
//!                  │
//!                  ▼
//!          FlowRegistry<Rx | Tx>  ── link/unlink ──> InterfaceRegistry
//!                  │
//!                  └──> TableProjector ──> TableStore (RX_FLOWS / TX_FLOWS)
//! ```
//!
//! One generic registry type is instantiated per direction. The direction is
//! a type parameter, so an RX registry can never hold a TX flow.

mod registry;
mod types;

pub use registry::{FlowRegistry, IncomingFlows, OutgoingFlows};
pub use types::{DirectionTag, Flow, FlowKey, Rx, Tx};

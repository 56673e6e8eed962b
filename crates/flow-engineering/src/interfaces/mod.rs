//! Interfaces known to the host and the flows bound to each of them.
//!
//! The registry is the single owner of per-interface flow bindings. Only the
//! flow registries mutate those bindings, through crate-internal
//! `link_flow`/`unlink_flow`, so an interface's flow sets always mirror the
//! contents of the RX and TX registries.

mod registry;
mod types;

pub use registry::InterfaceRegistry;
pub use types::Interface;

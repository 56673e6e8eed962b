//! Value types shared between a flow engineering host and the reconciliation
//! engine.
//!
//! - [`FlowDirection`]: RX (incoming) or TX (outgoing)
//! - [`Endpoint`]: an IP address with an optional transport port
//! - [`FlowInfo`]: one flow entry of an inter-application message
//! - [`FlowInfoMessage`]: a batch of flow entries sharing one [`ActionType`]
//! - [`AdminState`] / [`OperState`]: interface state as reported by the host

mod endpoint;
mod flow;
mod interface;
mod message;

pub use endpoint::Endpoint;
pub use flow::{FlowDirection, FlowInfo};
pub use interface::{AdminState, OperState};
pub use message::{ActionType, FlowInfoMessage};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid endpoint format: {0}")]
    InvalidEndpoint(String),

    #[error("invalid flow direction: {0}")]
    InvalidDirection(String),

    #[error("invalid admin state: {0}")]
    InvalidAdminState(String),

    #[error("invalid oper state: {0}")]
    InvalidOperState(String),

    #[error("malformed flow info message: {0}")]
    InvalidMessage(String),
}

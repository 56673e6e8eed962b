//! Flow direction and the per-flow entry carried by inter-application messages.

use crate::{Endpoint, ParseError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Direction of a media flow relative to the managed element.
///
/// A flow belongs to exactly one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowDirection {
    /// Incoming flow.
    #[serde(alias = "RX", alias = "Rx")]
    Rx,
    /// Outgoing flow.
    #[serde(alias = "TX", alias = "Tx")]
    Tx,
}

impl FlowDirection {
    /// Returns the string representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Rx => "rx",
            Self::Tx => "tx",
        }
    }
}

impl fmt::Display for FlowDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowDirection {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rx" | "in" | "incoming" => Ok(Self::Rx),
            "tx" | "out" | "outgoing" => Ok(Self::Tx),
            _ => Err(ParseError::InvalidDirection(s.to_string())),
        }
    }
}

/// One flow entry of a reconciliation message.
///
/// Identity fields are `direction`, `interface`, `source`, and `destination`.
/// The remaining fields are mutable attributes refreshed on every
/// create/update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowInfo {
    pub direction: FlowDirection,
    /// Name of the interface the flow is bound to.
    pub interface: String,
    pub source: Endpoint,
    pub destination: Endpoint,
    /// Name of the system that provisioned the flow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Expected bitrate in Mbps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_bitrate: Option<f64>,
    /// Protocol-specific attributes (labels, transport type, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl FlowInfo {
    /// Creates a flow entry with no optional attributes.
    pub fn new(
        direction: FlowDirection,
        interface: impl Into<String>,
        source: Endpoint,
        destination: Endpoint,
    ) -> Self {
        Self {
            direction,
            interface: interface.into(),
            source,
            destination,
            provider: None,
            expected_bitrate: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_expected_bitrate(mut self, mbps: f64) -> Self {
        self.expected_bitrate = Some(mbps);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns the destination port, if the entry carries one.
    pub fn destination_port(&self) -> Option<u16> {
        self.destination.port()
    }
}

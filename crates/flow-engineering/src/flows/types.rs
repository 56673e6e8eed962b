//! Flow identity and state.

use flow_types::{Endpoint, FlowDirection, FlowInfo};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

/// Direction tag of a [`FlowRegistry`](super::FlowRegistry) instance.
pub trait DirectionTag: fmt::Debug + 'static {
    const DIRECTION: FlowDirection;
}

/// Tag for the incoming (RX) registry.
#[derive(Debug)]
pub enum Rx {}

/// Tag for the outgoing (TX) registry.
#[derive(Debug)]
pub enum Tx {}

impl DirectionTag for Rx {
    const DIRECTION: FlowDirection = FlowDirection::Rx;
}

impl DirectionTag for Tx {
    const DIRECTION: FlowDirection = FlowDirection::Tx;
}

/// Composite identity of a flow within its direction's registry.
///
/// Derived from the direction, the source address and the destination
/// endpoint. When the destination port is ignored the port component is
/// absent, so entries differing only in destination port map to the same
/// key. The owning interface is an attribute of the [`Flow`], not part of
/// its identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FlowKey {
    direction: FlowDirection,
    source: IpAddr,
    destination: IpAddr,
    destination_port: Option<u16>,
}

impl FlowKey {
    /// Computes the key of a flow entry.
    pub fn from_flow_info(info: &FlowInfo, ignore_destination_port: bool) -> Self {
        Self {
            direction: info.direction,
            source: info.source.ip(),
            destination: info.destination.ip(),
            destination_port: if ignore_destination_port {
                None
            } else {
                info.destination.port()
            },
        }
    }

    pub fn direction(&self) -> FlowDirection {
        self.direction
    }

    pub fn source(&self) -> IpAddr {
        self.source
    }

    pub fn destination(&self) -> IpAddr {
        self.destination
    }

    pub fn destination_port(&self) -> Option<u16> {
        self.destination_port
    }
}

/// Formats as `<source>/<destination>[:<port>]`.
impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let destination = match self.destination_port {
            Some(port) => Endpoint::with_port(self.destination, port),
            None => Endpoint::new(self.destination),
        };
        write!(f, "{}/{}", self.source, destination)
    }
}

/// A flow held by a registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Flow {
    key: FlowKey,
    interface: String,
    source: Endpoint,
    destination: Endpoint,
    provider: Option<String>,
    expected_bitrate: Option<f64>,
    metadata: BTreeMap<String, String>,
}

impl Flow {
    pub(crate) fn new(key: FlowKey, info: &FlowInfo) -> Self {
        let mut flow = Self {
            key,
            interface: info.interface.clone(),
            source: info.source,
            destination: info.destination,
            provider: None,
            expected_bitrate: None,
            metadata: BTreeMap::new(),
        };
        flow.apply(info);
        flow
    }

    /// Refreshes the mutable attributes from a flow entry with the same key.
    ///
    /// The caller moves the interface binding when `info.interface` differs.
    pub(crate) fn apply(&mut self, info: &FlowInfo) {
        self.interface.clone_from(&info.interface);
        self.source = info.source;
        self.destination = info.destination;
        self.provider = info.provider.clone();
        self.expected_bitrate = info.expected_bitrate;
        self.metadata = info.metadata.clone();
    }

    pub fn key(&self) -> &FlowKey {
        &self.key
    }

    pub fn direction(&self) -> FlowDirection {
        self.key.direction
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn source(&self) -> Endpoint {
        self.source
    }

    pub fn destination(&self) -> Endpoint {
        self.destination
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// Expected bitrate in Mbps.
    pub fn expected_bitrate(&self) -> Option<f64> {
        self.expected_bitrate
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// True when the key was computed with the destination port ignored.
    pub fn ignores_destination_port(&self) -> bool {
        self.key.destination_port.is_none() && self.destination.port().is_some()
    }

    /// Rebuilds the flow entry this flow was registered from.
    pub fn to_flow_info(&self) -> FlowInfo {
        FlowInfo {
            direction: self.key.direction,
            interface: self.interface.clone(),
            source: self.source,
            destination: self.destination,
            provider: self.provider.clone(),
            expected_bitrate: self.expected_bitrate,
            metadata: self.metadata.clone(),
        }
    }
}

//! Transport endpoint (IP address plus optional port) with safe parsing.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

/// One side of a flow's addressing tuple.
///
/// Serialized in its text form: `10.0.0.1`, `10.0.0.1:5000`,
/// `2001:db8::1` or `[2001:db8::1]:5000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    ip: IpAddr,
    port: Option<u16>,
}

impl Endpoint {
    /// Creates an endpoint without a port.
    pub const fn new(ip: IpAddr) -> Self {
        Endpoint { ip, port: None }
    }

    /// Creates an endpoint with a port.
    pub const fn with_port(ip: IpAddr, port: u16) -> Self {
        Endpoint {
            ip,
            port: Some(port),
        }
    }

    pub const fn ip(&self) -> IpAddr {
        self.ip
    }

    pub const fn port(&self) -> Option<u16> {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.ip, self.port) {
            (ip, None) => ip.fmt(f),
            (IpAddr::V4(ip), Some(port)) => write!(f, "{}:{}", ip, port),
            (IpAddr::V6(ip), Some(port)) => write!(f, "[{}]:{}", ip, port),
        }
    }
}

impl FromStr for Endpoint {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(Endpoint::with_port(addr.ip(), addr.port()));
        }

        // Bracketed IPv6 without a port, e.g. "[::1]"
        let bare = s
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .unwrap_or(s);

        bare.parse::<IpAddr>()
            .map(Endpoint::new)
            .map_err(|_| ParseError::InvalidEndpoint(s.to_string()))
    }
}

impl TryFrom<String> for Endpoint {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.to_string()
    }
}

impl From<IpAddr> for Endpoint {
    fn from(ip: IpAddr) -> Self {
        Endpoint::new(ip)
    }
}

impl From<Ipv4Addr> for Endpoint {
    fn from(ip: Ipv4Addr) -> Self {
        Endpoint::new(IpAddr::V4(ip))
    }
}

impl From<Ipv6Addr> for Endpoint {
    fn from(ip: Ipv6Addr) -> Self {
        Endpoint::new(IpAddr::V6(ip))
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Endpoint::with_port(addr.ip(), addr.port())
    }
}

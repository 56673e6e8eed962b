//! Interface state reported by the hosting element.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Administrative state of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminState {
    /// Interface is administratively up (flows may be bound to it).
    #[default]
    Up,
    /// Interface is administratively down.
    Down,
}

impl AdminState {
    pub const fn is_up(&self) -> bool {
        matches!(self, AdminState::Up)
    }
}

impl fmt::Display for AdminState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminState::Up => write!(f, "up"),
            AdminState::Down => write!(f, "down"),
        }
    }
}

impl FromStr for AdminState {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "up" | "enabled" => Ok(AdminState::Up),
            "down" | "disabled" => Ok(AdminState::Down),
            _ => Err(ParseError::InvalidAdminState(s.to_string())),
        }
    }
}

/// Operational state of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperState {
    Up,
    Down,
    /// The host has not reported a state yet.
    #[default]
    Unknown,
    /// The interface is configured but the hardware is absent.
    NotPresent,
}

impl OperState {
    pub const fn is_up(&self) -> bool {
        matches!(self, OperState::Up)
    }
}

impl fmt::Display for OperState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperState::Up => write!(f, "up"),
            OperState::Down => write!(f, "down"),
            OperState::Unknown => write!(f, "unknown"),
            OperState::NotPresent => write!(f, "notpresent"),
        }
    }
}

impl FromStr for OperState {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "up" => Ok(OperState::Up),
            "down" => Ok(OperState::Down),
            "unknown" => Ok(OperState::Unknown),
            "notpresent" | "not_present" => Ok(OperState::NotPresent),
            _ => Err(ParseError::InvalidOperState(s.to_string())),
        }
    }
}

//! Host table rows and the store that persists them.
//!
//! The host keeps three logical tables: interfaces, incoming flows and
//! outgoing flows. Rows are derived, disposable projections of registry
//! state produced by [`TableProjector`]; writing them never feeds back into
//! the registries. Rows are only read back by the registries' `load_table`
//! at startup.

mod json;
mod memory;
mod projector;

pub use json::JsonFileTableStore;
pub use memory::InMemoryTableStore;
pub use projector::TableProjector;

use flow_types::{AdminState, Endpoint, FlowDirection, FlowInfo, OperState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::TableError;
use crate::stats::{FlowCounters, InterfaceCounters};

/// Table name of the interfaces table.
pub const INTERFACES_TABLE_NAME: &str = "INTERFACES";

/// Table name of the incoming flows table.
pub const INCOMING_FLOWS_TABLE_NAME: &str = "RX_FLOWS";

/// Table name of the outgoing flows table.
pub const OUTGOING_FLOWS_TABLE_NAME: &str = "TX_FLOWS";

/// Returns the flows table name of a direction.
pub fn flow_table_name(direction: FlowDirection) -> &'static str {
    match direction {
        FlowDirection::Rx => INCOMING_FLOWS_TABLE_NAME,
        FlowDirection::Tx => OUTGOING_FLOWS_TABLE_NAME,
    }
}

/// One row of the interfaces table.
///
/// On load only the host-managed attributes are read; flow counts and flow
/// lists are rebuilt from the flow tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceRow {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub admin_state: AdminState,
    #[serde(default)]
    pub oper_state: OperState,
    #[serde(default)]
    pub rx_flow_count: usize,
    #[serde(default)]
    pub tx_flow_count: usize,
    #[serde(default)]
    pub rx_flows: Vec<String>,
    #[serde(default)]
    pub tx_flows: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counters: Option<InterfaceCounters>,
    #[serde(default)]
    pub stale_statistics: bool,
}

impl InterfaceRow {
    /// A host row carrying only the interface name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: None,
            description: None,
            admin_state: AdminState::default(),
            oper_state: OperState::default(),
            rx_flow_count: 0,
            tx_flow_count: 0,
            rx_flows: Vec::new(),
            tx_flows: Vec::new(),
            counters: None,
            stale_statistics: false,
        }
    }
}

/// One row of a flows table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRow {
    /// Display form of the flow key.
    pub key: String,
    pub direction: FlowDirection,
    pub interface: String,
    pub source: Endpoint,
    pub destination: Endpoint,
    /// Whether the key was computed without the destination port.
    #[serde(default)]
    pub ignore_destination_port: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_bitrate: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counters: Option<FlowCounters>,
    #[serde(default)]
    pub stale_statistics: bool,
}

impl FlowRow {
    /// Rebuilds the flow entry the row was projected from.
    pub fn to_flow_info(&self) -> FlowInfo {
        FlowInfo {
            direction: self.direction,
            interface: self.interface.clone(),
            source: self.source,
            destination: self.destination,
            provider: self.provider.clone(),
            expected_bitrate: self.expected_bitrate,
            metadata: self.metadata.clone(),
        }
    }
}

/// Bulk access to the host's tables.
pub trait TableStore {
    /// Reads the current interfaces table.
    fn load_interface_rows(&self) -> Result<Vec<InterfaceRow>, TableError>;

    /// Reads the current flows table of one direction.
    fn load_flow_rows(&self, direction: FlowDirection) -> Result<Vec<FlowRow>, TableError>;

    /// Replaces the interfaces table.
    fn write_interface_rows(&mut self, rows: &[InterfaceRow]) -> Result<(), TableError>;

    /// Replaces the flows table of one direction.
    fn write_flow_rows(
        &mut self,
        direction: FlowDirection,
        rows: &[FlowRow],
    ) -> Result<(), TableError>;
}

/// Contents of all three tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tables {
    pub interfaces: Vec<InterfaceRow>,
    pub incoming_flows: Vec<FlowRow>,
    pub outgoing_flows: Vec<FlowRow>,
}

impl Tables {
    pub fn flows(&self, direction: FlowDirection) -> &[FlowRow] {
        match direction {
            FlowDirection::Rx => &self.incoming_flows,
            FlowDirection::Tx => &self.outgoing_flows,
        }
    }

    pub(crate) fn flows_mut(&mut self, direction: FlowDirection) -> &mut Vec<FlowRow> {
        match direction {
            FlowDirection::Rx => &mut self.incoming_flows,
            FlowDirection::Tx => &mut self.outgoing_flows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_interface_row_json() {
        let row: InterfaceRow = serde_json::from_str(r#"{"name": "Ethernet1"}"#).unwrap();
        assert_eq!(row, InterfaceRow::new("Ethernet1"));
    }

    #[test]
    fn test_flow_row_round_trips_flow_info() {
        let row: FlowRow = serde_json::from_str(
            r#"{
                "key": "10.0.0.1/10.0.0.2",
                "direction": "rx",
                "interface": "Ethernet1",
                "source": "10.0.0.1:5000",
                "destination": "10.0.0.2:6000",
                "ignore_destination_port": true,
                "metadata": {"label": "cam-1"}
            }"#,
        )
        .unwrap();

        let info = row.to_flow_info();
        assert_eq!(info.interface, "Ethernet1");
        assert_eq!(info.destination_port(), Some(6000));
        assert_eq!(info.metadata.len(), 1);
    }

    #[test]
    fn test_table_names() {
        assert_eq!(flow_table_name(FlowDirection::Rx), "RX_FLOWS");
        assert_eq!(flow_table_name(FlowDirection::Tx), "TX_FLOWS");
    }
}

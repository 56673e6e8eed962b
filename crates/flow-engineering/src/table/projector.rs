//! Conversion between registry state and host rows.

use crate::flows::Flow;
use crate::interfaces::Interface;
use crate::stats::{CounterSample, FlowCounters, InterfaceCounters};
use flow_types::FlowDirection;

use super::{FlowRow, InterfaceRow};

/// Builds host rows from registry state. Pure: reads only its arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableProjector;

impl TableProjector {
    pub fn interface_row(
        interface: &Interface,
        statistics: CounterSample<InterfaceCounters>,
    ) -> InterfaceRow {
        let keys = |direction| {
            interface
                .flows(direction)
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
        };

        InterfaceRow {
            name: interface.name().to_string(),
            index: interface.index(),
            description: interface.description().map(str::to_string),
            admin_state: interface.admin_state(),
            oper_state: interface.oper_state(),
            rx_flow_count: interface.flow_count(FlowDirection::Rx),
            tx_flow_count: interface.flow_count(FlowDirection::Tx),
            rx_flows: keys(FlowDirection::Rx),
            tx_flows: keys(FlowDirection::Tx),
            counters: statistics.counters,
            stale_statistics: statistics.stale,
        }
    }

    pub fn flow_row(flow: &Flow, statistics: CounterSample<FlowCounters>) -> FlowRow {
        FlowRow {
            key: flow.key().to_string(),
            direction: flow.direction(),
            interface: flow.interface().to_string(),
            source: flow.source(),
            destination: flow.destination(),
            ignore_destination_port: flow.ignores_destination_port(),
            provider: flow.provider().map(str::to_string),
            expected_bitrate: flow.expected_bitrate(),
            metadata: flow.metadata().clone(),
            counters: statistics.counters,
            stale_statistics: statistics.stale,
        }
    }

    /// Host-managed attributes of an interface row.
    pub fn interface_from_row(row: &InterfaceRow) -> Interface {
        let mut interface = Interface::new(row.name.clone())
            .with_admin_state(row.admin_state)
            .with_oper_state(row.oper_state);
        if let Some(index) = row.index {
            interface = interface.with_index(index);
        }
        if let Some(description) = &row.description {
            interface = interface.with_description(description.clone());
        }
        interface
    }
}

//! Interface metadata and per-direction flow index.

use flow_types::{AdminState, FlowDirection, OperState};
use std::collections::BTreeSet;

use crate::flows::FlowKey;

/// An interface known to the host, with the flows currently bound to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    name: String,
    index: Option<u32>,
    description: Option<String>,
    admin_state: AdminState,
    oper_state: OperState,
    rx_flows: BTreeSet<FlowKey>,
    tx_flows: BTreeSet<FlowKey>,
}

impl Interface {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: None,
            description: None,
            admin_state: AdminState::default(),
            oper_state: OperState::default(),
            rx_flows: BTreeSet::new(),
            tx_flows: BTreeSet::new(),
        }
    }

    pub fn with_index(mut self, index: u32) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_admin_state(mut self, state: AdminState) -> Self {
        self.admin_state = state;
        self
    }

    pub fn with_oper_state(mut self, state: OperState) -> Self {
        self.oper_state = state;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> Option<u32> {
        self.index
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn admin_state(&self) -> AdminState {
        self.admin_state
    }

    pub fn oper_state(&self) -> OperState {
        self.oper_state
    }

    /// Keys of the flows bound to this interface in one direction.
    pub fn flows(&self, direction: FlowDirection) -> &BTreeSet<FlowKey> {
        match direction {
            FlowDirection::Rx => &self.rx_flows,
            FlowDirection::Tx => &self.tx_flows,
        }
    }

    pub fn flow_count(&self, direction: FlowDirection) -> usize {
        self.flows(direction).len()
    }

    pub(crate) fn flows_mut(&mut self, direction: FlowDirection) -> &mut BTreeSet<FlowKey> {
        match direction {
            FlowDirection::Rx => &mut self.rx_flows,
            FlowDirection::Tx => &mut self.tx_flows,
        }
    }

    /// Copies the host-managed attributes of `other`, keeping the flow index.
    pub(crate) fn refresh_attributes(&mut self, other: Interface) {
        self.index = other.index;
        self.description = other.description;
        self.admin_state = other.admin_state;
        self.oper_state = other.oper_state;
    }
}

//! In-process table store.

use flow_types::FlowDirection;

use super::{FlowRow, InterfaceRow, TableStore, Tables};
use crate::error::TableError;

/// Keeps the three tables in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTableStore {
    tables: Tables,
    writes: usize,
}

impl InMemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with host rows.
    pub fn with_tables(tables: Tables) -> Self {
        Self { tables, writes: 0 }
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    pub fn interfaces(&self) -> &[InterfaceRow] {
        &self.tables.interfaces
    }

    pub fn flows(&self, direction: FlowDirection) -> &[FlowRow] {
        self.tables.flows(direction)
    }

    /// Number of table writes performed so far.
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl TableStore for InMemoryTableStore {
    fn load_interface_rows(&self) -> Result<Vec<InterfaceRow>, TableError> {
        Ok(self.tables.interfaces.clone())
    }

    fn load_flow_rows(&self, direction: FlowDirection) -> Result<Vec<FlowRow>, TableError> {
        Ok(self.tables.flows(direction).to_vec())
    }

    fn write_interface_rows(&mut self, rows: &[InterfaceRow]) -> Result<(), TableError> {
        self.tables.interfaces = rows.to_vec();
        self.writes += 1;
        Ok(())
    }

    fn write_flow_rows(
        &mut self,
        direction: FlowDirection,
        rows: &[FlowRow],
    ) -> Result<(), TableError> {
        *self.tables.flows_mut(direction) = rows.to_vec();
        self.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_replaces_table() {
        let mut store = InMemoryTableStore::new();
        store
            .write_interface_rows(&[InterfaceRow::new("Ethernet1"), InterfaceRow::new("Ethernet2")])
            .unwrap();
        store
            .write_interface_rows(&[InterfaceRow::new("Ethernet3")])
            .unwrap();

        let rows = store.load_interface_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Ethernet3");
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn test_directions_are_separate() {
        let mut store = InMemoryTableStore::new();
        store.write_flow_rows(FlowDirection::Rx, &[]).unwrap();
        assert!(store.load_flow_rows(FlowDirection::Tx).unwrap().is_empty());
        assert!(store.flows(FlowDirection::Rx).is_empty());
    }
}

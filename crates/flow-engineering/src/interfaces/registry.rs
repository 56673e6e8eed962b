//! InterfaceRegistry implementation.

use flow_types::FlowDirection;
use log::{debug, info, warn};
use std::collections::HashMap;

use super::types::Interface;
use crate::error::{FlowEngineeringError, FlowEngineeringResult};
use crate::flows::FlowKey;
use crate::stats::{
    CounterSample, FetchBudget, InterfaceCounters, StatisticsCache, StatisticsPolicy,
    StatisticsProvider,
};
use crate::table::{InterfaceRow, TableProjector, TableStore, INTERFACES_TABLE_NAME};

/// Owns the interfaces and their per-direction flow index.
///
/// Interfaces are managed by the host: this registry loads them, projects
/// them, and tracks which flows are bound to each one. It never removes an
/// interface in response to flow changes.
#[derive(Debug)]
pub struct InterfaceRegistry {
    interfaces: HashMap<String, Interface>,
    statistics: StatisticsCache<String, InterfaceCounters>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self {
            interfaces: HashMap::new(),
            statistics: StatisticsCache::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.interfaces.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Interface> {
        self.interfaces.get(name)
    }

    /// Interfaces in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Interface> {
        let mut interfaces: Vec<_> = self.interfaces.values().collect();
        interfaces.sort_by(|a, b| a.name().cmp(b.name()));
        interfaces.into_iter()
    }

    /// Adds an interface, or refreshes the attributes of a known one while
    /// keeping its flow index.
    pub fn upsert(&mut self, interface: Interface) {
        match self.interfaces.get_mut(interface.name()) {
            Some(existing) => existing.refresh_attributes(interface),
            None => {
                self.interfaces
                    .insert(interface.name().to_string(), interface);
            }
        }
    }

    /// Binds a flow to an interface.
    ///
    /// Fails with [`FlowEngineeringError::UnknownInterface`] when the
    /// interface is not known; nothing is created in that case.
    pub(crate) fn link_flow(
        &mut self,
        interface: &str,
        direction: FlowDirection,
        key: FlowKey,
    ) -> FlowEngineeringResult<()> {
        let entry = self
            .interfaces
            .get_mut(interface)
            .ok_or_else(|| FlowEngineeringError::unknown_interface(interface))?;

        entry.flows_mut(direction).insert(key);
        Ok(())
    }

    /// Unbinds a flow. Returns false if it was not bound.
    pub(crate) fn unlink_flow(
        &mut self,
        interface: &str,
        direction: FlowDirection,
        key: &FlowKey,
    ) -> bool {
        self.interfaces
            .get_mut(interface)
            .map(|entry| entry.flows_mut(direction).remove(key))
            .unwrap_or(false)
    }

    /// Drops every flow binding of one direction.
    pub(crate) fn clear_links(&mut self, direction: FlowDirection) {
        for interface in self.interfaces.values_mut() {
            interface.flows_mut(direction).clear();
        }
    }

    /// Replaces all interfaces with the host's interfaces table.
    ///
    /// Flow bindings are reset; the flow registries rebuild them when they
    /// are loaded afterwards.
    pub fn load_table(&mut self, store: &dyn TableStore) -> FlowEngineeringResult<usize> {
        let rows = store.load_interface_rows()?;
        Ok(self.replace_from_rows(&rows))
    }

    /// Replaces every interface with the given rows. Flow links start empty.
    pub(crate) fn replace_from_rows(&mut self, rows: &[InterfaceRow]) -> usize {
        self.interfaces.clear();
        self.statistics.clear();

        for row in rows {
            if self.interfaces.contains_key(&row.name) {
                warn!(
                    "Duplicate interface '{}' in {}, keeping the last row",
                    row.name, INTERFACES_TABLE_NAME
                );
            }
            self.interfaces
                .insert(row.name.clone(), TableProjector::interface_from_row(row));
        }

        info!(
            "Loaded {} interfaces from {}",
            self.interfaces.len(),
            INTERFACES_TABLE_NAME
        );
        self.interfaces.len()
    }

    /// Projects every interface into the host table.
    pub fn update_table(
        &mut self,
        store: &mut dyn TableStore,
        statistics: &dyn StatisticsProvider,
        include_statistics: bool,
        policy: &StatisticsPolicy,
    ) -> FlowEngineeringResult<Vec<InterfaceRow>> {
        let mut budget = FetchBudget::new(policy);
        let mut names: Vec<&String> = self.interfaces.keys().collect();
        names.sort();

        let mut rows = Vec::with_capacity(names.len());
        for name in names {
            let Some(interface) = self.interfaces.get(name) else {
                continue;
            };
            let sample = if include_statistics {
                self.statistics.sample(name, &mut budget, || {
                    statistics.fetch_interface_statistics(name)
                })
            } else {
                CounterSample::none()
            };
            rows.push(TableProjector::interface_row(interface, sample));
        }

        store.write_interface_rows(&rows)?;
        debug!(
            "Updated {} with {} rows (statistics: {})",
            INTERFACES_TABLE_NAME,
            rows.len(),
            include_statistics
        );
        Ok(rows)
    }
}

impl Default for InterfaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatisticsError;
    use crate::stats::{FlowCounters, NoStatistics};
    use crate::table::{InMemoryTableStore, Tables};
    use chrono::Utc;
    use flow_types::{FlowInfo, OperState};
    use pretty_assertions::assert_eq;

    struct InterfaceStats;

    impl StatisticsProvider for InterfaceStats {
        fn fetch_flow_statistics(&self, key: &FlowKey) -> Result<FlowCounters, StatisticsError> {
            Err(StatisticsError::unavailable(key.to_string(), "n/a"))
        }

        fn fetch_interface_statistics(
            &self,
            interface: &str,
        ) -> Result<InterfaceCounters, StatisticsError> {
            match interface {
                "Ethernet1" => Ok(InterfaceCounters {
                    rx_bitrate_mbps: 100.0,
                    tx_bitrate_mbps: 50.0,
                    sampled_at: Utc::now(),
                }),
                _ => Err(StatisticsError::unavailable(interface, "no collector")),
            }
        }
    }

    fn key() -> FlowKey {
        let info = FlowInfo::new(
            FlowDirection::Rx,
            "Ethernet1",
            "10.0.0.1:5000".parse().unwrap(),
            "10.0.0.2:6000".parse().unwrap(),
        );
        FlowKey::from_flow_info(&info, false)
    }

    fn store_with(names: &[&str]) -> InMemoryTableStore {
        InMemoryTableStore::with_tables(Tables {
            interfaces: names.iter().map(|n| InterfaceRow::new(*n)).collect(),
            ..Tables::default()
        })
    }

    #[test]
    fn test_load_table_replaces() {
        let mut registry = InterfaceRegistry::new();
        registry.upsert(Interface::new("Stale0"));

        let loaded = registry
            .load_table(&store_with(&["Ethernet1", "Ethernet2"]))
            .unwrap();
        assert_eq!(loaded, 2);
        assert!(!registry.contains("Stale0"));
        assert!(registry.contains("Ethernet1"));
    }

    #[test]
    fn test_link_unknown_interface_fails() {
        let mut registry = InterfaceRegistry::new();
        let err = registry
            .link_flow("Ethernet9", FlowDirection::Rx, key())
            .unwrap_err();
        assert!(matches!(err, FlowEngineeringError::UnknownInterface { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_link_and_unlink() {
        let mut registry = InterfaceRegistry::new();
        registry.upsert(Interface::new("Ethernet1"));

        registry
            .link_flow("Ethernet1", FlowDirection::Rx, key())
            .unwrap();
        let intf = registry.get("Ethernet1").unwrap();
        assert_eq!(intf.flow_count(FlowDirection::Rx), 1);
        assert_eq!(intf.flow_count(FlowDirection::Tx), 0);

        assert!(registry.unlink_flow("Ethernet1", FlowDirection::Rx, &key()));
        assert!(!registry.unlink_flow("Ethernet1", FlowDirection::Rx, &key()));
        assert_eq!(registry.get("Ethernet1").unwrap().flow_count(FlowDirection::Rx), 0);
    }

    #[test]
    fn test_upsert_keeps_links() {
        let mut registry = InterfaceRegistry::new();
        registry.upsert(Interface::new("Ethernet1"));
        registry
            .link_flow("Ethernet1", FlowDirection::Rx, key())
            .unwrap();

        registry.upsert(Interface::new("Ethernet1").with_oper_state(OperState::Up));
        let intf = registry.get("Ethernet1").unwrap();
        assert!(intf.oper_state().is_up());
        assert_eq!(intf.flow_count(FlowDirection::Rx), 1);
    }

    #[test]
    fn test_update_table_is_name_ordered() {
        let mut registry = InterfaceRegistry::new();
        let mut store = store_with(&["Ethernet2", "Ethernet10", "Ethernet1"]);
        registry.load_table(&store).unwrap();

        let rows = registry
            .update_table(&mut store, &NoStatistics, false, &StatisticsPolicy::default())
            .unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Ethernet1", "Ethernet10", "Ethernet2"]);
        assert_eq!(store.interfaces(), rows.as_slice());
    }

    #[test]
    fn test_update_table_counts_flows() {
        let mut registry = InterfaceRegistry::new();
        let mut store = store_with(&["Ethernet1"]);
        registry.load_table(&store).unwrap();
        registry
            .link_flow("Ethernet1", FlowDirection::Rx, key())
            .unwrap();

        let rows = registry
            .update_table(&mut store, &NoStatistics, false, &StatisticsPolicy::default())
            .unwrap();
        assert_eq!(rows[0].rx_flow_count, 1);
        assert_eq!(rows[0].tx_flow_count, 0);
        assert_eq!(rows[0].rx_flows, vec!["10.0.0.1/10.0.0.2:6000"]);
    }

    #[test]
    fn test_update_table_statistics_best_effort() {
        let mut registry = InterfaceRegistry::new();
        let mut store = store_with(&["Ethernet1", "Ethernet2"]);
        registry.load_table(&store).unwrap();

        let rows = registry
            .update_table(&mut store, &InterfaceStats, true, &StatisticsPolicy::default())
            .unwrap();

        let eth1 = &rows[0];
        assert_eq!(eth1.counters.as_ref().map(|c| c.rx_bitrate_mbps), Some(100.0));
        assert!(!eth1.stale_statistics);

        let eth2 = &rows[1];
        assert_eq!(eth2.counters, None);
        assert!(eth2.stale_statistics);
    }
}

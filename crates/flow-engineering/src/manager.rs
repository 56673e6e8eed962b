//! FlowEngineeringManager - applies reconciliation messages to the registries.

use flow_types::{ActionType, FlowDirection, FlowInfo, FlowInfoMessage};
use log::{debug, error, info};

use crate::error::{FlowEngineeringError, FlowEngineeringResult};
use crate::flows::{Flow, IncomingFlows, OutgoingFlows};
use crate::interfaces::{Interface, InterfaceRegistry};
use crate::stats::{StatisticsPolicy, StatisticsProvider};
use crate::table::TableStore;

/// Flows changed by one reconciliation message, in message order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationResult {
    /// Flows created or refreshed by create/update entries.
    pub added: Vec<Flow>,
    /// Flows removed by delete entries.
    pub removed: Vec<Flow>,
}

impl ReconciliationResult {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Running counters of the manager.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationStats {
    /// Messages applied completely.
    pub messages_handled: u64,
    /// Messages rejected for an unsupported action.
    pub messages_rejected: u64,
    pub flows_added: u64,
    pub flows_removed: u64,
    /// Create/update entries that could not be stored.
    pub entries_skipped: u64,
    /// Full or partial table refreshes performed.
    pub table_updates: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryAction {
    Register,
    Unregister,
}

/// Owns the interface registry and both flow registries.
///
/// All methods take the host's [`TableStore`] (and, for projections, the
/// [`StatisticsProvider`]) explicitly; the manager keeps no reference to
/// either.
pub struct FlowEngineeringManager {
    interfaces: InterfaceRegistry,
    incoming_flows: IncomingFlows,
    outgoing_flows: OutgoingFlows,
    policy: StatisticsPolicy,
    stats: ReconciliationStats,
}

impl std::fmt::Debug for FlowEngineeringManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowEngineeringManager")
            .field("interface_count", &self.interfaces.len())
            .field("incoming_flow_count", &self.incoming_flows.len())
            .field("outgoing_flow_count", &self.outgoing_flows.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl FlowEngineeringManager {
    pub fn new(policy: StatisticsPolicy) -> Self {
        Self {
            interfaces: InterfaceRegistry::new(),
            incoming_flows: IncomingFlows::new(),
            outgoing_flows: OutgoingFlows::new(),
            policy,
            stats: ReconciliationStats::default(),
        }
    }

    pub fn interfaces(&self) -> &InterfaceRegistry {
        &self.interfaces
    }

    pub fn incoming_flows(&self) -> &IncomingFlows {
        &self.incoming_flows
    }

    pub fn outgoing_flows(&self) -> &OutgoingFlows {
        &self.outgoing_flows
    }

    pub fn stats(&self) -> &ReconciliationStats {
        &self.stats
    }

    /// Adds or refreshes one interface outside of a table load.
    pub fn upsert_interface(&mut self, interface: Interface) {
        self.interfaces.upsert(interface);
    }

    /// Loads interfaces, then incoming flows, then outgoing flows.
    ///
    /// Interfaces go first so flows can be bound to them. All three tables
    /// are read before any state is replaced, so a failed read leaves the
    /// registries as they were.
    pub fn load_tables(&mut self, tables: &dyn TableStore) -> FlowEngineeringResult<()> {
        let interface_rows = tables.load_interface_rows()?;
        let incoming_rows = tables.load_flow_rows(FlowDirection::Rx)?;
        let outgoing_rows = tables.load_flow_rows(FlowDirection::Tx)?;

        self.interfaces.replace_from_rows(&interface_rows);
        self.incoming_flows
            .replace_from_rows(&mut self.interfaces, &incoming_rows);
        self.outgoing_flows
            .replace_from_rows(&mut self.interfaces, &outgoing_rows);
        Ok(())
    }

    /// Refreshes all three tables.
    pub fn update_tables(
        &mut self,
        tables: &mut dyn TableStore,
        statistics: &dyn StatisticsProvider,
        include_statistics: bool,
    ) -> FlowEngineeringResult<()> {
        self.interfaces
            .update_table(tables, statistics, include_statistics, &self.policy)?;
        self.incoming_flows
            .update_table(tables, statistics, include_statistics, &self.policy)?;
        self.outgoing_flows
            .update_table(tables, statistics, include_statistics, &self.policy)?;
        self.stats.table_updates += 1;
        Ok(())
    }

    /// Refreshes the interfaces and incoming flows tables only.
    pub fn update_interface_and_incoming_flows_tables(
        &mut self,
        tables: &mut dyn TableStore,
        statistics: &dyn StatisticsProvider,
        include_statistics: bool,
    ) -> FlowEngineeringResult<()> {
        self.interfaces
            .update_table(tables, statistics, include_statistics, &self.policy)?;
        self.incoming_flows
            .update_table(tables, statistics, include_statistics, &self.policy)?;
        self.stats.table_updates += 1;
        Ok(())
    }

    /// Refreshes the interfaces and outgoing flows tables only.
    pub fn update_interface_and_outgoing_flows_tables(
        &mut self,
        tables: &mut dyn TableStore,
        statistics: &dyn StatisticsProvider,
        include_statistics: bool,
    ) -> FlowEngineeringResult<()> {
        self.interfaces
            .update_table(tables, statistics, include_statistics, &self.policy)?;
        self.outgoing_flows
            .update_table(tables, statistics, include_statistics, &self.policy)?;
        self.stats.table_updates += 1;
        Ok(())
    }

    /// Applies a reconciliation message and refreshes all tables once.
    ///
    /// Entries are applied in message order, so a later entry for the same
    /// key wins. Entries that cannot be stored are skipped without failing
    /// the message. An unsupported action rejects the message before any
    /// entry is applied. Nothing is rolled back if the trailing table
    /// refresh fails.
    pub fn handle_reconciliation_message(
        &mut self,
        tables: &mut dyn TableStore,
        statistics: &dyn StatisticsProvider,
        message: &FlowInfoMessage,
        ignore_destination_port: bool,
    ) -> FlowEngineeringResult<ReconciliationResult> {
        let action = match &message.action {
            ActionType::Create | ActionType::Update => EntryAction::Register,
            ActionType::Delete => EntryAction::Unregister,
            ActionType::Other(name) => {
                self.stats.messages_rejected += 1;
                error!(
                    "Rejecting message with unsupported action '{}' ({} entries)",
                    name,
                    message.len()
                );
                return Err(FlowEngineeringError::unsupported_action(name.clone()));
            }
        };

        debug!(
            "Handling {} message with {} entries (ignore destination port: {})",
            message.action,
            message.len(),
            ignore_destination_port
        );

        let mut result = ReconciliationResult::default();
        for entry in &message.flows {
            match action {
                EntryAction::Register => match self.register(entry, ignore_destination_port) {
                    Some(flow) => result.added.push(flow),
                    None => self.stats.entries_skipped += 1,
                },
                EntryAction::Unregister => {
                    if let Some(flow) = self.unregister(entry, ignore_destination_port) {
                        result.removed.push(flow);
                    }
                }
            }
        }

        self.stats.messages_handled += 1;
        self.stats.flows_added += result.added.len() as u64;
        self.stats.flows_removed += result.removed.len() as u64;

        info!(
            "Applied {} message: {} added, {} removed",
            message.action,
            result.added.len(),
            result.removed.len()
        );

        self.update_tables(tables, statistics, true)?;
        Ok(result)
    }

    fn register(&mut self, entry: &FlowInfo, ignore_destination_port: bool) -> Option<Flow> {
        match entry.direction {
            FlowDirection::Rx => {
                self.incoming_flows
                    .register_flow(&mut self.interfaces, entry, ignore_destination_port)
            }
            FlowDirection::Tx => {
                self.outgoing_flows
                    .register_flow(&mut self.interfaces, entry, ignore_destination_port)
            }
        }
    }

    fn unregister(&mut self, entry: &FlowInfo, ignore_destination_port: bool) -> Option<Flow> {
        match entry.direction {
            FlowDirection::Rx => {
                self.incoming_flows
                    .unregister_flow(&mut self.interfaces, entry, ignore_destination_port)
            }
            FlowDirection::Tx => {
                self.outgoing_flows
                    .unregister_flow(&mut self.interfaces, entry, ignore_destination_port)
            }
        }
    }
}

impl Default for FlowEngineeringManager {
    fn default() -> Self {
        Self::new(StatisticsPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TableError;
    use crate::stats::NoStatistics;
    use crate::table::{FlowRow, InMemoryTableStore, InterfaceRow, Tables};
    use pretty_assertions::assert_eq;

    fn store() -> InMemoryTableStore {
        InMemoryTableStore::with_tables(Tables {
            interfaces: vec![InterfaceRow::new("Ethernet1"), InterfaceRow::new("Ethernet2")],
            ..Tables::default()
        })
    }

    fn loaded(store: &InMemoryTableStore) -> FlowEngineeringManager {
        let mut manager = FlowEngineeringManager::default();
        manager.load_tables(store).unwrap();
        manager
    }

    fn entry(direction: FlowDirection, interface: &str, dst: &str) -> FlowInfo {
        FlowInfo::new(
            direction,
            interface,
            "10.0.0.1:5000".parse().unwrap(),
            dst.parse().unwrap(),
        )
    }

    /// Rejects every write.
    struct ReadOnlyStore(InMemoryTableStore);

    impl TableStore for ReadOnlyStore {
        fn load_interface_rows(&self) -> Result<Vec<InterfaceRow>, TableError> {
            self.0.load_interface_rows()
        }

        fn load_flow_rows(&self, direction: FlowDirection) -> Result<Vec<FlowRow>, TableError> {
            self.0.load_flow_rows(direction)
        }

        fn write_interface_rows(&mut self, _rows: &[InterfaceRow]) -> Result<(), TableError> {
            Err(TableError::backend("write", "read-only"))
        }

        fn write_flow_rows(
            &mut self,
            _direction: FlowDirection,
            _rows: &[FlowRow],
        ) -> Result<(), TableError> {
            Err(TableError::backend("write", "read-only"))
        }
    }

    #[test]
    fn test_dispatch_by_direction() {
        let mut store = store();
        let mut manager = loaded(&store);
        let message = FlowInfoMessage::create(vec![
            entry(FlowDirection::Rx, "Ethernet1", "10.0.0.2:6000"),
            entry(FlowDirection::Tx, "Ethernet2", "239.0.0.1:5004"),
        ]);

        let result = manager
            .handle_reconciliation_message(&mut store, &NoStatistics, &message, false)
            .unwrap();

        assert_eq!(result.added.len(), 2);
        assert_eq!(manager.incoming_flows().len(), 1);
        assert_eq!(manager.outgoing_flows().len(), 1);
        assert_eq!(store.flows(FlowDirection::Rx).len(), 1);
        assert_eq!(store.flows(FlowDirection::Tx).len(), 1);
    }

    #[test]
    fn test_update_action_creates_absent_flow() {
        let mut store = store();
        let mut manager = loaded(&store);
        let message =
            FlowInfoMessage::update(vec![entry(FlowDirection::Rx, "Ethernet1", "10.0.0.2:6000")]);

        let result = manager
            .handle_reconciliation_message(&mut store, &NoStatistics, &message, false)
            .unwrap();
        assert_eq!(result.added.len(), 1);
    }

    #[test]
    fn test_unknown_interface_is_skipped() {
        let mut store = store();
        let mut manager = loaded(&store);
        let message = FlowInfoMessage::create(vec![
            entry(FlowDirection::Rx, "Ethernet9", "10.0.0.2:6000"),
            entry(FlowDirection::Rx, "Ethernet1", "10.0.0.2:6000"),
        ]);

        let result = manager
            .handle_reconciliation_message(&mut store, &NoStatistics, &message, false)
            .unwrap();

        assert_eq!(result.added.len(), 1);
        assert_eq!(result.added[0].interface(), "Ethernet1");
        assert_eq!(manager.stats().entries_skipped, 1);
    }

    #[test]
    fn test_unsupported_action_rejected_before_applying() {
        let mut store = store();
        let mut manager = loaded(&store);
        let writes = store.write_count();
        let message = FlowInfoMessage::new(
            ActionType::Other("Move".to_string()),
            vec![entry(FlowDirection::Rx, "Ethernet1", "10.0.0.2:6000")],
        );

        let err = manager
            .handle_reconciliation_message(&mut store, &NoStatistics, &message, false)
            .unwrap_err();

        assert!(matches!(err, FlowEngineeringError::UnsupportedAction { ref action } if action == "Move"));
        assert!(manager.incoming_flows().is_empty());
        assert_eq!(store.write_count(), writes);
        assert_eq!(manager.stats().messages_rejected, 1);
        assert_eq!(manager.stats().messages_handled, 0);
    }

    #[test]
    fn test_unsupported_action_rejected_without_entries() {
        let mut store = store();
        let mut manager = loaded(&store);
        let writes = store.write_count();
        let message = FlowInfoMessage::new(ActionType::Other("Move".to_string()), Vec::new());

        let err = manager
            .handle_reconciliation_message(&mut store, &NoStatistics, &message, false)
            .unwrap_err();

        assert!(matches!(err, FlowEngineeringError::UnsupportedAction { .. }));
        assert_eq!(store.write_count(), writes);
        assert_eq!(manager.stats().table_updates, 0);
    }

    #[test]
    fn test_create_then_delete_in_one_batch() {
        let mut store = store();
        let mut manager = loaded(&store);
        let flow = entry(FlowDirection::Rx, "Ethernet1", "10.0.0.2:6000");

        manager
            .handle_reconciliation_message(
                &mut store,
                &NoStatistics,
                &FlowInfoMessage::create(vec![flow.clone()]),
                false,
            )
            .unwrap();
        let result = manager
            .handle_reconciliation_message(
                &mut store,
                &NoStatistics,
                &FlowInfoMessage::delete(vec![flow.clone(), flow]),
                false,
            )
            .unwrap();

        // The second delete finds nothing.
        assert_eq!(result.removed.len(), 1);
        assert!(manager.incoming_flows().is_empty());
        assert_eq!(manager.stats().flows_removed, 1);
    }

    #[test]
    fn test_message_triggers_single_full_refresh() {
        let mut store = store();
        let mut manager = loaded(&store);
        let before = store.write_count();
        let message = FlowInfoMessage::create(vec![
            entry(FlowDirection::Rx, "Ethernet1", "10.0.0.2:6000"),
            entry(FlowDirection::Rx, "Ethernet1", "10.0.0.2:6002"),
            entry(FlowDirection::Rx, "Ethernet1", "10.0.0.2:6004"),
        ]);

        manager
            .handle_reconciliation_message(&mut store, &NoStatistics, &message, false)
            .unwrap();

        assert_eq!(store.write_count() - before, 3);
        assert_eq!(manager.stats().table_updates, 1);
    }

    #[test]
    fn test_partial_updates_touch_one_direction() {
        let mut store = store();
        let mut manager = loaded(&store);

        manager
            .update_interface_and_incoming_flows_tables(&mut store, &NoStatistics, false)
            .unwrap();
        manager
            .update_interface_and_outgoing_flows_tables(&mut store, &NoStatistics, false)
            .unwrap();

        assert_eq!(store.write_count(), 4);
        assert_eq!(manager.stats().table_updates, 2);
    }

    #[test]
    fn test_table_failure_surfaces_after_apply() {
        let mut store = ReadOnlyStore(store());
        let mut manager = FlowEngineeringManager::default();
        manager.load_tables(&store).unwrap();
        let message =
            FlowInfoMessage::create(vec![entry(FlowDirection::Rx, "Ethernet1", "10.0.0.2:6000")]);

        let err = manager
            .handle_reconciliation_message(&mut store, &NoStatistics, &message, false)
            .unwrap_err();

        assert!(matches!(err, FlowEngineeringError::Table(_)));
        assert_eq!(manager.incoming_flows().len(), 1);
    }

    /// Serves interfaces and incoming flows but cannot read outgoing flows.
    struct BrokenTxStore(InMemoryTableStore);

    impl TableStore for BrokenTxStore {
        fn load_interface_rows(&self) -> Result<Vec<InterfaceRow>, TableError> {
            self.0.load_interface_rows()
        }

        fn load_flow_rows(&self, direction: FlowDirection) -> Result<Vec<FlowRow>, TableError> {
            match direction {
                FlowDirection::Rx => self.0.load_flow_rows(direction),
                FlowDirection::Tx => Err(TableError::backend("read", "outgoing flows unavailable")),
            }
        }

        fn write_interface_rows(&mut self, rows: &[InterfaceRow]) -> Result<(), TableError> {
            self.0.write_interface_rows(rows)
        }

        fn write_flow_rows(
            &mut self,
            direction: FlowDirection,
            rows: &[FlowRow],
        ) -> Result<(), TableError> {
            self.0.write_flow_rows(direction, rows)
        }
    }

    #[test]
    fn test_failed_load_keeps_state() {
        let mut store = store();
        let mut manager = loaded(&store);
        let message =
            FlowInfoMessage::create(vec![entry(FlowDirection::Rx, "Ethernet1", "10.0.0.2:6000")]);
        manager
            .handle_reconciliation_message(&mut store, &NoStatistics, &message, false)
            .unwrap();

        let broken = BrokenTxStore(InMemoryTableStore::with_tables(Tables {
            interfaces: vec![InterfaceRow::new("Ethernet7")],
            ..Tables::default()
        }));
        let err = manager.load_tables(&broken).unwrap_err();

        assert!(matches!(err, FlowEngineeringError::Table(_)));
        assert_eq!(manager.incoming_flows().len(), 1);
        assert!(!manager.interfaces().contains("Ethernet7"));
        let ethernet1 = manager.interfaces().get("Ethernet1").unwrap();
        assert_eq!(ethernet1.flows(FlowDirection::Rx).len(), 1);
    }

    #[test]
    fn test_upsert_interface() {
        let mut manager = FlowEngineeringManager::default();
        manager.upsert_interface(Interface::new("Ethernet5"));
        assert!(manager.interfaces().contains("Ethernet5"));
    }
}

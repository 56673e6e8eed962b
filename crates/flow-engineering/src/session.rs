//! Session context: one manager bound to its host collaborators.

use flow_types::FlowInfoMessage;
use log::{debug, warn};

use crate::config::FlowEngineeringConfig;
use crate::error::{FlowEngineeringError, FlowEngineeringResult};
use crate::flows::{IncomingFlows, OutgoingFlows};
use crate::interfaces::InterfaceRegistry;
use crate::manager::{FlowEngineeringManager, ReconciliationResult, ReconciliationStats};
use crate::stats::StatisticsProvider;
use crate::table::TableStore;

/// Owns a [`FlowEngineeringManager`] together with the table store and the
/// statistics provider it reads from and writes to.
///
/// A host creates one session per engine instance and passes it where the
/// engine is needed. All operations take `&mut self`; a host that shares the
/// session across tasks wraps it in a mutex.
pub struct FlowEngineeringSession<T, S> {
    config: FlowEngineeringConfig,
    manager: FlowEngineeringManager,
    tables: T,
    statistics: S,
}

impl<T, S> FlowEngineeringSession<T, S>
where
    T: TableStore,
    S: StatisticsProvider,
{
    pub fn new(config: FlowEngineeringConfig, tables: T, statistics: S) -> Self {
        let manager = FlowEngineeringManager::new(config.statistics.clone());
        Self {
            config,
            manager,
            tables,
            statistics,
        }
    }

    pub fn config(&self) -> &FlowEngineeringConfig {
        &self.config
    }

    pub fn interfaces(&self) -> &InterfaceRegistry {
        self.manager.interfaces()
    }

    pub fn incoming_flows(&self) -> &IncomingFlows {
        self.manager.incoming_flows()
    }

    pub fn outgoing_flows(&self) -> &OutgoingFlows {
        self.manager.outgoing_flows()
    }

    pub fn stats(&self) -> &ReconciliationStats {
        self.manager.stats()
    }

    pub fn tables(&self) -> &T {
        &self.tables
    }

    /// Consumes the session, handing back the table store.
    pub fn into_tables(self) -> T {
        self.tables
    }

    pub fn load_tables(&mut self) -> FlowEngineeringResult<()> {
        self.manager.load_tables(&self.tables)
    }

    pub fn update_tables(&mut self, include_statistics: bool) -> FlowEngineeringResult<()> {
        self.manager
            .update_tables(&mut self.tables, &self.statistics, include_statistics)
    }

    pub fn update_interface_and_incoming_flows_tables(
        &mut self,
        include_statistics: bool,
    ) -> FlowEngineeringResult<()> {
        self.manager.update_interface_and_incoming_flows_tables(
            &mut self.tables,
            &self.statistics,
            include_statistics,
        )
    }

    pub fn update_interface_and_outgoing_flows_tables(
        &mut self,
        include_statistics: bool,
    ) -> FlowEngineeringResult<()> {
        self.manager.update_interface_and_outgoing_flows_tables(
            &mut self.tables,
            &self.statistics,
            include_statistics,
        )
    }

    /// Applies a message with an explicit key-matching policy.
    pub fn handle_reconciliation_message(
        &mut self,
        message: &FlowInfoMessage,
        ignore_destination_port: bool,
    ) -> FlowEngineeringResult<ReconciliationResult> {
        self.manager.handle_reconciliation_message(
            &mut self.tables,
            &self.statistics,
            message,
            ignore_destination_port,
        )
    }

    /// Applies a message with the configured key-matching policy.
    pub fn handle_message(
        &mut self,
        message: &FlowInfoMessage,
    ) -> FlowEngineeringResult<ReconciliationResult> {
        let ignore = self.config.ignore_destination_port;
        self.handle_reconciliation_message(message, ignore)
    }

    /// Decodes a JSON message and applies it with the configured policy.
    ///
    /// An empty or `null` payload carries no message and fails with
    /// [`FlowEngineeringError::InvalidArgument`].
    pub fn handle_raw_message(
        &mut self,
        payload: &str,
    ) -> FlowEngineeringResult<ReconciliationResult> {
        let Some(message) = FlowInfoMessage::from_json(payload)? else {
            warn!("Dropping empty reconciliation message");
            return Err(FlowEngineeringError::invalid_argument(
                "message",
                "no reconciliation message supplied",
            ));
        };
        debug!(
            "Decoded {} message with {} entries",
            message.action,
            message.len()
        );
        self.handle_message(&message)
    }
}

impl<T, S> std::fmt::Debug for FlowEngineeringSession<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowEngineeringSession")
            .field("config", &self.config)
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::NoStatistics;
    use crate::table::{InMemoryTableStore, InterfaceRow, Tables};
    use flow_types::FlowDirection;
    use pretty_assertions::assert_eq;

    fn session(ignore: bool) -> FlowEngineeringSession<InMemoryTableStore, NoStatistics> {
        let store = InMemoryTableStore::with_tables(Tables {
            interfaces: vec![InterfaceRow::new("Ethernet1")],
            ..Tables::default()
        });
        let config = FlowEngineeringConfig::default().with_ignore_destination_port(ignore);
        let mut session = FlowEngineeringSession::new(config, store, NoStatistics);
        session.load_tables().unwrap();
        session
    }

    const CREATE: &str = r#"{
        "action": "Create",
        "flows": [{
            "direction": "rx",
            "interface": "Ethernet1",
            "source": "10.0.0.1:5000",
            "destination": "10.0.0.2:6000"
        }]
    }"#;

    #[test]
    fn test_null_payload_is_invalid_argument() {
        let mut session = session(false);
        for payload in ["", "   ", "null"] {
            let err = session.handle_raw_message(payload).unwrap_err();
            assert!(
                matches!(err, FlowEngineeringError::InvalidArgument { .. }),
                "payload {payload:?} gave {err:?}"
            );
        }
        assert_eq!(session.tables().write_count(), 0);
    }

    #[test]
    fn test_malformed_payload() {
        let mut session = session(false);
        let err = session.handle_raw_message("{not json").unwrap_err();
        assert!(matches!(err, FlowEngineeringError::Message(_)));
    }

    #[test]
    fn test_raw_create() {
        let mut session = session(false);
        let result = session.handle_raw_message(CREATE).unwrap();

        assert_eq!(result.added.len(), 1);
        assert_eq!(session.incoming_flows().len(), 1);
        assert_eq!(
            session.tables().flows(FlowDirection::Rx)[0].key,
            "10.0.0.1/10.0.0.2:6000"
        );
    }

    #[test]
    fn test_configured_policy_applies() {
        let mut session = session(true);
        session.handle_raw_message(CREATE).unwrap();

        let row = &session.tables().flows(FlowDirection::Rx)[0];
        assert_eq!(row.key, "10.0.0.1/10.0.0.2");
        assert!(row.ignore_destination_port);
    }

    #[test]
    fn test_partial_updates() {
        let mut session = session(false);
        session
            .update_interface_and_incoming_flows_tables(false)
            .unwrap();
        session
            .update_interface_and_outgoing_flows_tables(false)
            .unwrap();
        session.update_tables(false).unwrap();

        assert_eq!(session.stats().table_updates, 3);
        assert_eq!(session.into_tables().write_count(), 7);
    }
}

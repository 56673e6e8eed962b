//! Flow engineering reconciliation engine.
//!
//! The engine keeps two registries of media flows, one per direction, bound
//! to a set of host-managed interfaces, and mirrors them into three host
//! tables:
//!
//! - [`InterfaceRegistry`]: interfaces and the flows bound to each of them
//! - [`IncomingFlows`] / [`OutgoingFlows`]: RX and TX flows keyed by [`FlowKey`]
//! - [`FlowEngineeringManager`]: applies [`FlowInfoMessage`]s and drives table
//!   loads and refreshes
//! - [`FlowEngineeringSession`]: a manager bound to its [`TableStore`] and
//!   [`StatisticsProvider`]
//!
//! # Reconciliation
//!
//! 1. The host loads the tables once (interfaces first, then RX, then TX)
//! 2. Every inter-application message is applied entry by entry
//! 3. Create/update entries register flows; delete entries unregister them
//! 4. The three tables are refreshed with best-effort live statistics
//!
//! # Example
//!
//! ```ignore
//! use flow_engineering::{
//!     FlowEngineeringConfig, FlowEngineeringSession, JsonFileTableStore, NoStatistics,
//! };
//!
//! let tables = JsonFileTableStore::open("/var/lib/flowengd/tables.json")?;
//! let mut session = FlowEngineeringSession::new(FlowEngineeringConfig::default(), tables, NoStatistics);
//! session.load_tables()?;
//! let result = session.handle_raw_message(payload)?;
//! ```

pub mod config;
pub mod error;
pub mod flows;
pub mod interfaces;
pub mod manager;
pub mod session;
pub mod stats;
pub mod table;

pub use config::FlowEngineeringConfig;
pub use error::{FlowEngineeringError, FlowEngineeringResult, StatisticsError, TableError};
pub use flows::{DirectionTag, Flow, FlowKey, FlowRegistry, IncomingFlows, OutgoingFlows, Rx, Tx};
pub use interfaces::{Interface, InterfaceRegistry};
pub use manager::{FlowEngineeringManager, ReconciliationResult, ReconciliationStats};
pub use session::FlowEngineeringSession;
pub use stats::{FlowCounters, InterfaceCounters, NoStatistics, StatisticsPolicy, StatisticsProvider};
pub use table::{
    FlowRow, InMemoryTableStore, InterfaceRow, JsonFileTableStore, TableProjector, TableStore,
    Tables,
};

pub use flow_types::{
    ActionType, AdminState, Endpoint, FlowDirection, FlowInfo, FlowInfoMessage, OperState,
    ParseError,
};

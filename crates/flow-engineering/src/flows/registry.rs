//! FlowRegistry implementation.

use flow_types::{FlowDirection, FlowInfo};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::marker::PhantomData;

use super::types::{DirectionTag, Flow, FlowKey, Rx, Tx};
use crate::error::FlowEngineeringResult;
use crate::interfaces::InterfaceRegistry;
use crate::stats::{
    CounterSample, FetchBudget, FlowCounters, StatisticsCache, StatisticsPolicy,
    StatisticsProvider,
};
use crate::table::{flow_table_name, FlowRow, TableProjector, TableStore};

/// Registry of incoming flows.
pub type IncomingFlows = FlowRegistry<Rx>;

/// Registry of outgoing flows.
pub type OutgoingFlows = FlowRegistry<Tx>;

/// Flows of one direction, keyed by [`FlowKey`].
///
/// Every flow in the map is bound to its interface in the
/// [`InterfaceRegistry`] passed to the mutating calls, and vice versa.
pub struct FlowRegistry<D: DirectionTag> {
    flows: HashMap<FlowKey, Flow>,
    statistics: StatisticsCache<FlowKey, FlowCounters>,
    _direction: PhantomData<D>,
}

impl<D: DirectionTag> std::fmt::Debug for FlowRegistry<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowRegistry")
            .field("direction", &D::DIRECTION)
            .field("flow_count", &self.flows.len())
            .finish()
    }
}

impl<D: DirectionTag> FlowRegistry<D> {
    pub fn new() -> Self {
        Self {
            flows: HashMap::new(),
            statistics: StatisticsCache::new(),
            _direction: PhantomData,
        }
    }

    pub fn direction(&self) -> FlowDirection {
        D::DIRECTION
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn get(&self, key: &FlowKey) -> Option<&Flow> {
        self.flows.get(key)
    }

    pub fn contains(&self, key: &FlowKey) -> bool {
        self.flows.contains_key(key)
    }

    /// Looks up the flow an entry would resolve to.
    pub fn lookup(&self, info: &FlowInfo, ignore_destination_port: bool) -> Option<&Flow> {
        self.flows
            .get(&FlowKey::from_flow_info(info, ignore_destination_port))
    }

    /// Flows in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Flow> {
        let mut flows: Vec<&Flow> = self.flows.values().collect();
        flows.sort_by(|a, b| a.key().cmp(b.key()));
        flows.into_iter()
    }

    /// Creates the flow, or refreshes it in place when its key is present.
    ///
    /// A refresh that names another interface moves the flow's binding to
    /// that interface.
    ///
    /// Returns `None` when the entry cannot be stored: its interface is
    /// unknown, or it belongs to the other direction. Both are logged and
    /// leave the registry untouched.
    pub fn register_flow(
        &mut self,
        interfaces: &mut InterfaceRegistry,
        info: &FlowInfo,
        ignore_destination_port: bool,
    ) -> Option<Flow> {
        if info.direction != D::DIRECTION {
            warn!(
                "Refusing {} flow on interface '{}' in the {} registry",
                info.direction,
                info.interface,
                D::DIRECTION
            );
            return None;
        }

        let key = FlowKey::from_flow_info(info, ignore_destination_port);

        if self.flows.contains_key(&key) {
            let flow = self.update_linked(interfaces, &key, info)?;
            debug!("Updated {} flow {}", D::DIRECTION, key);
            return Some(flow);
        }

        let flow = self.insert_linked(interfaces, key, info)?;
        debug!("Registered {} flow {}", D::DIRECTION, flow.key());
        Some(flow)
    }

    /// Removes the flow the entry resolves to.
    ///
    /// Returns `None` when no such flow is registered; removing an absent
    /// flow is not an error.
    pub fn unregister_flow(
        &mut self,
        interfaces: &mut InterfaceRegistry,
        info: &FlowInfo,
        ignore_destination_port: bool,
    ) -> Option<Flow> {
        if info.direction != D::DIRECTION {
            return None;
        }

        let key = FlowKey::from_flow_info(info, ignore_destination_port);
        let Some(flow) = self.flows.remove(&key) else {
            debug!("No {} flow {} to unregister", D::DIRECTION, key);
            return None;
        };

        if !interfaces.unlink_flow(flow.interface(), D::DIRECTION, &key) {
            warn!(
                "{} flow {} was not bound to interface '{}'",
                D::DIRECTION,
                key,
                flow.interface()
            );
        }
        self.statistics.forget(&key);

        debug!("Unregistered {} flow {}", D::DIRECTION, key);
        Some(flow)
    }

    /// Refreshes a present flow, rebinding it first if its interface changed.
    fn update_linked(
        &mut self,
        interfaces: &mut InterfaceRegistry,
        key: &FlowKey,
        info: &FlowInfo,
    ) -> Option<Flow> {
        let flow = self.flows.get_mut(key)?;

        if flow.interface() != info.interface {
            if let Err(e) = interfaces.link_flow(&info.interface, D::DIRECTION, key.clone()) {
                warn!(
                    "Keeping {} flow {} on interface '{}': {}",
                    D::DIRECTION,
                    key,
                    flow.interface(),
                    e
                );
                return None;
            }
            interfaces.unlink_flow(flow.interface(), D::DIRECTION, key);
            info!(
                "Moved {} flow {} from interface '{}' to '{}'",
                D::DIRECTION,
                key,
                flow.interface(),
                info.interface
            );
        }

        flow.apply(info);
        Some(flow.clone())
    }

    fn insert_linked(
        &mut self,
        interfaces: &mut InterfaceRegistry,
        key: FlowKey,
        info: &FlowInfo,
    ) -> Option<Flow> {
        if let Err(e) = interfaces.link_flow(&info.interface, D::DIRECTION, key.clone()) {
            warn!("Skipping {} flow {}: {}", D::DIRECTION, key, e);
            return None;
        }

        let flow = Flow::new(key.clone(), info);
        self.flows.insert(key, flow.clone());
        Some(flow)
    }

    /// Replaces the registry contents with the host's flows table.
    ///
    /// Rows for the other direction or for unknown interfaces are skipped.
    /// Interfaces must be loaded first. Nothing changes if the rows cannot
    /// be read.
    pub fn load_table(
        &mut self,
        interfaces: &mut InterfaceRegistry,
        store: &dyn TableStore,
    ) -> FlowEngineeringResult<usize> {
        let rows = store.load_flow_rows(D::DIRECTION)?;
        Ok(self.replace_from_rows(interfaces, &rows))
    }

    /// Replaces the registry contents with already-read rows.
    pub(crate) fn replace_from_rows(
        &mut self,
        interfaces: &mut InterfaceRegistry,
        rows: &[FlowRow],
    ) -> usize {
        let table = flow_table_name(D::DIRECTION);

        self.flows.clear();
        self.statistics.clear();
        interfaces.clear_links(D::DIRECTION);

        let mut skipped = 0usize;
        for row in rows {
            if row.direction != D::DIRECTION {
                warn!("Skipping {} row {} in {}", row.direction, row.key, table);
                skipped += 1;
                continue;
            }

            let info = row.to_flow_info();
            let key = FlowKey::from_flow_info(&info, row.ignore_destination_port);

            if self.flows.contains_key(&key) {
                warn!("Duplicate row {} in {}, keeping the last one", key, table);
                if self.update_linked(interfaces, &key, &info).is_none() {
                    skipped += 1;
                }
                continue;
            }

            if self.insert_linked(interfaces, key, &info).is_none() {
                skipped += 1;
            }
        }

        info!(
            "Loaded {} flows from {} ({} rows skipped)",
            self.flows.len(),
            table,
            skipped
        );
        self.flows.len()
    }

    /// Projects every flow, in key order, into the host table.
    ///
    /// With `include_statistics`, counters are fetched per flow within the
    /// policy's budget; flows whose fetch fails or is skipped carry their
    /// last-known counters and are flagged stale.
    pub fn update_table(
        &mut self,
        store: &mut dyn TableStore,
        statistics: &dyn StatisticsProvider,
        include_statistics: bool,
        policy: &StatisticsPolicy,
    ) -> FlowEngineeringResult<Vec<FlowRow>> {
        let mut budget = FetchBudget::new(policy);
        let mut keys: Vec<&FlowKey> = self.flows.keys().collect();
        keys.sort();

        let mut rows = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(flow) = self.flows.get(key) else {
                continue;
            };
            let sample = if include_statistics {
                self.statistics
                    .sample(key, &mut budget, || statistics.fetch_flow_statistics(key))
            } else {
                CounterSample::none()
            };
            rows.push(TableProjector::flow_row(flow, sample));
        }

        store.write_flow_rows(D::DIRECTION, &rows)?;
        debug!(
            "Updated {} with {} rows (statistics: {})",
            flow_table_name(D::DIRECTION),
            rows.len(),
            include_statistics
        );
        Ok(rows)
    }
}

impl<D: DirectionTag> Default for FlowRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}

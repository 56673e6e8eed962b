//! Best-effort statistics retrieval for table projections.
//!
//! Counters come from a [`StatisticsProvider`] collaborator. Every fetch may
//! fail; a failure never aborts a projection; the row falls back to the
//! last counters seen for that object and is flagged stale. The amount of
//! work per projection is capped by [`StatisticsPolicy`].

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use crate::error::StatisticsError;
use crate::flows::FlowKey;

/// Live counters for one flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowCounters {
    /// Measured bitrate in Mbps.
    pub bitrate_mbps: f64,
    pub packets: u64,
    pub bytes: u64,
    pub lost_packets: u64,
    pub sampled_at: DateTime<Utc>,
}

impl FlowCounters {
    /// Counters stamped with the current time.
    pub fn now(bitrate_mbps: f64, packets: u64, bytes: u64, lost_packets: u64) -> Self {
        Self {
            bitrate_mbps,
            packets,
            bytes,
            lost_packets,
            sampled_at: Utc::now(),
        }
    }
}

/// Live counters for one interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceCounters {
    pub rx_bitrate_mbps: f64,
    pub tx_bitrate_mbps: f64,
    pub sampled_at: DateTime<Utc>,
}

/// Source of live counters.
///
/// Calls are synchronous and best-effort; implementations should return
/// promptly and report failure rather than block.
pub trait StatisticsProvider {
    /// Fetches counters for one flow.
    fn fetch_flow_statistics(&self, key: &FlowKey) -> Result<FlowCounters, StatisticsError>;

    /// Fetches counters for one interface.
    fn fetch_interface_statistics(
        &self,
        interface: &str,
    ) -> Result<InterfaceCounters, StatisticsError> {
        Err(StatisticsError::unavailable(
            interface,
            "interface statistics not supported",
        ))
    }
}

/// Provider for hosts without a counters source.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStatistics;

impl StatisticsProvider for NoStatistics {
    fn fetch_flow_statistics(&self, key: &FlowKey) -> Result<FlowCounters, StatisticsError> {
        Err(StatisticsError::unavailable(
            key.to_string(),
            "no statistics provider",
        ))
    }
}

/// Limits on statistics work done by a single table projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsPolicy {
    /// Maximum number of provider calls per projection.
    pub max_fetches_per_update: usize,
    /// Wall-clock budget for provider calls per projection, in milliseconds.
    pub update_budget_ms: u64,
}

impl Default for StatisticsPolicy {
    fn default() -> Self {
        Self {
            max_fetches_per_update: 4096,
            update_budget_ms: 2000,
        }
    }
}

impl StatisticsPolicy {
    pub fn update_budget(&self) -> Duration {
        Duration::from_millis(self.update_budget_ms)
    }
}

/// Remaining allowance for one projection.
#[derive(Debug)]
pub(crate) struct FetchBudget {
    remaining: usize,
    deadline: Instant,
}

impl FetchBudget {
    pub(crate) fn new(policy: &StatisticsPolicy) -> Self {
        Self {
            remaining: policy.max_fetches_per_update,
            deadline: Instant::now() + policy.update_budget(),
        }
    }

    /// Takes one fetch from the budget. Returns false once exhausted.
    pub(crate) fn try_acquire(&mut self) -> bool {
        if self.remaining == 0 || Instant::now() >= self.deadline {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// Counters attached to one projected row.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterSample<C> {
    pub counters: Option<C>,
    /// True when `counters` are not from this projection's fetch.
    pub stale: bool,
}

impl<C> CounterSample<C> {
    pub(crate) fn none() -> Self {
        Self {
            counters: None,
            stale: false,
        }
    }
}

/// Last-known counters per object, kept apart from registry state.
#[derive(Debug)]
pub(crate) struct StatisticsCache<K, C> {
    last_known: HashMap<K, C>,
}

impl<K, C> StatisticsCache<K, C>
where
    K: Eq + Hash + Clone + std::fmt::Display,
    C: Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            last_known: HashMap::new(),
        }
    }

    /// Fetches fresh counters when the budget allows, otherwise serves the
    /// last-known value.
    pub(crate) fn sample<F>(&mut self, key: &K, budget: &mut FetchBudget, fetch: F) -> CounterSample<C>
    where
        F: FnOnce() -> Result<C, StatisticsError>,
    {
        if !budget.try_acquire() {
            debug!("Statistics budget exhausted, serving last-known counters for {}", key);
            return self.stale(key);
        }

        match fetch() {
            Ok(counters) => {
                self.last_known.insert(key.clone(), counters.clone());
                CounterSample {
                    counters: Some(counters),
                    stale: false,
                }
            }
            Err(e) => {
                debug!("{}", e);
                self.stale(key)
            }
        }
    }

    fn stale(&self, key: &K) -> CounterSample<C> {
        CounterSample {
            counters: self.last_known.get(key).cloned(),
            stale: true,
        }
    }

    pub(crate) fn forget(&mut self, key: &K) {
        self.last_known.remove(key);
    }

    pub(crate) fn clear(&mut self) {
        self.last_known.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.last_known.len()
    }
}

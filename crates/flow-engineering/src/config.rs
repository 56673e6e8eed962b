//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{FlowEngineeringError, FlowEngineeringResult};
use crate::stats::StatisticsPolicy;

/// Configuration of a flow engineering session.
///
/// Every field has a default, so a configuration file only needs to name
/// the values it changes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowEngineeringConfig {
    /// Default key-matching policy for messages handled without an explicit
    /// policy.
    pub ignore_destination_port: bool,
    /// Limits on statistics work per table projection.
    pub statistics: StatisticsPolicy,
}

impl FlowEngineeringConfig {
    /// Reads a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> FlowEngineeringResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            FlowEngineeringError::invalid_config(path.display().to_string(), e.to_string())
        })?;
        Self::from_json(&contents)
    }

    /// Parses and validates a JSON configuration document.
    pub fn from_json(contents: &str) -> FlowEngineeringResult<Self> {
        let config: Self = serde_json::from_str(contents)
            .map_err(|e| FlowEngineeringError::invalid_config("config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> FlowEngineeringResult<()> {
        if self.statistics.update_budget_ms == 0 && self.statistics.max_fetches_per_update > 0 {
            return Err(FlowEngineeringError::invalid_config(
                "statistics.update_budget_ms",
                "must be greater than 0 when statistics fetches are allowed",
            ));
        }
        Ok(())
    }

    pub fn with_ignore_destination_port(mut self, ignore: bool) -> Self {
        self.ignore_destination_port = ignore;
        self
    }
}

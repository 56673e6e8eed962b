//! Inter-application reconciliation messages.

use crate::{FlowInfo, ParseError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Action applied to every flow entry of a message.
///
/// Unknown action names are kept verbatim in [`ActionType::Other`] so that
/// the engine, not the decoder, decides how to reject them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionType {
    Create,
    Update,
    Delete,
    Other(String),
}

impl ActionType {
    pub fn as_str(&self) -> &str {
        match self {
            ActionType::Create => "create",
            ActionType::Update => "update",
            ActionType::Delete => "delete",
            ActionType::Other(name) => name,
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ActionType {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "create" => ActionType::Create,
            "update" => ActionType::Update,
            "delete" => ActionType::Delete,
            _ => ActionType::Other(s.to_string()),
        }
    }
}

impl From<String> for ActionType {
    fn from(s: String) -> Self {
        ActionType::from(s.as_str())
    }
}

impl From<ActionType> for String {
    fn from(action: ActionType) -> Self {
        action.as_str().to_string()
    }
}

/// A batch of flow entries sharing one action type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowInfoMessage {
    pub action: ActionType,
    #[serde(default)]
    pub flows: Vec<FlowInfo>,
}

impl FlowInfoMessage {
    pub fn new(action: ActionType, flows: Vec<FlowInfo>) -> Self {
        Self { action, flows }
    }

    pub fn create(flows: Vec<FlowInfo>) -> Self {
        Self::new(ActionType::Create, flows)
    }

    pub fn update(flows: Vec<FlowInfo>) -> Self {
        Self::new(ActionType::Update, flows)
    }

    pub fn delete(flows: Vec<FlowInfo>) -> Self {
        Self::new(ActionType::Delete, flows)
    }

    /// Decodes a JSON payload.
    ///
    /// Returns `Ok(None)` when the payload carries no message at all (blank
    /// or a JSON `null`), leaving the caller to decide whether that is an
    /// error.
    pub fn from_json(payload: &str) -> Result<Option<Self>, ParseError> {
        if payload.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str::<Option<Self>>(payload)
            .map_err(|e| ParseError::InvalidMessage(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, ParseError> {
        serde_json::to_string(self).map_err(|e| ParseError::InvalidMessage(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}

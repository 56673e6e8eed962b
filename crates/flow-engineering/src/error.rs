//! Error types for flow engineering operations.
//!
//! Structural failures (a missing message, an unsupported action, a broken
//! table store) surface to the caller as [`FlowEngineeringError`]. Data-level
//! problems such as a flow that references an unknown interface, or counters
//! that cannot be fetched, are absorbed by the registries and only logged.

use flow_types::ParseError;
use std::io;
use thiserror::Error;

/// Result type alias for flow engineering operations.
pub type FlowEngineeringResult<T> = Result<T, FlowEngineeringError>;

/// Errors surfaced by the reconciliation engine.
#[derive(Debug, Error)]
pub enum FlowEngineeringError {
    /// A required argument was absent (e.g. an empty message payload).
    #[error("Invalid argument '{argument}': {message}")]
    InvalidArgument {
        /// Name of the offending argument.
        argument: String,
        /// Error message.
        message: String,
    },

    /// The message carried an action other than create, update or delete.
    #[error("Unsupported action: {action}")]
    UnsupportedAction {
        /// The action name as received.
        action: String,
    },

    /// A flow references an interface the registry does not know.
    #[error("Interface '{interface}' not found")]
    UnknownInterface {
        /// The interface name.
        interface: String,
    },

    /// The inbound message could not be decoded.
    #[error("Failed to decode message: {0}")]
    Message(#[from] ParseError),

    /// Reading or writing the host tables failed.
    #[error(transparent)]
    Table(#[from] TableError),

    /// Configuration validation error.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },
}

impl FlowEngineeringError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(argument: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument: argument.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported action error.
    pub fn unsupported_action(action: impl Into<String>) -> Self {
        Self::UnsupportedAction {
            action: action.into(),
        }
    }

    /// Creates an unknown interface error.
    pub fn unknown_interface(interface: impl Into<String>) -> Self {
        Self::UnknownInterface {
            interface: interface.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors from the host table store.
#[derive(Debug, Error)]
pub enum TableError {
    /// File access failed.
    #[error("Table I/O failed for '{path}': {source}")]
    Io {
        /// Path of the table file.
        path: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Table contents could not be (de)serialized.
    #[error("Table serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The host rejected the operation.
    #[error("Table store operation failed: {operation}: {message}")]
    Backend {
        /// The operation that failed (e.g., "load", "write").
        operation: String,
        /// Error message.
        message: String,
    },
}

impl TableError {
    /// Creates a backend error.
    pub fn backend(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Errors from the statistics provider. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatisticsError {
    /// The provider has no counters for this object.
    #[error("Statistics unavailable for {key}: {reason}")]
    Unavailable {
        /// Flow key or interface name.
        key: String,
        /// Reason reported by the provider.
        reason: String,
    },

    /// The fetch did not complete in time.
    #[error("Statistics fetch for {key} timed out")]
    Timeout {
        /// Flow key or interface name.
        key: String,
    },
}

impl StatisticsError {
    /// Creates an unavailable error.
    pub fn unavailable(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FlowEngineeringError::unsupported_action("Move");
        assert_eq!(err.to_string(), "Unsupported action: Move");

        let err = FlowEngineeringError::invalid_argument("message", "payload is empty");
        assert_eq!(
            err.to_string(),
            "Invalid argument 'message': payload is empty"
        );
    }

    #[test]
    fn test_table_error_converts() {
        let err: FlowEngineeringError = TableError::backend("write", "read-only table").into();
        assert!(matches!(err, FlowEngineeringError::Table(_)));
        assert!(err.to_string().contains("read-only table"));
    }

    #[test]
    fn test_parse_error_converts() {
        let err: FlowEngineeringError = ParseError::InvalidMessage("eof".to_string()).into();
        assert!(matches!(err, FlowEngineeringError::Message(_)));
    }
}

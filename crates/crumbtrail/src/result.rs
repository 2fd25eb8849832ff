//! Result and error types for Crumbtrail.

use thiserror::Error;

/// Result type for Crumbtrail operations
pub type InstrumentResult<T> = Result<T, InstrumentError>;

/// Errors that can occur while instrumenting a host
///
/// None of these ever escape [`crate::Instrumenter::install`]; interceptors
/// log and swallow them so one category cannot block another.
#[derive(Debug, Error)]
pub enum InstrumentError {
    /// The ledger already holds a record for this target/property pair
    #[error("{target}.{property} is already patched")]
    AlreadyPatched {
        /// Host object that owns the entry point
        target: String,
        /// Patched property name
        property: String,
    },

    /// The host lacks something a category needs
    #[error("{category} instrumentation unavailable: {requirement}")]
    MissingCapability {
        /// Category that was skipped
        category: String,
        /// What the host is missing
        requirement: String,
    },

    /// A host callback raised while being invoked
    #[error("Host callback failed: {message}")]
    Callback {
        /// Error message
        message: String,
    },

    /// Reading a request status raised
    #[error("Request status is not readable yet")]
    StatusUnavailable,

    /// Capability configuration could not be interpreted
    #[error("Invalid instrumentation config: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl InstrumentError {
    /// Create a callback error from any message
    #[must_use]
    pub fn callback(message: impl Into<String>) -> Self {
        Self::Callback {
            message: message.into(),
        }
    }

    /// Create a missing-capability error
    #[must_use]
    pub fn missing(category: impl Into<String>, requirement: impl Into<String>) -> Self {
        Self::MissingCapability {
            category: category.into(),
            requirement: requirement.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = InstrumentError::AlreadyPatched {
            target: "XMLHttpRequest.prototype".to_string(),
            property: "open".to_string(),
        };
        assert_eq!(err.to_string(), "XMLHttpRequest.prototype.open is already patched");

        let err = InstrumentError::missing("network", "no fetch");
        assert_eq!(
            err.to_string(),
            "network instrumentation unavailable: no fetch"
        );

        assert_eq!(
            InstrumentError::callback("boom").to_string(),
            "Host callback failed: boom"
        );
    }

    #[test]
    fn test_from_json_error() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: InstrumentError = parse.unwrap_err().into();
        assert!(matches!(err, InstrumentError::Json(_)));
    }
}

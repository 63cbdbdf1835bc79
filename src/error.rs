//! Error types for the LLM Engine Operator
//!
//! Separates terminal configuration errors (surfaced as `False` conditions and
//! never retried) from transient collaborator failures (retried with backoff,
//! never written to status).

use std::time::Duration;
use thiserror::Error;

/// Unified error type for the operator
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Resolution Errors
    // =========================================================================
    #[error("Unknown engine type: {engine_type}")]
    UnknownEngineType { engine_type: String },

    #[error("No models storage defined for engine type {engine_type}")]
    MissingStorage { engine_type: String },

    #[error("List entry without a key in {list}: {entry}")]
    MissingKey { list: String, entry: String },

    #[error("Download script template error: {0}")]
    Template(String),

    #[error("{kind}/{name} is already controlled by {owner}")]
    NameCollision {
        kind: String,
        name: String,
        owner: String,
    },

    // =========================================================================
    // Kubernetes Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Resource not found: {kind}/{name}")]
    NotFound { kind: String, name: String },

    #[error("Resource version conflict: {kind}/{name}")]
    Conflict { kind: String, name: String },

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<minijinja::Error> for Error {
    fn from(err: minijinja::Error) -> Self {
        Error::Template(err.to_string())
    }
}

/// Action to take on error during reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Requeue with exponential backoff
    RequeueWithBackoff,
    /// Requeue after specific duration
    RequeueAfter(Duration),
    /// Don't requeue, wait for changes
    NoRequeue,
}

impl Error {
    /// Determine what action to take for this error
    pub fn action(&self) -> ErrorAction {
        match self {
            // Lost an optimistic-concurrency race, re-run from a fresh fetch
            Error::Conflict { .. } => ErrorAction::RequeueAfter(Duration::from_secs(1)),

            // Referenced entity gone, it may come back
            Error::NotFound { .. } => ErrorAction::RequeueAfter(Duration::from_secs(60)),

            // The user has to change the resource
            Error::UnknownEngineType { .. }
            | Error::MissingStorage { .. }
            | Error::MissingKey { .. }
            | Error::Template(_)
            | Error::NameCollision { .. }
            | Error::Configuration(_) => ErrorAction::NoRequeue,

            _ => ErrorAction::RequeueWithBackoff,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        !matches!(self.action(), ErrorAction::NoRequeue)
    }

    /// Terminal errors are reported on the entity's conditions
    pub fn is_terminal(&self) -> bool {
        !self.is_retryable()
    }

    /// Condition reason for errors written to status
    pub fn condition_reason(&self) -> &'static str {
        match self {
            Error::UnknownEngineType { .. } => "UnknownEngineType",
            Error::MissingStorage { .. } => "MissingStorage",
            Error::MissingKey { .. } => "InvalidOverride",
            Error::Template(_) => "TemplateError",
            Error::NameCollision { .. } => "NameCollision",
            Error::NotFound { .. } => "NotFound",
            Error::Configuration(_) => "InvalidConfiguration",
            _ => "ReconcileError",
        }
    }
}

/// Result type alias for the operator
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_actions() {
        let err = Error::Conflict {
            kind: "Deployment".into(),
            name: "ollama-llama3".into(),
        };
        assert_eq!(err.action(), ErrorAction::RequeueAfter(Duration::from_secs(1)));

        let err = Error::MissingStorage {
            engine_type: "vllm".into(),
        };
        assert_eq!(err.action(), ErrorAction::NoRequeue);

        let err = Error::Internal("boom".into());
        assert_eq!(err.action(), ErrorAction::RequeueWithBackoff);
    }

    #[test]
    fn test_error_retryable() {
        let transient = Error::Conflict {
            kind: "Service".into(),
            name: "ollama-llama3".into(),
        };
        assert!(transient.is_retryable());

        let config_err = Error::UnknownEngineType {
            engine_type: "tgi".into(),
        };
        assert!(!config_err.is_retryable());
        assert!(config_err.is_terminal());
    }

    #[test]
    fn test_condition_reasons() {
        assert_eq!(Error::Template("bad".into()).condition_reason(), "TemplateError");
        assert_eq!(
            Error::MissingKey {
                list: "env".into(),
                entry: "{}".into()
            }
            .condition_reason(),
            "InvalidOverride"
        );
    }
}

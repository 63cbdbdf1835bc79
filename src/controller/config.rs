//! Operator configuration

use std::path::PathBuf;
use std::time::Duration;

// =============================================================================
// Requeue Intervals
// =============================================================================

/// How long to wait before revisiting an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequeueConfig {
    /// Periodic resync of healthy entities
    pub ready: Duration,
    /// Model whose engine does not exist yet
    pub engine_missing: Duration,
    /// Lost an optimistic-concurrency race
    pub conflict: Duration,
    /// Any other retryable failure
    pub error: Duration,
}

impl Default for RequeueConfig {
    fn default() -> Self {
        Self {
            ready: Duration::from_secs(300),
            engine_missing: Duration::from_secs(30),
            conflict: Duration::from_secs(1),
            error: Duration::from_secs(15),
        }
    }
}

// =============================================================================
// Operator Configuration
// =============================================================================

/// Configuration for the controllers
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    /// Namespace to watch, all namespaces when `None`
    pub namespace: Option<String>,
    /// Field manager recorded on writes
    pub field_manager: String,
    /// Requeue intervals
    pub requeue: RequeueConfig,
    /// Optional YAML file overlaying the built-in engine defaults
    pub defaults_file: Option<PathBuf>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            field_manager: "llm-engine-operator".to_string(),
            requeue: RequeueConfig::default(),
            defaults_file: None,
        }
    }
}

//! InferenceEngine CRD
//!
//! An engine instance of a given engine type (e.g. ollama). Its fields
//! override the built-in defaults of that engine type, and its
//! `modelDeploymentTemplate` is inherited by every model referencing it.

use k8s_openapi::api::core::v1::EnvVar;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::condition::Condition;
use super::deployment::ModelDeploymentTemplate;

// =============================================================================
// InferenceEngine CRD
// =============================================================================

/// InferenceEngine describes an inference server and the defaults it applies
/// to the models it serves.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "ai.billyronks.io",
    version = "v1",
    kind = "InferenceEngine",
    plural = "inferenceengines",
    shortname = "ie",
    status = "InferenceEngineStatus",
    printcolumn = r#"{"name": "Type", "type": "string", "jsonPath": ".spec.engineType"}"#,
    printcolumn = r#"{"name": "Image", "type": "string", "jsonPath": ".spec.image"}"#,
    printcolumn = r#"{"name": "Ready", "type": "boolean", "jsonPath": ".status.ready"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct InferenceEngineSpec {
    /// Engine type tag selecting the built-in defaults (e.g. "ollama")
    pub engine_type: String,

    /// Serving container image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Port the engine listens on inside the container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,

    /// Port of the ClusterIP service in front of each workload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_port: Option<i32>,

    /// Engine-wide container command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,

    /// Engine-wide environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<EnvVar>>,

    /// Deployment defaults for every model served by this engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_deployment_template: Option<ModelDeploymentTemplate>,
}

// =============================================================================
// Status
// =============================================================================

/// Observed state of the InferenceEngine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InferenceEngineStatus {
    /// Whether the engine is ready to serve
    #[serde(default)]
    pub ready: bool,

    /// Generation last reconciled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Conditions
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

// =============================================================================
// Implementations
// =============================================================================

impl InferenceEngine {
    /// Check if any condition has been recorded yet
    pub fn has_conditions(&self) -> bool {
        self.status
            .as_ref()
            .map(|s| !s.conditions.is_empty())
            .unwrap_or(false)
    }
}

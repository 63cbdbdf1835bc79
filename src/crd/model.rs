//! InferenceModel CRD
//!
//! A model served by an InferenceEngine. Each model owns one workload and one
//! endpoint; its `modelDeployment` overrides the engine's template.

use k8s_openapi::api::core::v1::ResourceRequirements;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::condition::Condition;
use super::deployment::ModelDeploymentTemplate;

// =============================================================================
// InferenceModel CRD
// =============================================================================

/// InferenceModel deploys one model into the engine named by `engineRef`.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "ai.billyronks.io",
    version = "v1",
    kind = "InferenceModel",
    plural = "inferencemodels",
    shortname = "im",
    status = "InferenceModelStatus",
    printcolumn = r#"{"name": "Model", "type": "string", "jsonPath": ".spec.name"}"#,
    printcolumn = r#"{"name": "Engine", "type": "string", "jsonPath": ".spec.engineRef"}"#,
    printcolumn = r#"{"name": "Replicas", "type": "integer", "jsonPath": ".spec.replicas"}"#,
    printcolumn = r#"{"name": "Ready", "type": "boolean", "jsonPath": ".status.ready"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct InferenceModelSpec {
    /// Display name of the model, also used for the managed object names
    pub name: String,

    /// Name of the model inside the engine; defaults to `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_in_engine: Option<String>,

    /// InferenceEngine in the same namespace serving this model
    pub engine_ref: String,

    /// Number of serving replicas
    #[serde(default = "default_replicas")]
    #[schemars(range(min = 1))]
    pub replicas: i32,

    /// Where the model is downloaded from, if the engine needs a URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_url: Option<String>,

    /// Serving image, overriding the engine's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Port the engine listens on, overriding the engine's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,

    /// Port exposed by the model's Service, overriding the engine's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_port: Option<i32>,

    /// Compute resources of the serving container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    /// Overrides of the engine's model deployment template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_deployment: Option<ModelDeploymentTemplate>,
}

// =============================================================================
// Status
// =============================================================================

/// Observed state of the InferenceModel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InferenceModelStatus {
    /// Whether the model is deployed and serving
    #[serde(default)]
    pub ready: bool,

    /// Generation last reconciled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Conditions
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

fn default_replicas() -> i32 {
    1
}

// =============================================================================
// Implementations
// =============================================================================

impl InferenceModel {
    /// Name the engine knows the model by
    pub fn name_in_engine(&self) -> &str {
        match self.spec.name_in_engine.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.spec.name,
        }
    }
}

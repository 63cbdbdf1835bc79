//! Shared Deployment Template Types
//!
//! The model deployment template is carried by both the engine
//! (`modelDeploymentTemplate`) and the model (`modelDeployment`). Every field
//! is optional: absence means "inherit from the level below".

use k8s_openapi::api::core::v1::{
    EmptyDirVolumeSource, EnvVar, HostPathVolumeSource, NFSVolumeSource,
    PersistentVolumeClaimVolumeSource,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// =============================================================================
// Model Deployment Template
// =============================================================================

/// Overridable settings for how a model is deployed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelDeploymentTemplate {
    /// Command line of the serving container, executable first; becomes the
    /// container's `command`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,

    /// Environment variables, merged by name with the lower levels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<EnvVar>>,

    /// Where models are loaded from and where the engine keeps its cache
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageSpec>,

    /// Image of the init step preparing the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_image: Option<String>,

    /// Script run by the init step; supports `{{ model_name }}`,
    /// `{{ model_url }}` and `{{ model_dir }}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_scripts: Option<String>,
}

// =============================================================================
// Storage
// =============================================================================

/// Named storage mounts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    /// Inference cache, usually one emptyDir per pod
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<StorageMount>,

    /// Model files; mandatory after resolution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<StorageMount>,
}

/// A path inside the container backed by a volume source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageMount {
    /// Mount path in the container
    pub path: String,

    /// Volume backing the mount
    #[serde(flatten)]
    pub source: VolumeSourceSpec,
}

/// Supported volume sources; the first one set wins
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSourceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_dir: Option<EmptyDirVolumeSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_path: Option<HostPathVolumeSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<PersistentVolumeClaimVolumeSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nfs: Option<NFSVolumeSource>,
}

impl StorageMount {
    /// Mount backed by a fresh emptyDir
    pub fn empty_dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: VolumeSourceSpec {
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Default::default()
            },
        }
    }

    /// Mount backed by an existing claim
    pub fn claim(path: impl Into<String>, claim_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: VolumeSourceSpec {
                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                    claim_name: claim_name.into(),
                    read_only: None,
                }),
                ..Default::default()
            },
        }
    }
}

impl VolumeSourceSpec {
    /// True when no source is configured, which kubernetes treats as emptyDir
    pub fn is_empty(&self) -> bool {
        self.empty_dir.is_none()
            && self.host_path.is_none()
            && self.persistent_volume_claim.is_none()
            && self.nfs.is_none()
    }
}

/// Shorthand for a plain name/value environment variable
pub fn env_var(name: impl Into<String>, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.into(),
        value: Some(value.into()),
        value_from: None,
    }
}

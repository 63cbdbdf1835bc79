//! Engine-Type Defaults
//!
//! Built-in baseline configuration per supported engine type. The table is
//! assembled once at startup (built-ins plus an optional YAML overlay) and is
//! read-only afterwards; it reaches the resolver through the controller
//! context.

use crate::crd::{env_var, StorageMount, StorageSpec};
use crate::error::{Error, Result};
use k8s_openapi::api::core::v1::{EmptyDirVolumeSource, EnvVar};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Engine type tag of the Ollama engine
pub const ENGINE_OLLAMA: &str = "ollama";

/// Engine type tag of the vLLM engine
pub const ENGINE_VLLM: &str = "vllm";

const OLLAMA_IMAGE: &str = "ollama/ollama:latest";
const VLLM_IMAGE: &str = "vllm/vllm-openai:latest";

// =============================================================================
// Engine Type Defaults
// =============================================================================

/// Baseline deployment settings of one engine type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineTypeDefaults {
    /// Serving container image
    pub image: String,
    /// Listen port inside the container
    pub port: i32,
    /// Service port
    pub service_port: i32,
    /// Container command line
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment
    #[serde(default)]
    pub env: Vec<EnvVar>,
    /// Storage mounts
    #[serde(default)]
    pub storage: StorageSpec,
    /// Replica count when the model does not say
    #[serde(default = "default_replicas")]
    pub replicas: i32,
    /// Init step image
    #[serde(default)]
    pub download_image: String,
    /// Init step script template
    #[serde(default)]
    pub download_scripts: String,
}

fn default_replicas() -> i32 {
    1
}

/// Defaults of the Ollama engine
pub fn ollama_defaults() -> EngineTypeDefaults {
    EngineTypeDefaults {
        image: OLLAMA_IMAGE.to_string(),
        port: 11434,
        service_port: 8080,
        args: vec!["/bin/ollama".to_string(), "serve".to_string()],
        env: vec![
            env_var("OLLAMA_MODELS", "/models"),
            env_var("OLLAMA_CACHE_DIR", "/cache_dir"),
        ],
        storage: StorageSpec {
            models: Some(StorageMount::empty_dir("/models")),
            cache: Some(StorageMount {
                path: "/cache_dir".to_string(),
                source: crate::crd::VolumeSourceSpec {
                    empty_dir: Some(EmptyDirVolumeSource {
                        medium: None,
                        size_limit: Some(Quantity("2Gi".to_string())),
                    }),
                    ..Default::default()
                },
            }),
        },
        replicas: 1,
        download_image: OLLAMA_IMAGE.to_string(),
        download_scripts: "ollama serve & sleep 10 && ollama pull {{ model_name }}".to_string(),
    }
}

/// Defaults of the vLLM OpenAI-compatible server; storage must be supplied
pub fn vllm_defaults() -> EngineTypeDefaults {
    EngineTypeDefaults {
        image: VLLM_IMAGE.to_string(),
        port: 8000,
        service_port: 8080,
        args: vec![
            "python3".to_string(),
            "-m".to_string(),
            "vllm.entrypoints.openai.api_server".to_string(),
            "--host=0.0.0.0".to_string(),
            "--port=8000".to_string(),
        ],
        env: vec![env_var("HF_HOME", "/models")],
        storage: StorageSpec::default(),
        replicas: 1,
        download_image: String::new(),
        download_scripts: String::new(),
    }
}

// =============================================================================
// Defaults Table
// =============================================================================

/// Read-only table of engine-type defaults keyed by lowercase tag
#[derive(Debug, Clone, Default)]
pub struct EngineDefaultsTable {
    entries: BTreeMap<String, EngineTypeDefaults>,
}

impl EngineDefaultsTable {
    /// Table with no entries
    pub fn empty() -> Self {
        Self::default()
    }

    /// Table with the built-in engine types
    pub fn builtin() -> Self {
        Self::empty()
            .with(ENGINE_OLLAMA, ollama_defaults())
            .with(ENGINE_VLLM, vllm_defaults())
    }

    /// Add or replace an entry
    pub fn with(mut self, engine_type: &str, defaults: EngineTypeDefaults) -> Self {
        self.entries.insert(engine_type.to_lowercase(), defaults);
        self
    }

    /// Built-ins overlaid with entries from a YAML map of tag to defaults
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let overlay: BTreeMap<String, EngineTypeDefaults> = serde_yaml::from_str(yaml)?;
        let mut table = Self::builtin();
        for (engine_type, defaults) in overlay {
            if defaults.image.is_empty() {
                return Err(Error::Configuration(format!(
                    "engine type {} has no image",
                    engine_type
                )));
            }
            table = table.with(&engine_type, defaults);
        }
        Ok(table)
    }

    /// Load a YAML overlay from disk
    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        let table = Self::from_yaml(&yaml)?;
        info!(
            "Loaded engine defaults from {}: {:?}",
            path.display(),
            table.engine_types().collect::<Vec<_>>()
        );
        Ok(table)
    }

    /// Look up the defaults of an engine type
    pub fn get(&self, engine_type: &str) -> Result<&EngineTypeDefaults> {
        self.entries
            .get(&engine_type.to_lowercase())
            .ok_or_else(|| Error::UnknownEngineType {
                engine_type: engine_type.to_string(),
            })
    }

    /// Known engine type tags
    pub fn engine_types(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

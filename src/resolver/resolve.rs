//! Config Resolver
//!
//! Merges `built-in defaults < engine override < model override` into one
//! fully specified [`ResolvedDeploymentSpec`]. Resolution is pure: no I/O,
//! same inputs give the same output.

use crate::crd::{InferenceEngineSpec, InferenceModel, ModelDeploymentTemplate, StorageMount, StorageSpec};
use crate::error::{Error, Result};
use k8s_openapi::api::core::v1::{EnvVar, ResourceRequirements};
use std::sync::Arc;

use super::defaults::EngineDefaultsTable;
use super::merge::{env_key, merge_by_key, merge_scalar, merge_storage};

// =============================================================================
// Overrides
// =============================================================================

/// Engine-level overrides; every field optional
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineOverride {
    pub image: Option<String>,
    pub port: Option<i32>,
    pub service_port: Option<i32>,
    pub args: Option<Vec<String>>,
    pub env: Option<Vec<EnvVar>>,
    pub storage: Option<StorageSpec>,
    pub download_image: Option<String>,
    pub download_scripts: Option<String>,
}

impl EngineOverride {
    /// Flatten an engine spec; the model deployment template is more
    /// specific than the engine-wide `args`/`env`
    pub fn from_spec(spec: &InferenceEngineSpec) -> Result<Self> {
        let template = spec.model_deployment_template.clone().unwrap_or_default();

        let args = merge_scalar([spec.args.as_ref(), template.args.as_ref()]);
        let env = merge_by_key(
            "env",
            env_key,
            [spec.env.as_deref(), template.env.as_deref()],
        )?;

        Ok(Self {
            image: spec.image.clone(),
            port: spec.port,
            service_port: spec.service_port,
            args: Some(args),
            env: Some(env),
            storage: template.storage,
            download_image: template.download_image,
            download_scripts: template.download_scripts,
        })
    }
}

/// Model-level overrides plus the model's identity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelOverride {
    pub image: Option<String>,
    pub port: Option<i32>,
    pub service_port: Option<i32>,
    pub name: Option<String>,
    pub name_in_engine: Option<String>,
    pub replicas: Option<i32>,
    pub model_url: Option<String>,
    pub resources: Option<ResourceRequirements>,
    pub deployment: ModelDeploymentTemplate,
}

impl ModelOverride {
    pub fn from_model(model: &InferenceModel) -> Self {
        Self {
            image: model.spec.image.clone(),
            port: model.spec.port,
            service_port: model.spec.service_port,
            name: Some(model.spec.name.clone()),
            name_in_engine: Some(model.name_in_engine().to_string()),
            replicas: Some(model.spec.replicas),
            model_url: model.spec.model_url.clone(),
            resources: model.spec.resources.clone(),
            deployment: model.spec.model_deployment.clone().unwrap_or_default(),
        }
    }
}

// =============================================================================
// Resolved Spec
// =============================================================================

/// Identity of the model a workload serves
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelIdentity {
    pub name: String,
    pub name_in_engine: String,
    pub source_url: String,
}

/// Storage after resolution; the models mount is mandatory
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStorage {
    pub models: StorageMount,
    pub cache: Option<StorageMount>,
}

/// Fully merged deployment description
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDeploymentSpec {
    pub engine_type: String,
    pub image: String,
    pub port: i32,
    pub service_port: i32,
    pub args: Vec<String>,
    pub env: Vec<EnvVar>,
    pub storage: ResolvedStorage,
    pub replicas: i32,
    pub resources: ResourceRequirements,
    pub download_image: String,
    pub download_scripts: String,
    pub model: ModelIdentity,
}

// =============================================================================
// Resolver
// =============================================================================

/// Resolves layered configuration against an injected defaults table
#[derive(Debug, Clone)]
pub struct Resolver {
    defaults: Arc<EngineDefaultsTable>,
}

impl Resolver {
    pub fn new(defaults: Arc<EngineDefaultsTable>) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &EngineDefaultsTable {
        &self.defaults
    }

    /// Merge the three precedence levels for an engine type
    pub fn resolve(
        &self,
        engine_type: &str,
        engine: Option<&EngineOverride>,
        model: Option<&ModelOverride>,
    ) -> Result<ResolvedDeploymentSpec> {
        let builtin = self.defaults.get(engine_type)?;
        let deployment = model.map(|m| &m.deployment);

        let image = merge_scalar([
            Some(&builtin.image),
            engine.and_then(|e| e.image.as_ref()),
            model.and_then(|m| m.image.as_ref()),
        ]);
        let port = merge_scalar([
            Some(&builtin.port),
            engine.and_then(|e| e.port.as_ref()),
            model.and_then(|m| m.port.as_ref()),
        ]);
        let service_port = merge_scalar([
            Some(&builtin.service_port),
            engine.and_then(|e| e.service_port.as_ref()),
            model.and_then(|m| m.service_port.as_ref()),
        ]);

        let args = merge_scalar([
            Some(&builtin.args),
            engine.and_then(|e| e.args.as_ref()),
            deployment.and_then(|d| d.args.as_ref()),
        ]);

        let env = merge_by_key(
            "env",
            env_key,
            [
                Some(&builtin.env[..]),
                engine.and_then(|e| e.env.as_deref()),
                deployment.and_then(|d| d.env.as_deref()),
            ],
        )?;

        let storage = merge_storage([
            Some(&builtin.storage),
            engine.and_then(|e| e.storage.as_ref()),
            deployment.and_then(|d| d.storage.as_ref()),
        ]);
        let models = storage.models.ok_or_else(|| Error::MissingStorage {
            engine_type: engine_type.to_string(),
        })?;

        let download_scripts = merge_scalar([
            Some(&builtin.download_scripts),
            engine.and_then(|e| e.download_scripts.as_ref()),
            deployment.and_then(|d| d.download_scripts.as_ref()),
        ]);
        let download_image = merge_scalar([
            Some(&image),
            Some(&builtin.download_image),
            engine.and_then(|e| e.download_image.as_ref()),
            deployment.and_then(|d| d.download_image.as_ref()),
        ]);

        let replicas = merge_scalar([Some(&builtin.replicas), model.and_then(|m| m.replicas.as_ref())]);

        let name = merge_scalar::<String>([model.and_then(|m| m.name.as_ref())]);
        let name_in_engine = merge_scalar([Some(&name), model.and_then(|m| m.name_in_engine.as_ref())]);
        let source_url = merge_scalar::<String>([model.and_then(|m| m.model_url.as_ref())]);

        Ok(ResolvedDeploymentSpec {
            engine_type: engine_type.to_lowercase(),
            image,
            port,
            service_port,
            args,
            env,
            storage: ResolvedStorage {
                models,
                cache: storage.cache,
            },
            replicas,
            resources: model.and_then(|m| m.resources.clone()).unwrap_or_default(),
            download_image,
            download_scripts,
            model: ModelIdentity {
                name,
                name_in_engine,
                source_url,
            },
        })
    }

    /// Resolve a model against the engine it references
    pub fn resolve_model(
        &self,
        engine: &InferenceEngineSpec,
        model: &InferenceModel,
    ) -> Result<ResolvedDeploymentSpec> {
        let engine_override = EngineOverride::from_spec(engine)?;
        let model_override = ModelOverride::from_model(model);
        self.resolve(&engine.engine_type, Some(&engine_override), Some(&model_override))
    }

    /// Resolve an engine on its own, with no model to download
    pub fn resolve_engine(&self, engine: &InferenceEngineSpec) -> Result<ResolvedDeploymentSpec> {
        let engine_override = EngineOverride::from_spec(engine)?;
        let mut resolved = self.resolve(&engine.engine_type, Some(&engine_override), None)?;
        resolved.download_scripts.clear();
        Ok(resolved)
    }
}

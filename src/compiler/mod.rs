//! Desired-State Compiler
//!
//! Turns a [`ResolvedDeploymentSpec`] into the workload (Deployment) and
//! endpoint (Service) that serve it. Compilation is pure and produces
//! either both objects or an error.

pub mod endpoint;
pub mod naming;
pub mod workload;

use crate::error::Result;
use crate::resolver::ResolvedDeploymentSpec;
use crate::template::{render, ScriptContext};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use std::collections::BTreeMap;

pub use endpoint::build_service;
pub use naming::{labels, normalize, resource_name, Scope};
pub use workload::{build_deployment, CACHE_VOLUME, DOWNLOAD_CONTAINER, MODELS_VOLUME};

/// Where the managed objects live and what they are called
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadIdentity {
    pub namespace: String,
    pub name: String,
    pub scope: Scope,
}

impl WorkloadIdentity {
    /// Identity of the objects serving `model_name` on `engine_type`
    pub fn new(namespace: &str, engine_type: &str, model_name: &str, scope: Scope) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: resource_name(engine_type, model_name),
            scope,
        }
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        labels(self.scope, &self.name)
    }
}

/// Compile a resolved spec into its workload and endpoint
pub fn compile(
    resolved: &ResolvedDeploymentSpec,
    identity: &WorkloadIdentity,
) -> Result<(Deployment, Service)> {
    let script = render(
        &resolved.download_scripts,
        &ScriptContext {
            model_name: resolved.model.name_in_engine.clone(),
            model_url: resolved.model.source_url.clone(),
            model_dir: resolved.storage.models.path.clone(),
        },
    )?;

    let deployment = build_deployment(resolved, identity, &script);
    let service = build_service(resolved, identity);
    Ok((deployment, service))
}

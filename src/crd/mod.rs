//! Custom Resource Definitions for the LLM Engine Operator
//!
//! This module contains all CRD types:
//! - InferenceEngine: An engine instance and the defaults it applies to models
//! - InferenceModel: A model deployed into an engine
//! - Shared deployment template, storage and condition types

pub mod condition;
pub mod deployment;
pub mod engine;
pub mod model;

pub use condition::*;
pub use deployment::*;
pub use engine::*;
pub use model::*;

use kube::CustomResourceExt;

/// Render both CRDs as a multi-document YAML manifest
pub fn crd_manifests() -> crate::error::Result<String> {
    let engine = serde_yaml::to_string(&InferenceEngine::crd())?;
    let model = serde_yaml::to_string(&InferenceModel::crd())?;
    Ok(format!("{}---\n{}", engine, model))
}

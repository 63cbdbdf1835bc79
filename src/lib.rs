//! LLM Engine Operator
//!
//! A Kubernetes operator that deploys LLM inference engines and the models
//! they serve. Configuration is layered (engine-type defaults, engine, model),
//! resolved into one concrete spec, compiled into a Deployment and a Service,
//! and kept in sync by level-triggered reconciliation.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │            Controllers (InferenceEngine, InferenceModel)           │
//! ├────────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌──────────────┐   ┌────────────────────────┐  │
//! │  │   Resolver   │──▶│   Compiler   │──▶│  Reconciler (diff,     │  │
//! │  │ (3 layers)   │   │ (+ template) │   │  replicas, conditions) │  │
//! │  └──────────────┘   └──────────────┘   └───────────┬────────────┘  │
//! ├────────────────────────────────────────────────────┼───────────────┤
//! │                 ObjectStore port (kube / memory)   ▼               │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`resolver`]: Engine-type defaults and the layered merge
//! - [`template`]: Download script rendering
//! - [`compiler`]: Resolved spec to Deployment and Service
//! - [`reconcile`]: Create, diff, patch and condition tracking
//! - [`controller`]: kube-runtime controllers, metrics, configuration
//! - [`crd`]: Custom Resource Definitions
//! - [`domain`]: Object store port
//! - [`error`]: Error types and handling

pub mod compiler;
pub mod controller;
pub mod crd;
pub mod domain;
pub mod error;
pub mod reconcile;
pub mod resolver;
pub mod template;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use compiler::{compile, resource_name, Scope, WorkloadIdentity};

pub use controller::{Context, KubeStore, Metrics, OperatorConfig, RequeueConfig};

pub use crd::{
    crd_manifests, Condition, ConditionStatus, InferenceEngine, InferenceEngineSpec,
    InferenceEngineStatus, InferenceModel, InferenceModelSpec, InferenceModelStatus,
    ModelDeploymentTemplate, StorageMount, StorageSpec,
};

pub use domain::{set_owner_reference, ObjectKey, ObjectStore};

pub use error::{Error, ErrorAction, Result};

pub use reconcile::{upsert, ObjectReconciler, ReconcileOutcome};

pub use resolver::{
    EngineDefaultsTable, EngineOverride, EngineTypeDefaults, ModelOverride,
    ResolvedDeploymentSpec, Resolver,
};

pub use template::{render, ScriptContext};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

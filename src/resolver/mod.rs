//! Configuration Resolution
//!
//! Turns the three override levels (engine-type defaults, engine, model) into
//! one concrete deployment description.

pub mod defaults;
pub mod merge;
pub mod resolve;

pub use defaults::{EngineDefaultsTable, EngineTypeDefaults, ENGINE_OLLAMA, ENGINE_VLLM};
pub use merge::{env_key, merge_by_key, merge_scalar, merge_storage, MergeValue};
pub use resolve::{
    EngineOverride, ModelIdentity, ModelOverride, ResolvedDeploymentSpec, ResolvedStorage, Resolver,
};

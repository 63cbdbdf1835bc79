//! Domain Ports - Boundary between the reconcile core and the cluster
//!
//! The core never talks to the API server directly; it reads and writes
//! objects through [`ObjectStore`]. The kube-backed adapter lives in
//! `controller::store`, tests use an in-memory double.

use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;
use serde::Serialize;
use serde_json::{json, Value};

// =============================================================================
// Object Key
// =============================================================================

/// Namespace/name identity of an object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of an existing object
    pub fn of<K: Resource>(obj: &K) -> Result<Self> {
        let meta = obj.meta();
        let name = meta
            .name
            .clone()
            .ok_or_else(|| Error::Internal("object has no name".into()))?;
        let namespace = meta
            .namespace
            .clone()
            .ok_or_else(|| Error::Internal(format!("object {} has no namespace", name)))?;
        Ok(Self { namespace, name })
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// =============================================================================
// Object Store
// =============================================================================

/// Read/write access to one kind of namespaced object
///
/// Implementations must map "not found" to `Ok(None)` on `get` and version
/// conflicts to [`Error::Conflict`].
#[async_trait]
pub trait ObjectStore<K>: Send + Sync
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    /// Fetch an object, `None` if it does not exist
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>>;

    /// List objects in a namespace
    async fn list(&self, namespace: &str) -> Result<Vec<K>>;

    /// Create a new object
    async fn create(&self, obj: &K) -> Result<K>;

    /// Merge-patch `current` with the labels and spec of `desired`,
    /// leaving the identity of `current` untouched
    async fn patch(&self, current: &K, desired: &K) -> Result<K>;

    /// Replace an object, guarded by its resource version
    async fn update(&self, obj: &K) -> Result<K>;

    /// Replace only the status sub-resource, guarded by its resource version
    async fn update_status(&self, obj: &K) -> Result<K>;

    /// Kind name used in logs and errors
    fn kind(&self) -> String {
        K::kind(&()).to_string()
    }
}

// =============================================================================
// Ownership
// =============================================================================

/// Make `owner` the controller of `child`
///
/// Garbage collection of the child follows from this reference; there is no
/// other deletion path.
pub fn set_owner_reference<O, C>(owner: &O, child: &mut C) -> Result<()>
where
    O: Resource<DynamicType = ()>,
    C: Resource,
{
    let owner_ref = owner.controller_owner_ref(&()).ok_or_else(|| {
        Error::Internal(format!(
            "{} {} has no uid",
            O::kind(&()),
            owner.meta().name.as_deref().unwrap_or("unknown")
        ))
    })?;

    let refs = child.meta_mut().owner_references.get_or_insert_with(Vec::new);
    refs.retain(|r| r.controller != Some(true));
    refs.push(owner_ref);
    Ok(())
}

/// The controlling owner of an object, if any
pub fn controller_of<K: Resource>(obj: &K) -> Option<&OwnerReference> {
    obj.meta()
        .owner_references
        .as_ref()?
        .iter()
        .find(|r| r.controller == Some(true))
}

/// JSON merge patch taking labels and spec from `desired`
///
/// The resource version of `current` is carried so a concurrent write
/// surfaces as a conflict instead of being overwritten.
pub fn merge_patch_body<K>(current: &K, desired: &K) -> Result<Value>
where
    K: Resource + Serialize,
{
    let desired_value = serde_json::to_value(desired)?;
    let mut body = json!({
        "metadata": {
            "labels": desired.meta().labels,
            "resourceVersion": current.meta().resource_version,
        }
    });
    if let Some(spec) = desired_value.get("spec") {
        body["spec"] = spec.clone();
    }
    Ok(body)
}

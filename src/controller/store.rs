//! Kubernetes-backed [`ObjectStore`]

use crate::domain::{merge_patch_body, ObjectKey, ObjectStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::marker::PhantomData;
use tracing::debug;

/// Reads and writes one namespaced kind through the API server
pub struct KubeStore<K> {
    client: Client,
    field_manager: String,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeStore<K>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
            _kind: PhantomData,
        }
    }

    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }

    fn classify(&self, name: &str, err: kube::Error) -> Error {
        classify_error(&K::kind(&()), name, err)
    }
}

/// Map API status codes onto the operator's error kinds
pub fn classify_error(kind: &str, name: &str, err: kube::Error) -> Error {
    match err {
        kube::Error::Api(ref response) if response.code == 404 => Error::NotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(ref response) if response.code == 409 => Error::Conflict {
            kind: kind.to_string(),
            name: name.to_string(),
        },
        other => Error::Kube(other),
    }
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore<K>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>> {
        self.api(&key.namespace)
            .get_opt(&key.name)
            .await
            .map_err(|e| self.classify(&key.name, e))
    }

    async fn list(&self, namespace: &str) -> Result<Vec<K>> {
        let list = self.api(namespace).list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn create(&self, obj: &K) -> Result<K> {
        let key = ObjectKey::of(obj)?;
        debug!(kind = %K::kind(&()), object = %key, "Creating object");
        self.api(&key.namespace)
            .create(&self.post_params(), obj)
            .await
            .map_err(|e| self.classify(&key.name, e))
    }

    async fn patch(&self, current: &K, desired: &K) -> Result<K> {
        let key = ObjectKey::of(current)?;
        let body = merge_patch_body(current, desired)?;
        let params = PatchParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        };
        debug!(kind = %K::kind(&()), object = %key, "Patching object");
        self.api(&key.namespace)
            .patch(&key.name, &params, &Patch::Merge(&body))
            .await
            .map_err(|e| self.classify(&key.name, e))
    }

    async fn update(&self, obj: &K) -> Result<K> {
        let key = ObjectKey::of(obj)?;
        self.api(&key.namespace)
            .replace(&key.name, &self.post_params(), obj)
            .await
            .map_err(|e| self.classify(&key.name, e))
    }

    async fn update_status(&self, obj: &K) -> Result<K> {
        let key = ObjectKey::of(obj)?;
        let data = serde_json::to_vec(obj)?;
        self.api(&key.namespace)
            .replace_status(&key.name, &self.post_params(), data)
            .await
            .map_err(|e| self.classify(&key.name, e))
    }
}

//! In-memory [`ObjectStore`] used by unit tests
//!
//! Behaves like the API server where the reconcile core can tell the
//! difference: resource versions bump on every write, stale writes conflict,
//! patches are JSON merge patches, status updates only touch status. A
//! failure can be armed to make the next create, patch or update fail.

use crate::domain::{merge_patch_body, ObjectKey, ObjectStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use kube::Resource;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Number of calls per store operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get: usize,
    pub list: usize,
    pub create: usize,
    pub patch: usize,
    pub update: usize,
    pub update_status: usize,
}

impl CallCounts {
    pub fn writes(&self) -> usize {
        self.create + self.patch + self.update + self.update_status
    }
}

pub struct MemoryStore<K> {
    objects: Mutex<BTreeMap<ObjectKey, K>>,
    calls: Mutex<CallCounts>,
    version: Mutex<u64>,
    failure: Mutex<Option<Error>>,
}

impl<K> Default for MemoryStore<K> {
    fn default() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(CallCounts::default()),
            version: Mutex::new(0),
            failure: Mutex::new(None),
        }
    }
}

impl<K> MemoryStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object as if it already existed, without counting a call
    pub fn seed(&self, mut obj: K) -> K {
        let key = ObjectKey::of(&obj).expect("seeded objects need a namespace and name");
        if obj.meta().uid.is_none() {
            obj.meta_mut().uid = Some(format!("uid-{}", key.name));
        }
        if obj.meta().generation.is_none() {
            obj.meta_mut().generation = Some(1);
        }
        obj.meta_mut().resource_version = Some(self.bump());
        self.objects.lock().insert(key, obj.clone());
        obj
    }

    /// Current stored copy of an object
    pub fn object(&self, key: &ObjectKey) -> Option<K> {
        self.objects.lock().get(key).cloned()
    }

    /// Change a stored object out of band, bumping its version
    pub fn mutate(&self, key: &ObjectKey, f: impl FnOnce(&mut K)) {
        let version = self.bump();
        if let Some(obj) = self.objects.lock().get_mut(key) {
            f(obj);
            obj.meta_mut().resource_version = Some(version);
        }
    }

    /// Make the next create, patch or update return `error`
    pub fn fail_next_write(&self, error: Error) {
        *self.failure.lock() = Some(error);
    }

    pub fn calls(&self) -> CallCounts {
        *self.calls.lock()
    }

    pub fn reset_calls(&self) {
        *self.calls.lock() = CallCounts::default();
    }

    fn bump(&self) -> String {
        let mut version = self.version.lock();
        *version += 1;
        version.to_string()
    }

    fn armed_failure(&self) -> Result<()> {
        match self.failure.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn conflict(key: &ObjectKey) -> Error {
        Error::Conflict {
            kind: K::kind(&()).to_string(),
            name: key.name.clone(),
        }
    }

    /// Stored copy whose version matches `obj`, or a conflict
    fn fresh(&self, obj: &K) -> Result<(ObjectKey, K)> {
        let key = ObjectKey::of(obj)?;
        let stored = self.object(&key).ok_or_else(|| Error::NotFound {
            kind: K::kind(&()).to_string(),
            name: key.name.clone(),
        })?;
        if stored.meta().resource_version != obj.meta().resource_version {
            return Err(Self::conflict(&key));
        }
        Ok((key, stored))
    }

    fn store(&self, key: ObjectKey, mut obj: K) -> K {
        obj.meta_mut().resource_version = Some(self.bump());
        self.objects.lock().insert(key, obj.clone());
        obj
    }
}

/// RFC 7386 JSON merge patch
fn apply_merge_patch(target: &mut Value, patch: &Value) {
    match patch {
        Value::Object(fields) => {
            if !target.is_object() {
                *target = Value::Object(Default::default());
            }
            if let Value::Object(map) = target {
                for (key, value) in fields {
                    if value.is_null() {
                        map.remove(key);
                    } else {
                        apply_merge_patch(map.entry(key.clone()).or_insert(Value::Null), value);
                    }
                }
            }
        }
        other => *target = other.clone(),
    }
}

#[async_trait]
impl<K> ObjectStore<K> for MemoryStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>> {
        self.calls.lock().get += 1;
        Ok(self.object(key))
    }

    async fn list(&self, namespace: &str) -> Result<Vec<K>> {
        self.calls.lock().list += 1;
        Ok(self
            .objects
            .lock()
            .iter()
            .filter(|(key, _)| key.namespace == namespace)
            .map(|(_, obj)| obj.clone())
            .collect())
    }

    async fn create(&self, obj: &K) -> Result<K> {
        self.calls.lock().create += 1;
        self.armed_failure()?;
        let key = ObjectKey::of(obj)?;
        if self.object(&key).is_some() {
            return Err(Self::conflict(&key));
        }
        let mut obj = obj.clone();
        obj.meta_mut().uid = Some(format!("uid-{}", key.name));
        obj.meta_mut().generation = Some(1);
        Ok(self.store(key, obj))
    }

    async fn patch(&self, current: &K, desired: &K) -> Result<K> {
        self.calls.lock().patch += 1;
        self.armed_failure()?;
        let (key, stored) = self.fresh(current)?;
        let mut value = serde_json::to_value(&stored)?;
        apply_merge_patch(&mut value, &merge_patch_body(current, desired)?);
        Ok(self.store(key, serde_json::from_value(value)?))
    }

    async fn update(&self, obj: &K) -> Result<K> {
        self.calls.lock().update += 1;
        self.armed_failure()?;
        let (key, _) = self.fresh(obj)?;
        Ok(self.store(key, obj.clone()))
    }

    async fn update_status(&self, obj: &K) -> Result<K> {
        self.calls.lock().update_status += 1;
        let (key, stored) = self.fresh(obj)?;
        let mut value = serde_json::to_value(&stored)?;
        let status = serde_json::to_value(obj)?
            .get("status")
            .cloned()
            .unwrap_or(Value::Null);
        value["status"] = status;
        Ok(self.store(key, serde_json::from_value(value)?))
    }
}

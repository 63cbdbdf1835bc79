//! Merge Primitives
//!
//! Precedence helpers shared by the resolver. Inputs are always ordered from
//! lowest to highest precedence; a value is "set" when it is present and not
//! its zero value.

use crate::crd::StorageSpec;
use crate::error::{Error, Result};
use indexmap::IndexMap;
use std::fmt::Debug;
use std::hash::Hash;

// =============================================================================
// Scalar Merge
// =============================================================================

/// Values that have a zero value which never overrides anything
pub trait MergeValue {
    fn is_unset(&self) -> bool;
}

impl MergeValue for String {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

impl MergeValue for i32 {
    fn is_unset(&self) -> bool {
        *self == 0
    }
}

impl<T> MergeValue for Vec<T> {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

/// Last set value in precedence order, or the zero value if none is set
pub fn merge_scalar<'a, T>(values: impl IntoIterator<Item = Option<&'a T>>) -> T
where
    T: MergeValue + Clone + Default + 'a,
{
    values
        .into_iter()
        .flatten()
        .filter(|v| !v.is_unset())
        .last()
        .cloned()
        .unwrap_or_default()
}

// =============================================================================
// Keyed List Merge
// =============================================================================

/// Merge lists by key; for each key the entry from the highest-precedence
/// list wins in full
///
/// Output order is first-seen key order, which keeps repeated merges of the
/// same inputs byte-identical. Callers must not rely on it otherwise.
pub fn merge_by_key<'a, T, K, F>(
    list_name: &str,
    key: F,
    lists: impl IntoIterator<Item = Option<&'a [T]>>,
) -> Result<Vec<T>>
where
    T: Clone + Debug + 'a,
    K: Hash + Eq,
    F: Fn(&T) -> Option<K>,
{
    let mut merged: IndexMap<K, T> = IndexMap::new();

    for list in lists.into_iter().flatten() {
        for entry in list {
            let k = key(entry).ok_or_else(|| Error::MissingKey {
                list: list_name.to_string(),
                entry: format!("{:?}", entry),
            })?;
            merged.insert(k, entry.clone());
        }
    }

    Ok(merged.into_values().collect())
}

/// Key extractor for environment variables; empty names have no key
pub fn env_key(env: &k8s_openapi::api::core::v1::EnvVar) -> Option<String> {
    if env.name.is_empty() {
        None
    } else {
        Some(env.name.clone())
    }
}

// =============================================================================
// Storage Merge
// =============================================================================

/// Last-set-wins per named mount; mounts are replaced whole, never merged
pub fn merge_storage<'a>(levels: impl IntoIterator<Item = Option<&'a StorageSpec>>) -> StorageSpec {
    let mut result = StorageSpec::default();

    for storage in levels.into_iter().flatten() {
        if let Some(models) = &storage.models {
            result.models = Some(models.clone());
        }
        if let Some(cache) = &storage.cache {
            result.cache = Some(cache.clone());
        }
    }

    result
}

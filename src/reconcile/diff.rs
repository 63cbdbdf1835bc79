//! Normalize-and-compare for managed objects
//!
//! Both sides are serialized and stripped of the metadata the API server
//! churns on every write. What remains is compared with "desired covers
//! current" semantics: every field the operator sets must match, fields only
//! the server sets (defaults, status) are ignored. The container fields in
//! [`OWNED_FIELDS`] are the exception: they must match exactly, so removing
//! one from the desired side is a difference too.

use crate::error::Result;
use serde::Serialize;
use serde_json::{Map, Value};

/// Metadata fields excluded from comparison on both sides
pub const CHURN_METADATA: &[&str] = &[
    "resourceVersion",
    "uid",
    "generation",
    "creationTimestamp",
    "deletionTimestamp",
    "deletionGracePeriodSeconds",
    "managedFields",
    "ownerReferences",
    "selfLink",
    "finalizers",
    "annotations",
];

/// Top-level fields excluded from comparison on both sides
pub const CHURN_TOP_LEVEL: &[&str] = &["status"];

/// Container fields the compiler always writes in full
pub const OWNED_FIELDS: &[&str] = &["command", "args", "env", "resources"];

/// Serialize an object and drop churn-only fields
pub fn normalize<K: Serialize>(obj: &K) -> Result<Value> {
    let mut value = serde_json::to_value(obj)?;
    if let Value::Object(map) = &mut value {
        for field in CHURN_TOP_LEVEL {
            map.remove(*field);
        }
        if let Some(Value::Object(meta)) = map.get_mut("metadata") {
            for field in CHURN_METADATA {
                meta.remove(*field);
            }
        }
    }
    Ok(value)
}

/// Whether `current` already carries everything `desired` asks for
pub fn is_up_to_date<K: Serialize>(desired: &K, current: &K) -> Result<bool> {
    Ok(covers(&normalize(desired)?, &normalize(current)?))
}

/// Structural comparison driven by the desired side
///
/// Nulls in `desired` are ignored, an empty desired value matches a field
/// missing from `current`, and arrays must match element by element.
/// Owned fields compare exactly once nulls and empty values are dropped.
pub fn covers(desired: &Value, current: &Value) -> bool {
    match (desired, current) {
        (Value::Null, _) => true,
        (Value::Object(want), Value::Object(have)) => covers_object(want, have),
        (Value::Array(want), Value::Array(have)) => {
            want.len() == have.len() && want.iter().zip(have).all(|(w, h)| covers(w, h))
        }
        (want, have) => want == have,
    }
}

fn covers_object(want: &Map<String, Value>, have: &Map<String, Value>) -> bool {
    let wanted = want.iter().all(|(key, w)| match have.get(key) {
        Some(h) if is_owned(key) => prune(w) == prune(h),
        Some(h) => covers(w, h),
        None => is_empty(w),
    });

    // An owned field the desired side leaves out must be gone from current
    wanted
        && OWNED_FIELDS
            .iter()
            .filter(|key| !want.contains_key(**key))
            .all(|key| have.get(*key).map_or(true, is_empty))
}

fn is_owned(key: &str) -> bool {
    OWNED_FIELDS.contains(&key)
}

/// Drop nulls and empty values, keeping array positions
fn prune(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !is_empty(v))
                .map(|(k, v)| (k.clone(), prune(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(prune).collect()),
        other => other.clone(),
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.values().all(is_empty),
        _ => false,
    }
}

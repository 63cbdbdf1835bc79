//! Status/Condition Tracker
//!
//! Conditions are keyed by type. A condition whose status does not change
//! keeps its transition time; a status change replaces it and stamps the
//! time. Writes go to the status sub-resource only, always against a fresh
//! copy of the entity.

use crate::crd::{
    find_condition, Condition, InferenceEngine, InferenceEngineStatus, InferenceModel,
    InferenceModelStatus, CONDITION_AVAILABLE, CONDITION_READY,
};
use crate::domain::{ObjectKey, ObjectStore};
use crate::error::Result;
use chrono::{DateTime, Utc};
use kube::Resource;
use tracing::debug;

/// An entity carrying `{ready, observedGeneration, conditions}` status
pub trait ConditionedResource: Resource<DynamicType = ()> + Clone + Send + Sync + 'static {
    /// Condition type that drives the `ready` flag
    const PRIMARY_CONDITION: &'static str;

    fn conditions(&self) -> &[Condition];

    fn conditions_mut(&mut self) -> &mut Vec<Condition>;

    fn ready(&self) -> bool;

    fn set_ready(&mut self, ready: bool);

    fn observed_generation(&self) -> Option<i64>;

    fn set_observed_generation(&mut self, generation: Option<i64>);
}

macro_rules! conditioned_resource {
    ($kind:ty, $status:ty, $primary:expr) => {
        impl ConditionedResource for $kind {
            const PRIMARY_CONDITION: &'static str = $primary;

            fn conditions(&self) -> &[Condition] {
                self.status.as_ref().map(|s| &s.conditions[..]).unwrap_or(&[])
            }

            fn conditions_mut(&mut self) -> &mut Vec<Condition> {
                &mut self.status.get_or_insert_with(<$status>::default).conditions
            }

            fn ready(&self) -> bool {
                self.status.as_ref().map(|s| s.ready).unwrap_or(false)
            }

            fn set_ready(&mut self, ready: bool) {
                self.status.get_or_insert_with(<$status>::default).ready = ready;
            }

            fn observed_generation(&self) -> Option<i64> {
                self.status.as_ref().and_then(|s| s.observed_generation)
            }

            fn set_observed_generation(&mut self, generation: Option<i64>) {
                self.status
                    .get_or_insert_with(<$status>::default)
                    .observed_generation = generation;
            }
        }
    };
}

conditioned_resource!(InferenceEngine, InferenceEngineStatus, CONDITION_AVAILABLE);
conditioned_resource!(InferenceModel, InferenceModelStatus, CONDITION_READY);

/// Upsert `condition` into `conditions`; returns whether anything changed
pub fn set_condition(conditions: &mut Vec<Condition>, mut condition: Condition, now: DateTime<Utc>) -> bool {
    let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition.r#type) else {
        condition.last_transition_time = Some(now);
        conditions.push(condition);
        return true;
    };

    if existing.status != condition.status {
        condition.last_transition_time = Some(now);
        *existing = condition;
        return true;
    }

    let mut changed = false;
    if existing.reason != condition.reason {
        existing.reason = condition.reason;
        changed = true;
    }
    if existing.message != condition.message {
        existing.message = condition.message;
        changed = true;
    }
    if existing.last_transition_time.is_none() {
        existing.last_transition_time = Some(now);
        changed = true;
    }
    changed
}

/// Apply `condition` to an entity in memory, deriving `ready` and the
/// observed generation; returns whether the status changed
pub fn apply_condition<K: ConditionedResource>(obj: &mut K, condition: Condition, now: DateTime<Utc>) -> bool {
    let before_ready = obj.ready();
    let before_generation = obj.observed_generation();

    let mut changed = set_condition(obj.conditions_mut(), condition, now);

    let ready = find_condition(obj.conditions(), K::PRIMARY_CONDITION)
        .map(|c| c.is_true())
        .unwrap_or(false);
    let generation = obj.meta().generation;

    if ready != before_ready {
        obj.set_ready(ready);
        changed = true;
    }
    if generation != before_generation {
        obj.set_observed_generation(generation);
        changed = true;
    }
    changed
}

/// Re-fetch the entity and persist `condition` if it changes the status
///
/// Returns `false` when the entity is gone or nothing changed.
pub async fn upsert<K: ConditionedResource>(
    store: &dyn ObjectStore<K>,
    key: &ObjectKey,
    condition: Condition,
) -> Result<bool> {
    let Some(mut obj) = store.get(key).await? else {
        debug!(object = %key, "Entity gone, skipping status update");
        return Ok(false);
    };

    let r#type = condition.r#type.clone();
    let status = condition.status;
    if !apply_condition(&mut obj, condition, Utc::now()) {
        return Ok(false);
    }

    store.update_status(&obj).await?;
    debug!(object = %key, condition = %r#type, status = %status, "Updated condition");
    Ok(true)
}

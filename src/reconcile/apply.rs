//! Fetch-or-create, replica drift, diff-and-patch for one managed object

use crate::domain::{controller_of, ObjectKey, ObjectStore};
use crate::error::{Error, Result};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::Resource;
use serde::Serialize;
use tracing::{debug, info};

use super::diff::is_up_to_date;

// =============================================================================
// Managed Objects
// =============================================================================

/// An object the operator creates and keeps in sync
pub trait ManagedObject: Resource<DynamicType = ()> + Clone + Serialize + Send + Sync + 'static {
    /// Replica count, for kinds that scale
    fn replicas(&self) -> Option<i32> {
        None
    }

    fn set_replicas(&mut self, _replicas: i32) {}
}

impl ManagedObject for Deployment {
    fn replicas(&self) -> Option<i32> {
        self.spec.as_ref().and_then(|s| s.replicas)
    }

    fn set_replicas(&mut self, replicas: i32) {
        self.spec.get_or_insert_with(Default::default).replicas = Some(replicas);
    }
}

impl ManagedObject for Service {}

// =============================================================================
// Outcome
// =============================================================================

/// What a reconcile pass did to one object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created,
    Unchanged,
    /// Only the replica count was rewritten
    Scaled,
    Patched,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Created => "created",
            ReconcileOutcome::Unchanged => "unchanged",
            ReconcileOutcome::Scaled => "scaled",
            ReconcileOutcome::Patched => "patched",
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(self, ReconcileOutcome::Unchanged)
    }
}

impl std::fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Reconciler
// =============================================================================

/// Drives one kind of managed object towards its desired state
pub struct ObjectReconciler<'a, K>
where
    K: ManagedObject,
{
    store: &'a dyn ObjectStore<K>,
}

impl<'a, K> ObjectReconciler<'a, K>
where
    K: ManagedObject,
{
    pub fn new(store: &'a dyn ObjectStore<K>) -> Self {
        Self { store }
    }

    /// Make the live object match `desired`
    ///
    /// `desired` must carry its controller owner reference. An existing
    /// object controlled by someone else is never touched.
    pub async fn reconcile(&self, desired: &K) -> Result<ReconcileOutcome> {
        let key = ObjectKey::of(desired)?;
        let kind = self.store.kind();

        let Some(mut current) = self.store.get(&key).await? else {
            self.store.create(desired).await?;
            info!(kind = %kind, object = %key, "Created managed object");
            return Ok(ReconcileOutcome::Created);
        };

        self.check_owner(&kind, &key, desired, &current)?;

        let mut outcome = ReconcileOutcome::Unchanged;
        if let (Some(want), Some(have)) = (desired.replicas(), current.replicas()) {
            if want != have {
                let mut scaled = current.clone();
                scaled.set_replicas(want);
                current = self.store.update(&scaled).await?;
                info!(kind = %kind, object = %key, from = have, to = want, "Corrected replica drift");
                outcome = ReconcileOutcome::Scaled;
            }
        }

        if is_up_to_date(desired, &current)? {
            debug!(kind = %kind, object = %key, "Managed object up to date");
            return Ok(outcome);
        }

        self.store.patch(&current, desired).await?;
        info!(kind = %kind, object = %key, "Patched managed object");
        Ok(ReconcileOutcome::Patched)
    }

    fn check_owner(&self, kind: &str, key: &ObjectKey, desired: &K, current: &K) -> Result<()> {
        let want = controller_of(desired).map(|r| r.uid.as_str());
        let have = controller_of(current);

        match (want, have) {
            (Some(uid), Some(owner)) if owner.uid == uid => Ok(()),
            (_, owner) => Err(Error::NameCollision {
                kind: kind.to_string(),
                name: key.name.clone(),
                owner: owner
                    .map(|o| format!("{} {}", o.kind, o.name))
                    .unwrap_or_else(|| "no controller".to_string()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{compile, Scope, WorkloadIdentity};
    use crate::crd::{InferenceModel, InferenceModelSpec};
    use crate::domain::set_owner_reference;
    use crate::resolver::{EngineDefaultsTable, ModelOverride, Resolver};
    use crate::testing::MemoryStore;
    use assert_matches::assert_matches;
    use k8s_openapi::api::core::v1::{Container, ResourceRequirements};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn owner(uid: &str) -> InferenceModel {
        let mut model = InferenceModel::new("llama", InferenceModelSpec::default());
        model.metadata.namespace = Some("ai".into());
        model.metadata.uid = Some(uid.into());
        model
    }

    fn desired(replicas: i32) -> (Deployment, Service) {
        desired_for(ModelOverride {
            name: Some("llama3".into()),
            replicas: Some(replicas),
            ..Default::default()
        })
    }

    fn desired_for(model: ModelOverride) -> (Deployment, Service) {
        let resolved = Resolver::new(Arc::new(EngineDefaultsTable::builtin()))
            .resolve("ollama", None, Some(&model))
            .unwrap();
        let identity = WorkloadIdentity::new("ai", "ollama", "llama3", Scope::Model);
        let (mut deployment, mut service) = compile(&resolved, &identity).unwrap();
        set_owner_reference(&owner("uid-model"), &mut deployment).unwrap();
        set_owner_reference(&owner("uid-model"), &mut service).unwrap();
        (deployment, service)
    }

    fn key() -> ObjectKey {
        ObjectKey::new("ai", "ollama-llama3")
    }

    #[tokio::test]
    async fn test_absent_object_is_created() {
        let store = MemoryStore::<Deployment>::new();
        let (deployment, _) = desired(1);

        let outcome = ObjectReconciler::new(&store).reconcile(&deployment).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Created);
        assert_eq!(store.calls().create, 1);
        assert!(store.object(&key()).is_some());
    }

    #[tokio::test]
    async fn test_second_pass_writes_nothing() {
        let store = MemoryStore::<Service>::new();
        let (_, service) = desired(1);
        let reconciler = ObjectReconciler::new(&store);

        reconciler.reconcile(&service).await.unwrap();
        store.reset_calls();

        let outcome = reconciler.reconcile(&service).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        assert_eq!(store.calls().writes(), 0);
    }

    #[tokio::test]
    async fn test_replica_drift_is_a_targeted_update() {
        let store = MemoryStore::<Deployment>::new();
        let (deployment, _) = desired(1);
        let reconciler = ObjectReconciler::new(&store);

        reconciler.reconcile(&deployment).await.unwrap();
        store.mutate(&key(), |d| d.set_replicas(3));
        store.reset_calls();

        let outcome = reconciler.reconcile(&deployment).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Scaled);
        assert_eq!(store.calls().update, 1);
        assert_eq!(store.calls().patch, 0);
        assert_eq!(store.object(&key()).unwrap().replicas(), Some(1));
    }

    #[tokio::test]
    async fn test_spec_change_is_patched() {
        let store = MemoryStore::<Deployment>::new();
        let reconciler = ObjectReconciler::new(&store);
        let (deployment, _) = desired(1);
        reconciler.reconcile(&deployment).await.unwrap();

        let mut changed = deployment.clone();
        if let Some(pod) = changed
            .spec
            .as_mut()
            .and_then(|s| s.template.spec.as_mut())
        {
            pod.containers[0].image = Some("ollama/ollama:0.5".into());
        }
        store.reset_calls();

        let outcome = reconciler.reconcile(&changed).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Patched);
        assert_eq!(store.calls().patch, 1);

        let live = store.object(&key()).unwrap();
        let image = live.spec.unwrap().template.spec.unwrap().containers[0].image.clone();
        assert_eq!(image.as_deref(), Some("ollama/ollama:0.5"));

        store.reset_calls();
        assert_eq!(
            reconciler.reconcile(&changed).await.unwrap(),
            ReconcileOutcome::Unchanged
        );
        assert_eq!(store.calls().writes(), 0);
    }

    fn main_container(deployment: Deployment) -> Container {
        deployment.spec.unwrap().template.spec.unwrap().containers.remove(0)
    }

    #[tokio::test]
    async fn test_removed_fields_are_patched_away() {
        let store = MemoryStore::<Deployment>::new();
        let reconciler = ObjectReconciler::new(&store);

        let limited = ModelOverride {
            name: Some("llama3".into()),
            resources: Some(ResourceRequirements {
                limits: Some(BTreeMap::from([("memory".into(), Quantity("8Gi".into()))])),
                ..Default::default()
            }),
            ..Default::default()
        };
        let (deployment, _) = desired_for(limited);
        reconciler.reconcile(&deployment).await.unwrap();

        // Resources dropped from the model
        let (deployment, _) = desired(1);
        store.reset_calls();
        let outcome = reconciler.reconcile(&deployment).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Patched);
        let live = main_container(store.object(&key()).unwrap());
        assert_eq!(live.resources, Some(ResourceRequirements::default()));

        // Env cleared entirely
        let mut cleared = deployment.clone();
        if let Some(pod) = cleared.spec.as_mut().and_then(|s| s.template.spec.as_mut()) {
            pod.containers[0].env = Some(Vec::new());
        }
        store.reset_calls();
        let outcome = reconciler.reconcile(&cleared).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Patched);
        assert_eq!(main_container(store.object(&key()).unwrap()).env, Some(Vec::new()));

        store.reset_calls();
        assert_eq!(reconciler.reconcile(&cleared).await.unwrap(), ReconcileOutcome::Unchanged);
        assert_eq!(store.calls().writes(), 0);
    }

    #[tokio::test]
    async fn test_foreign_object_is_a_collision() {
        let store = MemoryStore::<Deployment>::new();
        let (deployment, _) = desired(1);

        let mut foreign = deployment.clone();
        set_owner_reference(&owner("uid-other"), &mut foreign).unwrap();
        store.seed(foreign);

        let result = ObjectReconciler::new(&store).reconcile(&deployment).await;
        assert_matches!(result, Err(Error::NameCollision { .. }));
        assert_eq!(store.calls().writes(), 0);
    }

    #[tokio::test]
    async fn test_unowned_object_is_a_collision() {
        let store = MemoryStore::<Service>::new();
        let (_, service) = desired(1);

        let mut unowned = service.clone();
        unowned.metadata.owner_references = None;
        store.seed(unowned);

        let result = ObjectReconciler::new(&store).reconcile(&service).await;
        assert_matches!(result, Err(Error::NameCollision { owner, .. }) if owner == "no controller");
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(ReconcileOutcome::Scaled.to_string(), "scaled");
        assert!(!ReconcileOutcome::Unchanged.is_write());
    }
}

//! Shared controller context

use crate::crd::{InferenceEngine, InferenceModel};
use crate::domain::ObjectStore;
use crate::error::Result;
use crate::reconcile::{ManagedObject, ObjectReconciler};
use crate::resolver::Resolver;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::Client;
use std::sync::Arc;

use super::config::OperatorConfig;
use super::metrics::Metrics;
use super::store::KubeStore;

/// Everything a reconcile pass needs; holds no per-entity state
pub struct Context {
    pub engines: Arc<dyn ObjectStore<InferenceEngine>>,
    pub models: Arc<dyn ObjectStore<InferenceModel>>,
    pub deployments: Arc<dyn ObjectStore<Deployment>>,
    pub services: Arc<dyn ObjectStore<Service>>,
    pub resolver: Resolver,
    pub config: OperatorConfig,
    pub metrics: Metrics,
}

impl Context {
    /// Context backed by the API server
    pub fn new(client: Client, resolver: Resolver, config: OperatorConfig, metrics: Metrics) -> Self {
        let manager = config.field_manager.clone();
        Self {
            engines: Arc::new(KubeStore::<InferenceEngine>::new(client.clone(), manager.clone())),
            models: Arc::new(KubeStore::<InferenceModel>::new(client.clone(), manager.clone())),
            deployments: Arc::new(KubeStore::<Deployment>::new(client.clone(), manager.clone())),
            services: Arc::new(KubeStore::<Service>::new(client, manager)),
            resolver,
            config,
            metrics,
        }
    }

    /// Bring the workload and then the endpoint in line with their desired state
    pub async fn apply(&self, deployment: &Deployment, service: &Service) -> Result<()> {
        self.apply_one(self.deployments.as_ref(), deployment).await?;
        self.apply_one(self.services.as_ref(), service).await
    }

    async fn apply_one<K: ManagedObject>(&self, store: &dyn ObjectStore<K>, desired: &K) -> Result<()> {
        let outcome = ObjectReconciler::new(store).reconcile(desired).await?;
        self.metrics.object_written(&store.kind(), outcome);
        Ok(())
    }
}

//! Controllers
//!
//! Wires the reconcile passes to kube-runtime: each primary kind gets a
//! controller that also watches the objects it owns, models are re-queued
//! when their engine changes and engines when a model referencing them
//! appears or goes away.

pub mod config;
pub mod context;
pub mod engine;
pub mod metrics;
pub mod model;
pub mod store;

pub use config::{OperatorConfig, RequeueConfig};
pub use context::Context;
pub use metrics::Metrics;
pub use store::{classify_error, KubeStore};

use crate::crd::{InferenceEngine, InferenceModel};
use crate::error::{Error, ErrorAction, Result};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::NamespaceResourceScope;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher;
use kube::{Api, Client, Resource, ResourceExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Requeue decision for a failed pass, shared by both controllers
pub fn error_action(controller: &str, error: &Error, ctx: &Context) -> Action {
    warn!(controller, error = %error, "Reconciliation failed");
    ctx.metrics.failed(controller, error);

    if let Error::Conflict { .. } = error {
        return Action::requeue(ctx.config.requeue.conflict);
    }
    match error.action() {
        ErrorAction::RequeueAfter(delay) => Action::requeue(delay),
        ErrorAction::RequeueWithBackoff => Action::requeue(ctx.config.requeue.error),
        ErrorAction::NoRequeue => Action::await_change(),
    }
}

fn api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Run both controllers until a shutdown signal arrives
pub async fn run(client: Client, ctx: Arc<Context>) -> Result<()> {
    let namespace = ctx.config.namespace.as_deref();
    let engines = api::<InferenceEngine>(&client, namespace);
    let models = api::<InferenceModel>(&client, namespace);
    let deployments = api::<Deployment>(&client, namespace);
    let services = api::<Service>(&client, namespace);

    info!(namespace = namespace.unwrap_or("<all>"), "Starting controllers");

    let model_controller = Controller::new(models.clone(), watcher::Config::default());
    let known_models = model_controller.store();

    let model_controller = model_controller
        .owns(deployments.clone(), watcher::Config::default())
        .owns(services.clone(), watcher::Config::default())
        .watches(engines.clone(), watcher::Config::default(), move |engine: InferenceEngine| {
            known_models
                .state()
                .into_iter()
                .filter(|m| m.namespace() == engine.namespace() && m.spec.engine_ref == engine.name_any())
                .map(|m| ObjectRef::from_obj(m.as_ref()))
                .collect::<Vec<_>>()
        })
        .shutdown_on_signal()
        .run(model::reconcile, model::error_policy, ctx.clone())
        .for_each(|result| async move {
            match result {
                Ok((obj, action)) => debug!(object = %obj, ?action, "Model reconciled"),
                Err(e) => warn!(error = %e, "Model controller error"),
            }
        });

    let engine_controller = Controller::new(engines, watcher::Config::default())
        .owns(deployments, watcher::Config::default())
        .owns(services, watcher::Config::default())
        .watches(models, watcher::Config::default(), |model: InferenceModel| {
            model
                .namespace()
                .map(|ns| ObjectRef::<InferenceEngine>::new(&model.spec.engine_ref).within(&ns))
        })
        .shutdown_on_signal()
        .run(engine::reconcile, engine::error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, action)) => debug!(object = %obj, ?action, "Engine reconciled"),
                Err(e) => warn!(error = %e, "Engine controller error"),
            }
        });

    tokio::join!(model_controller, engine_controller);
    info!("Controllers stopped");
    Ok(())
}

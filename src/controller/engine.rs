//! InferenceEngine controller
//!
//! Validates the engine's configuration against its engine type and, while
//! no model references the engine, serves the engine itself.

use crate::compiler::{compile, Scope, WorkloadIdentity};
use crate::crd::{Condition, ConditionStatus, InferenceEngine, CONDITION_AVAILABLE};
use crate::domain::{set_owner_reference, ObjectKey};
use crate::error::{Error, Result};
use crate::reconcile::upsert;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::context::Context;
use super::model::references;

pub const CONTROLLER: &str = "engine";

/// Reconcile an InferenceEngine
#[instrument(skip(engine, ctx), fields(engine = %engine.name_any(), namespace = ?engine.namespace()))]
pub async fn reconcile(engine: Arc<InferenceEngine>, ctx: Arc<Context>) -> Result<Action> {
    let start = Instant::now();
    let key = ObjectKey::of(engine.as_ref())?;
    let result = reconcile_engine(&key, &ctx).await;
    ctx.metrics.reconciled(CONTROLLER, start.elapsed());
    result
}

/// Requeue policy for failed passes
pub fn error_policy(_engine: Arc<InferenceEngine>, error: &Error, ctx: Arc<Context>) -> Action {
    super::error_action(CONTROLLER, error, &ctx)
}

async fn reconcile_engine(key: &ObjectKey, ctx: &Context) -> Result<Action> {
    let Some(engine) = ctx.engines.get(key).await? else {
        return Ok(Action::await_change());
    };

    if !engine.has_conditions() {
        let condition = Condition::new(
            CONDITION_AVAILABLE,
            ConditionStatus::Unknown,
            "Reconciling",
            "Starting reconciliation",
        );
        upsert(ctx.engines.as_ref(), key, condition).await?;
    }

    match deploy(&engine, ctx).await {
        Ok(message) => {
            let condition = Condition::new(CONDITION_AVAILABLE, ConditionStatus::True, "Reconciled", message);
            upsert(ctx.engines.as_ref(), key, condition).await?;
            Ok(Action::requeue(ctx.config.requeue.ready))
        }
        Err(e) if e.is_terminal() => {
            warn!(error = %e, "Engine configuration is invalid");
            ctx.metrics.failed(CONTROLLER, &e);
            let condition = Condition::new(
                CONDITION_AVAILABLE,
                ConditionStatus::False,
                e.condition_reason(),
                e.to_string(),
            );
            upsert(ctx.engines.as_ref(), key, condition).await?;
            Ok(Action::await_change())
        }
        Err(e) => Err(e),
    }
}

/// Validate the engine and, when it serves no model, apply its own objects
async fn deploy(engine: &InferenceEngine, ctx: &Context) -> Result<String> {
    let namespace = engine
        .namespace()
        .ok_or_else(|| Error::Internal(format!("engine {} has no namespace", engine.name_any())))?;

    let resolved = ctx.resolver.resolve_engine(&engine.spec)?;

    let models = ctx.models.list(&namespace).await?;
    let serving = references(engine, &models);
    if !serving.is_empty() {
        debug!(models = serving.len(), "Engine serves models, no engine-level workload");
        return Ok(format!("Engine serves {} model(s)", serving.len()));
    }

    let identity = WorkloadIdentity::new(&namespace, &resolved.engine_type, &engine.name_any(), Scope::Engine);
    let (mut deployment, mut service) = compile(&resolved, &identity)?;

    set_owner_reference(engine, &mut deployment)?;
    set_owner_reference(engine, &mut service)?;

    ctx.apply(&deployment, &service).await?;
    info!(object = %identity.name, "Engine deployed");
    Ok(format!("Deployment {} with {} replica(s) available", identity.name, resolved.replicas))
}

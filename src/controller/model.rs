//! InferenceModel controller
//!
//! One pass: re-fetch the model, look up its engine, resolve, compile,
//! reconcile workload then endpoint, report `Ready`.

use crate::compiler::{compile, Scope, WorkloadIdentity};
use crate::crd::{Condition, ConditionStatus, InferenceEngine, InferenceModel, CONDITION_READY};
use crate::domain::{set_owner_reference, ObjectKey};
use crate::error::{Error, Result};
use crate::reconcile::upsert;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

use super::context::Context;

pub const CONTROLLER: &str = "model";

/// Reconcile an InferenceModel
#[instrument(skip(model, ctx), fields(model = %model.name_any(), namespace = ?model.namespace()))]
pub async fn reconcile(model: Arc<InferenceModel>, ctx: Arc<Context>) -> Result<Action> {
    let start = Instant::now();
    let key = ObjectKey::of(model.as_ref())?;
    let result = reconcile_model(&key, &ctx).await;
    ctx.metrics.reconciled(CONTROLLER, start.elapsed());
    result
}

/// Requeue policy for failed passes
pub fn error_policy(_model: Arc<InferenceModel>, error: &Error, ctx: Arc<Context>) -> Action {
    super::error_action(CONTROLLER, error, &ctx)
}

async fn reconcile_model(key: &ObjectKey, ctx: &Context) -> Result<Action> {
    // The watch event may be stale
    let Some(model) = ctx.models.get(key).await? else {
        return Ok(Action::await_change());
    };

    let engine_key = ObjectKey::new(&key.namespace, &model.spec.engine_ref);
    let Some(engine) = ctx.engines.get(&engine_key).await? else {
        warn!(engine = %model.spec.engine_ref, "Referenced engine not found");
        let condition = Condition::new(
            CONDITION_READY,
            ConditionStatus::False,
            "EngineNotFound",
            format!("No InferenceEngine found with name={}", model.spec.engine_ref),
        );
        upsert(ctx.models.as_ref(), key, condition).await?;
        return Ok(Action::requeue(ctx.config.requeue.engine_missing));
    };

    match deploy(&model, &engine, ctx).await {
        Ok(name) => {
            let condition = Condition::new(
                CONDITION_READY,
                ConditionStatus::True,
                "Deployed",
                format!("Model served by {}", name),
            );
            upsert(ctx.models.as_ref(), key, condition).await?;
            Ok(Action::requeue(ctx.config.requeue.ready))
        }
        Err(e) if e.is_terminal() => {
            warn!(error = %e, "Model cannot be deployed");
            ctx.metrics.failed(CONTROLLER, &e);
            let condition = Condition::new(
                CONDITION_READY,
                ConditionStatus::False,
                e.condition_reason(),
                e.to_string(),
            );
            upsert(ctx.models.as_ref(), key, condition).await?;
            Ok(Action::await_change())
        }
        Err(e) => Err(e),
    }
}

/// Resolve, compile and apply the model's objects; returns their name
async fn deploy(model: &InferenceModel, engine: &InferenceEngine, ctx: &Context) -> Result<String> {
    let namespace = model
        .namespace()
        .ok_or_else(|| Error::Internal(format!("model {} has no namespace", model.name_any())))?;

    let resolved = ctx.resolver.resolve_model(&engine.spec, model)?;
    let identity = WorkloadIdentity::new(&namespace, &resolved.engine_type, &model.spec.name, Scope::Model);
    let (mut deployment, mut service) = compile(&resolved, &identity)?;

    set_owner_reference(model, &mut deployment)?;
    set_owner_reference(model, &mut service)?;

    ctx.apply(&deployment, &service).await?;
    info!(object = %identity.name, replicas = resolved.replicas, "Model deployed");
    Ok(identity.name)
}

/// Models in `engine`'s namespace that reference it
pub fn references(engine: &InferenceEngine, models: &[InferenceModel]) -> Vec<ObjectKey> {
    let namespace = engine.namespace();
    models
        .iter()
        .filter(|m| m.namespace() == namespace && m.spec.engine_ref == engine.name_any())
        .filter_map(|m| ObjectKey::of(m).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::tests::{context, engine, model, Stores};
    use crate::crd::{find_condition, ModelDeploymentTemplate};
    use crate::reconcile::ConditionedResource;
    use assert_matches::assert_matches;
    use k8s_openapi::api::apps::v1::Deployment;
    use kube::core::ErrorResponse;

    fn ready_condition(stores: &Stores, name: &str) -> Condition {
        let model = stores.models.object(&ObjectKey::new("ai", name)).unwrap();
        find_condition(model.conditions(), CONDITION_READY).cloned().unwrap()
    }

    #[tokio::test]
    async fn test_missing_engine() {
        let (stores, ctx) = context();
        let model = stores.models.seed(model("llama", "ollama"));

        let action = reconcile(Arc::new(model), ctx.clone()).await.unwrap();

        assert_eq!(action, Action::requeue(ctx.config.requeue.engine_missing));
        let condition = ready_condition(&stores, "llama");
        assert_eq!(condition.status, ConditionStatus::False);
        assert_eq!(condition.reason, "EngineNotFound");
        assert_eq!(stores.deployments.calls().create, 0);
    }

    #[tokio::test]
    async fn test_deploys_and_reports_ready() {
        let (stores, ctx) = context();
        stores.engines.seed(engine("ollama", "ollama"));
        let model = stores.models.seed(model("llama", "ollama"));

        let action = reconcile(Arc::new(model), ctx.clone()).await.unwrap();
        assert_eq!(action, Action::requeue(ctx.config.requeue.ready));

        let key = ObjectKey::new("ai", "ollama-llama");
        let deployment: Deployment = stores.deployments.object(&key).unwrap();
        let owner = crate::domain::controller_of(&deployment).unwrap();
        assert_eq!(owner.kind, "InferenceModel");
        assert_eq!(owner.name, "llama");
        assert!(stores.services.object(&key).is_some());

        let condition = ready_condition(&stores, "llama");
        assert_eq!(condition.status, ConditionStatus::True);
        assert_eq!(condition.reason, "Deployed");
        assert!(stores
            .models
            .object(&ObjectKey::new("ai", "llama"))
            .unwrap()
            .ready());
    }

    #[tokio::test]
    async fn test_second_pass_is_idempotent() {
        let (stores, ctx) = context();
        stores.engines.seed(engine("ollama", "ollama"));
        let model = stores.models.seed(model("llama", "ollama"));

        reconcile(Arc::new(model.clone()), ctx.clone()).await.unwrap();
        stores.reset_calls();
        reconcile(Arc::new(model), ctx).await.unwrap();

        assert_eq!(stores.deployments.calls().writes(), 0);
        assert_eq!(stores.services.calls().writes(), 0);
        assert_eq!(stores.models.calls().writes(), 0);
    }

    #[tokio::test]
    async fn test_terminal_error_sets_false_condition() {
        let (stores, ctx) = context();
        stores.engines.seed(engine("ollama", "ollama"));
        let mut bad = model("llama", "ollama");
        bad.spec.model_deployment = Some(ModelDeploymentTemplate {
            download_scripts: Some("ollama pull {{ model_tag }}".into()),
            ..Default::default()
        });
        let bad = stores.models.seed(bad);

        let action = reconcile(Arc::new(bad), ctx).await.unwrap();

        assert_eq!(action, Action::await_change());
        let condition = ready_condition(&stores, "llama");
        assert_eq!(condition.status, ConditionStatus::False);
        assert_eq!(condition.reason, "TemplateError");
        assert_eq!(stores.deployments.calls().writes(), 0);
        assert_eq!(stores.services.calls().writes(), 0);
    }

    #[tokio::test]
    async fn test_unknown_engine_type() {
        let (stores, ctx) = context();
        stores.engines.seed(engine("tgi-engine", "tgi"));
        let model = stores.models.seed(model("llama", "tgi-engine"));

        reconcile(Arc::new(model), ctx).await.unwrap();
        assert_eq!(ready_condition(&stores, "llama").reason, "UnknownEngineType");
    }

    #[tokio::test]
    async fn test_conflict_aborts_without_status() {
        let (stores, ctx) = context();
        stores.engines.seed(engine("ollama", "ollama"));
        let model = stores.models.seed(model("llama", "ollama"));
        stores.deployments.fail_next_write(Error::Conflict {
            kind: "Deployment".into(),
            name: "ollama-llama".into(),
        });

        let result = reconcile(Arc::new(model), ctx).await;

        assert_matches!(result, Err(Error::Conflict { .. }));
        assert_eq!(stores.models.calls().update_status, 0);
        assert_eq!(stores.services.calls().writes(), 0);
        let model = stores.models.object(&ObjectKey::new("ai", "llama")).unwrap();
        assert!(model.conditions().is_empty());
    }

    #[tokio::test]
    async fn test_api_error_keeps_previous_condition() {
        let (stores, ctx) = context();
        stores.engines.seed(engine("ollama", "ollama"));
        let model = stores.models.seed(model("llama", "ollama"));
        reconcile(Arc::new(model.clone()), ctx.clone()).await.unwrap();
        let before = ready_condition(&stores, "llama");

        stores.engines.mutate(&ObjectKey::new("ai", "ollama"), |e| {
            e.spec.image = Some("ollama/ollama:0.5".into());
        });
        stores.deployments.fail_next_write(Error::Kube(kube::Error::Api(ErrorResponse {
            status: "Failure".into(),
            message: "etcdserver: request timed out".into(),
            reason: "InternalError".into(),
            code: 500,
        })));
        stores.reset_calls();

        let result = reconcile(Arc::new(model), ctx).await;

        assert_matches!(result, Err(Error::Kube(_)));
        assert_eq!(stores.deployments.calls().patch, 1);
        assert_eq!(stores.models.calls().update_status, 0);
        assert_eq!(ready_condition(&stores, "llama"), before);
    }

    #[tokio::test]
    async fn test_normalized_name_collision() {
        let (stores, ctx) = context();
        stores.engines.seed(engine("ollama", "ollama"));
        let mut dotted = model("llama-dot", "ollama");
        dotted.spec.name = "Llama.3".into();
        let mut dashed = model("llama-dash", "ollama");
        dashed.spec.name = "llama-3".into();
        let dotted = stores.models.seed(dotted);
        let dashed = stores.models.seed(dashed);

        reconcile(Arc::new(dotted), ctx.clone()).await.unwrap();
        let action = reconcile(Arc::new(dashed), ctx).await.unwrap();

        assert_eq!(action, Action::await_change());
        let condition = ready_condition(&stores, "llama-dash");
        assert_eq!(condition.status, ConditionStatus::False);
        assert_eq!(condition.reason, "NameCollision");
        assert_eq!(ready_condition(&stores, "llama-dot").status, ConditionStatus::True);

        let deployment: Deployment = stores.deployments.object(&ObjectKey::new("ai", "ollama-llama-3")).unwrap();
        assert_eq!(crate::domain::controller_of(&deployment).unwrap().name, "llama-dot");
    }

    #[tokio::test]
    async fn test_deleted_model_is_ignored() {
        let (stores, ctx) = context();
        let mut gone = model("llama", "ollama");
        gone.metadata.uid = Some("uid-llama".into());

        let action = reconcile(Arc::new(gone), ctx).await.unwrap();
        assert_eq!(action, Action::await_change());
        assert_eq!(stores.models.calls().writes(), 0);
    }

    #[test]
    fn test_references() {
        let engine = engine("ollama", "ollama");
        let models = vec![
            model("llama", "ollama"),
            model("qwen", "other"),
            model("phi", "ollama"),
        ];
        let keys = references(&engine, &models);
        assert_eq!(keys, vec![ObjectKey::new("ai", "llama"), ObjectKey::new("ai", "phi")]);
    }
}

//! Prometheus metrics of the controllers
//!
//! Metrics live in a registry owned by the caller so tests and the binary
//! never share process-global state.

use crate::error::{Error, Result};
use crate::reconcile::ReconcileOutcome;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Duration;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    reconciliations: IntCounterVec,
    failures: IntCounterVec,
    writes: IntCounterVec,
    duration: HistogramVec,
}

impl Metrics {
    /// Create the metrics and register them in `registry`
    pub fn new(registry: Registry) -> Result<Self> {
        let reconciliations = IntCounterVec::new(
            Opts::new("llm_operator_reconciliations_total", "Reconcile passes by controller"),
            &["controller"],
        )
        .map_err(metrics_error)?;
        let failures = IntCounterVec::new(
            Opts::new(
                "llm_operator_reconcile_failures_total",
                "Failed reconcile passes by controller and reason",
            ),
            &["controller", "reason"],
        )
        .map_err(metrics_error)?;
        let writes = IntCounterVec::new(
            Opts::new(
                "llm_operator_object_writes_total",
                "Writes to managed objects by kind and operation",
            ),
            &["kind", "operation"],
        )
        .map_err(metrics_error)?;
        let duration = HistogramVec::new(
            HistogramOpts::new(
                "llm_operator_reconcile_duration_seconds",
                "Duration of reconcile passes",
            ),
            &["controller"],
        )
        .map_err(metrics_error)?;

        registry.register(Box::new(reconciliations.clone())).map_err(metrics_error)?;
        registry.register(Box::new(failures.clone())).map_err(metrics_error)?;
        registry.register(Box::new(writes.clone())).map_err(metrics_error)?;
        registry.register(Box::new(duration.clone())).map_err(metrics_error)?;

        Ok(Self {
            registry,
            reconciliations,
            failures,
            writes,
            duration,
        })
    }

    pub fn reconciled(&self, controller: &str, elapsed: Duration) {
        self.reconciliations.with_label_values(&[controller]).inc();
        self.duration
            .with_label_values(&[controller])
            .observe(elapsed.as_secs_f64());
    }

    pub fn failed(&self, controller: &str, error: &Error) {
        self.failures
            .with_label_values(&[controller, error.condition_reason()])
            .inc();
    }

    pub fn object_written(&self, kind: &str, outcome: ReconcileOutcome) {
        if outcome.is_write() {
            self.writes.with_label_values(&[kind, outcome.as_str()]).inc();
        }
    }

    /// Text exposition of everything in the registry
    pub fn encode(&self) -> Result<(String, Vec<u8>)> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        Ok((encoder.format_type().to_string(), buffer))
    }
}

fn metrics_error(err: prometheus::Error) -> Error {
    Error::Internal(format!("metrics: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_are_exposed() {
        let metrics = Metrics::new(Registry::new()).unwrap();
        metrics.reconciled("model", Duration::from_millis(5));
        metrics.object_written("Deployment", ReconcileOutcome::Created);
        metrics.object_written("Service", ReconcileOutcome::Unchanged);
        metrics.failed(
            "model",
            &Error::UnknownEngineType {
                engine_type: "tgi".into(),
            },
        );

        let (_, body) = metrics.encode().unwrap();
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("llm_operator_reconciliations_total{controller=\"model\"} 1"));
        assert!(text.contains("operation=\"created\""));
        assert!(!text.contains("operation=\"unchanged\""));
        assert!(text.contains("reason=\"UnknownEngineType\""));
    }

    #[test]
    fn test_registries_are_independent() {
        assert!(Metrics::new(Registry::new()).is_ok());
        assert!(Metrics::new(Registry::new()).is_ok());
    }
}

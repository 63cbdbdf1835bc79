//! Endpoint (ClusterIP Service) construction

use crate::resolver::ResolvedDeploymentSpec;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;

use super::WorkloadIdentity;

/// Service exposing the workload's listen port on the resolved service port
pub fn build_service(resolved: &ResolvedDeploymentSpec, identity: &WorkloadIdentity) -> Service {
    let labels = identity.labels();

    Service {
        metadata: ObjectMeta {
            name: Some(identity.name.clone()),
            namespace: Some(identity.namespace.clone()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(labels),
            session_affinity: Some("ClientIP".to_string()),
            ports: Some(vec![ServicePort {
                name: Some("http".to_string()),
                port: resolved.service_port,
                target_port: Some(IntOrString::Int(resolved.port)),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

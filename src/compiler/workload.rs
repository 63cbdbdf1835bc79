//! Workload (Deployment) construction

use crate::crd::StorageMount;
use crate::resolver::ResolvedDeploymentSpec;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EmptyDirVolumeSource, PodSpec, PodTemplateSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::ObjectMeta;

use super::WorkloadIdentity;

/// Volume name of the models mount
pub const MODELS_VOLUME: &str = "models";

/// Volume name of the cache mount
pub const CACHE_VOLUME: &str = "cache";

/// Name of the model download init container
pub const DOWNLOAD_CONTAINER: &str = "download-model";

/// Build the Deployment; `script` is the rendered download script
pub fn build_deployment(
    resolved: &ResolvedDeploymentSpec,
    identity: &WorkloadIdentity,
    script: &str,
) -> Deployment {
    let labels = identity.labels();
    let (volumes, mounts) = storage_volumes(resolved);

    // An explicit empty list lets a later diff notice a dropped init step
    let init_containers = if script.is_empty() {
        Some(Vec::new())
    } else {
        Some(vec![Container {
            name: DOWNLOAD_CONTAINER.to_string(),
            image: Some(resolved.download_image.clone()),
            image_pull_policy: Some("IfNotPresent".to_string()),
            command: Some(vec!["/bin/sh".to_string(), "-c".to_string()]),
            args: Some(vec![script.to_string()]),
            env: Some(resolved.env.clone()),
            volume_mounts: Some(mounts.clone()),
            ..Default::default()
        }])
    };

    // Owned fields are always present, even when empty, so that clearing
    // one shows up as a difference against the live object
    let main = Container {
        name: identity.name.clone(),
        image: Some(resolved.image.clone()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        command: Some(resolved.args.clone()),
        ports: Some(vec![ContainerPort {
            name: Some("http".to_string()),
            container_port: resolved.port,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        env: Some(resolved.env.clone()),
        volume_mounts: Some(mounts),
        resources: Some(resolved.resources.clone()),
        ..Default::default()
    };

    Deployment {
        metadata: ObjectMeta {
            name: Some(identity.name.clone()),
            namespace: Some(identity.namespace.clone()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(resolved.replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    init_containers,
                    containers: vec![main],
                    volumes: Some(volumes),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Volumes and the mounts shared by every container
fn storage_volumes(resolved: &ResolvedDeploymentSpec) -> (Vec<Volume>, Vec<VolumeMount>) {
    let mut volumes = vec![volume(MODELS_VOLUME, &resolved.storage.models)];
    let mut mounts = vec![mount(MODELS_VOLUME, &resolved.storage.models)];

    if let Some(cache) = &resolved.storage.cache {
        volumes.push(volume(CACHE_VOLUME, cache));
        mounts.push(mount(CACHE_VOLUME, cache));
    }

    (volumes, mounts)
}

fn volume(name: &str, storage: &StorageMount) -> Volume {
    let source = &storage.source;
    let empty_dir = if source.is_empty() {
        Some(EmptyDirVolumeSource::default())
    } else {
        source.empty_dir.clone()
    };

    Volume {
        name: name.to_string(),
        empty_dir,
        host_path: source.host_path.clone(),
        persistent_volume_claim: source.persistent_volume_claim.clone(),
        nfs: source.nfs.clone(),
        ..Default::default()
    }
}

fn mount(name: &str, storage: &StorageMount) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: storage.path.clone(),
        ..Default::default()
    }
}

//! Resource-query helpers
//!
//! Thin lookups over [`ClusterOps`] shared by discovery and the
//! local-storage teardown.

use crate::cluster::{ClusterOps, ResourceKind};
use crate::constants::LOCAL_STORAGE_NAMESPACE;
use crate::error::{Error, Result};
use serde_json::Value;

/// Name from a resource's metadata, if present
pub fn name_of(resource: &Value) -> Option<&str> {
    resource.pointer("/metadata/name").and_then(Value::as_str)
}

/// Namespace from a resource's metadata, if present
pub fn namespace_of(resource: &Value) -> Option<&str> {
    resource
        .pointer("/metadata/namespace")
        .and_then(Value::as_str)
}

/// All storage classes in the cluster
pub async fn all_storage_classes(cluster: &dyn ClusterOps) -> Result<Vec<Value>> {
    cluster.list(ResourceKind::StorageClass, None, None).await
}

/// All PVCs bound to the given storage class, across every namespace
pub async fn pvcs_in_storage_class(
    cluster: &dyn ClusterOps,
    storage_class: &str,
) -> Result<Vec<Value>> {
    let all = cluster
        .list(ResourceKind::PersistentVolumeClaim, None, None)
        .await?;
    Ok(all
        .into_iter()
        .filter(|pvc| {
            pvc.pointer("/spec/storageClassName").and_then(Value::as_str) == Some(storage_class)
        })
        .collect())
}

/// All pods in a namespace
pub async fn pods_in_namespace(cluster: &dyn ClusterOps, namespace: &str) -> Result<Vec<Value>> {
    cluster.list(ResourceKind::Pod, Some(namespace), None).await
}

/// The claim bound into a pod's first volume.
///
/// Fails with [`Error::UnavailableAttribute`] when the pod mounts no claim
/// there.
pub fn pvc_name_of(pod: &Value) -> Result<String> {
    pod.pointer("/spec/volumes/0/persistentVolumeClaim/claimName")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::UnavailableAttribute {
            resource: name_of(pod).unwrap_or("pod").to_string(),
            attribute: "persistentVolumeClaim".to_string(),
        })
}

/// Names of nodes matching a label selector
pub async fn labeled_node_names(cluster: &dyn ClusterOps, selector: &str) -> Result<Vec<String>> {
    let nodes = cluster
        .list(ResourceKind::Node, None, Some(selector))
        .await?;
    Ok(nodes.iter().filter_map(name_of).map(str::to_string).collect())
}

/// Names of every node in the cluster
pub async fn all_node_names(cluster: &dyn ClusterOps) -> Result<Vec<String>> {
    let nodes = cluster.list(ResourceKind::Node, None, None).await?;
    Ok(nodes.iter().filter_map(name_of).map(str::to_string).collect())
}

/// Whether any LocalVolume resources are configured.
///
/// A cluster without the LocalVolume API installed answers false.
pub async fn local_volume_present(cluster: &dyn ClusterOps) -> Result<bool> {
    match cluster
        .list(ResourceKind::LocalVolume, Some(LOCAL_STORAGE_NAMESPACE), None)
        .await
    {
        Ok(items) => Ok(!items.is_empty()),
        Err(err) if err.is_not_found() => Ok(false),
        Err(err) => Err(err),
    }
}

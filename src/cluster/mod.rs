//! Cluster access layer
//!
//! [`ClusterOps`] is the boundary between the teardown logic and the cluster
//! API. The production implementation talks to a real apiserver; tests swap
//! in an in-memory fake.

#[cfg(test)]
pub mod fake;
pub mod kube;
pub mod queries;

pub use self::kube::KubeCluster;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Resource Identities
// =============================================================================

/// Resource kinds the teardown touches.
///
/// Each maps to a fixed API group, version, and plural so the client can
/// address it without discovery round trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    StorageClass,
    PersistentVolumeClaim,
    PersistentVolume,
    Pod,
    Node,
    ConfigMap,
    Namespace,
    CustomResourceDefinition,
    StorageCluster,
    LocalVolume,
    ClusterLogging,
    ClusterServiceVersion,
    ImageRegistryConfig,
}

impl ResourceKind {
    /// API group ("" for the core group)
    pub fn group(&self) -> &'static str {
        match self {
            ResourceKind::StorageClass => "storage.k8s.io",
            ResourceKind::PersistentVolumeClaim
            | ResourceKind::PersistentVolume
            | ResourceKind::Pod
            | ResourceKind::Node
            | ResourceKind::ConfigMap
            | ResourceKind::Namespace => "",
            ResourceKind::CustomResourceDefinition => "apiextensions.k8s.io",
            ResourceKind::StorageCluster => "ocs.openshift.io",
            ResourceKind::LocalVolume => "local.storage.openshift.io",
            ResourceKind::ClusterLogging => "logging.openshift.io",
            ResourceKind::ClusterServiceVersion => "operators.coreos.com",
            ResourceKind::ImageRegistryConfig => "imageregistry.operator.openshift.io",
        }
    }

    /// API version within the group
    pub fn version(&self) -> &'static str {
        match self {
            ResourceKind::ClusterServiceVersion => "v1alpha1",
            _ => "v1",
        }
    }

    /// Kind as it appears on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            ResourceKind::StorageClass => "StorageClass",
            ResourceKind::PersistentVolumeClaim => "PersistentVolumeClaim",
            ResourceKind::PersistentVolume => "PersistentVolume",
            ResourceKind::Pod => "Pod",
            ResourceKind::Node => "Node",
            ResourceKind::ConfigMap => "ConfigMap",
            ResourceKind::Namespace => "Namespace",
            ResourceKind::CustomResourceDefinition => "CustomResourceDefinition",
            ResourceKind::StorageCluster => "StorageCluster",
            ResourceKind::LocalVolume => "LocalVolume",
            ResourceKind::ClusterLogging => "ClusterLogging",
            ResourceKind::ClusterServiceVersion => "ClusterServiceVersion",
            ResourceKind::ImageRegistryConfig => "Config",
        }
    }

    /// Plural resource name used in API paths
    pub fn plural(&self) -> &'static str {
        match self {
            ResourceKind::StorageClass => "storageclasses",
            ResourceKind::PersistentVolumeClaim => "persistentvolumeclaims",
            ResourceKind::PersistentVolume => "persistentvolumes",
            ResourceKind::Pod => "pods",
            ResourceKind::Node => "nodes",
            ResourceKind::ConfigMap => "configmaps",
            ResourceKind::Namespace => "namespaces",
            ResourceKind::CustomResourceDefinition => "customresourcedefinitions",
            ResourceKind::StorageCluster => "storageclusters",
            ResourceKind::LocalVolume => "localvolumes",
            ResourceKind::ClusterLogging => "clusterloggings",
            ResourceKind::ClusterServiceVersion => "clusterserviceversions",
            ResourceKind::ImageRegistryConfig => "configs",
        }
    }

    /// Whether instances live inside a namespace
    pub fn namespaced(&self) -> bool {
        matches!(
            self,
            ResourceKind::PersistentVolumeClaim
                | ResourceKind::Pod
                | ResourceKind::ConfigMap
                | ResourceKind::StorageCluster
                | ResourceKind::LocalVolume
                | ResourceKind::ClusterLogging
                | ResourceKind::ClusterServiceVersion
        )
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind())
    }
}

/// Reference to one concrete resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub name: String,
    pub namespace: Option<String>,
}

impl ResourceRef {
    /// Reference to a cluster-scoped resource
    pub fn cluster(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: None,
        }
    }

    /// Reference to a namespaced resource
    pub fn namespaced(
        kind: ResourceKind,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

// =============================================================================
// Cluster Port
// =============================================================================

/// Port for cluster API operations
///
/// Not-found responses surface as [`crate::Error::NotFound`]; deciding
/// whether that is tolerable is left to the caller.
#[async_trait]
pub trait ClusterOps: Send + Sync {
    /// Fetch a single resource as raw JSON
    async fn get(&self, resource: &ResourceRef) -> Result<Value>;

    /// List resources of a kind, optionally narrowed to a namespace and
    /// label selector. `None` namespace lists across all namespaces.
    async fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        selector: Option<&str>,
    ) -> Result<Vec<Value>>;

    /// Apply a JSON patch to a resource
    async fn patch(&self, resource: &ResourceRef, patch: &json_patch::Patch) -> Result<()>;

    /// Delete a resource
    async fn delete(&self, resource: &ResourceRef) -> Result<()>;

    /// Apply a label in wire syntax: `key=value` sets, `key-` removes
    async fn add_label(&self, resource: &ResourceRef, label: &str) -> Result<()>;

    /// Run shell commands on a node through a privileged debug pod,
    /// returning combined stdout
    async fn exec_debug_cmd(&self, node: &str, commands: &[String]) -> Result<String>;

    /// Delete a namespace without waiting for it to disappear
    async fn delete_namespace(&self, name: &str) -> Result<()>;

    /// Poll until the resource is gone or the timeout elapses
    async fn wait_for_delete(&self, resource: &ResourceRef, timeout: Duration) -> Result<()>;
}

/// Shared handle to a cluster implementation
pub type ClusterRef = Arc<dyn ClusterOps>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_api_coordinates() {
        assert_eq!(ResourceKind::StorageClass.group(), "storage.k8s.io");
        assert_eq!(ResourceKind::StorageCluster.group(), "ocs.openshift.io");
        assert_eq!(ResourceKind::Pod.group(), "");
        assert_eq!(ResourceKind::ClusterServiceVersion.version(), "v1alpha1");
        assert_eq!(ResourceKind::ImageRegistryConfig.kind(), "Config");
        assert_eq!(ResourceKind::ImageRegistryConfig.plural(), "configs");
        assert_eq!(
            ResourceKind::CustomResourceDefinition.plural(),
            "customresourcedefinitions"
        );
    }

    #[test]
    fn test_kind_scoping() {
        assert!(ResourceKind::PersistentVolumeClaim.namespaced());
        assert!(ResourceKind::LocalVolume.namespaced());
        assert!(!ResourceKind::PersistentVolume.namespaced());
        assert!(!ResourceKind::StorageClass.namespaced());
        assert!(!ResourceKind::Node.namespaced());
        assert!(!ResourceKind::ImageRegistryConfig.namespaced());
    }

    #[test]
    fn test_resource_ref_display() {
        let sc = ResourceRef::cluster(ResourceKind::StorageClass, "sc-a");
        assert_eq!(sc.to_string(), "StorageClass/sc-a");

        let pvc = ResourceRef::namespaced(
            ResourceKind::PersistentVolumeClaim,
            "db-pvc",
            "openshift-storage",
        );
        assert_eq!(
            pvc.to_string(),
            "PersistentVolumeClaim/openshift-storage/db-pvc"
        );
    }
}

//! Integration detachment
//!
//! Unhooks the monitoring stack, the image registry, and the logging
//! operator from operator-backed storage before anything is deleted.
//! Targets that are already gone or already detached count as success,
//! so an interrupted teardown can be re-run.

use crate::cluster::{ClusterOps, ResourceKind, ResourceRef};
use crate::config::Platform;
use crate::constants::{
    CLUSTER_LOGGING_INSTANCE, IMAGE_REGISTRY_CONFIG_NAME, LOGGING_NAMESPACE, MONITORING_CONFIG_MAP,
    MONITORING_NAMESPACE,
};
use crate::error::Result;
use crate::teardown::event::{EventSink, TeardownEvent};
use json_patch::{Patch, PatchOperation, RemoveOperation, ReplaceOperation};
use serde_json::{json, Value};
use tracing::info;

// =============================================================================
// Patch Bodies
// =============================================================================

/// Patch clearing the monitoring stack's storage configuration
pub fn monitoring_detach_patch() -> Patch {
    Patch(vec![PatchOperation::Replace(ReplaceOperation {
        path: "/data/config.yaml".to_string(),
        value: Value::String(String::new()),
    })])
}

/// Patch pair detaching the image registry from operator storage.
///
/// Empty when the platform has no supported registry backend.
pub fn registry_detach_patches(platform: &Platform) -> Vec<Patch> {
    match platform {
        Platform::Aws => vec![
            Patch(vec![PatchOperation::Remove(RemoveOperation {
                path: "/spec/storage".to_string(),
            })]),
            Patch(vec![PatchOperation::Remove(RemoveOperation {
                path: "/status/generations/storage".to_string(),
            })]),
        ],
        Platform::Vsphere => vec![
            Patch(vec![PatchOperation::Replace(ReplaceOperation {
                path: "/spec/storage".to_string(),
                value: json!({ "emptyDir": {} }),
            })]),
            Patch(vec![PatchOperation::Replace(ReplaceOperation {
                path: "/status/generations/storage".to_string(),
                value: json!({ "emptyDir": {} }),
            })]),
        ],
        Platform::Other(_) => Vec::new(),
    }
}

// =============================================================================
// Detachment
// =============================================================================

/// Clear the monitoring stack's storage configuration.
///
/// A missing config map or an already-cleared field counts as detached.
pub async fn detach_monitoring(cluster: &dyn ClusterOps, events: &dyn EventSink) -> Result<()> {
    info!("removing monitoring stack from operator storage");
    let target = ResourceRef::namespaced(
        ResourceKind::ConfigMap,
        MONITORING_CONFIG_MAP,
        MONITORING_NAMESPACE,
    );
    events.emit(TeardownEvent::Patching {
        resource: target.clone(),
    });
    match cluster.patch(&target, &monitoring_detach_patch()).await {
        Ok(()) => Ok(()),
        Err(err) if err.is_not_found() || err.is_patch_rejected() => {
            info!("monitoring stack already detached: {}", err);
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// Detach the image registry from operator storage.
///
/// Returns false when the platform has no supported registry backend and
/// nothing was patched.
pub async fn detach_registry(
    cluster: &dyn ClusterOps,
    platform: &Platform,
    events: &dyn EventSink,
) -> Result<bool> {
    let patches = registry_detach_patches(platform);
    if patches.is_empty() {
        info!("platform registry not supported");
        return Ok(false);
    }

    info!("removing image registry from operator storage");
    let target = ResourceRef::cluster(
        ResourceKind::ImageRegistryConfig,
        IMAGE_REGISTRY_CONFIG_NAME,
    );
    for patch in &patches {
        events.emit(TeardownEvent::Patching {
            resource: target.clone(),
        });
        match cluster.patch(&target, patch).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() || err.is_patch_rejected() => {
                info!("registry storage already detached: {}", err);
            }
            Err(err) => return Err(err),
        }
    }
    Ok(true)
}

/// Remove the logging integration when the logging operator is installed.
///
/// The ClusterLogging singleton is deleted only if at least one logging
/// operator CSV exists; returns whether a delete was issued.
pub async fn detach_logging(cluster: &dyn ClusterOps, events: &dyn EventSink) -> Result<bool> {
    let csvs = match cluster
        .list(
            ResourceKind::ClusterServiceVersion,
            Some(LOGGING_NAMESPACE),
            None,
        )
        .await
    {
        Ok(csvs) => csvs,
        Err(err) if err.is_not_found() => Vec::new(),
        Err(err) => return Err(err),
    };
    if csvs.is_empty() {
        info!("no logging operator installed, nothing to detach");
        return Ok(false);
    }

    info!("removing cluster logging instance");
    let target = ResourceRef::namespaced(
        ResourceKind::ClusterLogging,
        CLUSTER_LOGGING_INSTANCE,
        LOGGING_NAMESPACE,
    );
    events.emit(TeardownEvent::Deleting {
        resource: target.clone(),
    });
    match cluster.delete(&target).await {
        Ok(()) => Ok(true),
        Err(err) if err.is_not_found() => Ok(true),
        Err(err) => Err(err),
    }
}

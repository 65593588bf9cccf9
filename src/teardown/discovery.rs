//! Target discovery
//!
//! Builds the lists of operator-owned storage classes, the claims bound to
//! them, and the pods mounting those claims. Everything downstream deletes
//! only what discovery collected here.

use crate::cluster::queries::{
    all_storage_classes, name_of, namespace_of, pods_in_namespace, pvc_name_of,
    pvcs_in_storage_class,
};
use crate::cluster::{ClusterOps, ResourceKind, ResourceRef};
use crate::config::TeardownConfig;
use crate::constants::{
    IMAGE_REGISTRY_NAMESPACE, MONITORING_NAMESPACE, OCS_PROVISIONERS, RESERVED_CLAIM_SUBSTRING,
};
use crate::error::Result;
use serde_json::Value;
use tracing::debug;

/// Resources a teardown run will delete
#[derive(Debug, Clone, Default)]
pub struct TeardownTargets {
    /// Names of operator-owned storage classes
    pub storage_classes: Vec<String>,
    /// Claims bound to those classes, minus reserved internal claims
    pub claims: Vec<ResourceRef>,
    /// Pods mounting one of the claims
    pub pods: Vec<ResourceRef>,
}

// =============================================================================
// Filters
// =============================================================================

/// Storage classes whose provisioner is on the allow-list
pub fn owned_storage_classes(classes: &[Value], provisioners: &[&str]) -> Vec<String> {
    classes
        .iter()
        .filter(|class| {
            class
                .get("provisioner")
                .and_then(Value::as_str)
                .map(|provisioner| provisioners.contains(&provisioner))
                .unwrap_or(false)
        })
        .filter_map(name_of)
        .map(str::to_string)
        .collect()
}

/// Claims to delete: everything except reserved internal claims, which the
/// object storage subsystem cleans up itself
pub fn claims_to_delete(claims: &[Value], reserved: &str) -> Vec<ResourceRef> {
    claims
        .iter()
        .filter_map(|claim| {
            let name = name_of(claim)?;
            if name.contains(reserved) {
                return None;
            }
            let namespace = namespace_of(claim)?;
            Some(ResourceRef::namespaced(
                ResourceKind::PersistentVolumeClaim,
                name,
                namespace,
            ))
        })
        .collect()
}

/// Pods whose bound claim is in the deletion set.
///
/// Pods without a resolvable claim are skipped, not errors.
pub fn pods_bound_to_claims(pods: &[Value], claim_names: &[String]) -> Vec<ResourceRef> {
    pods.iter()
        .filter_map(|pod| {
            let claim = pvc_name_of(pod).ok()?;
            if !claim_names.iter().any(|name| *name == claim) {
                return None;
            }
            let name = name_of(pod)?;
            let namespace = namespace_of(pod)?;
            Some(ResourceRef::namespaced(ResourceKind::Pod, name, namespace))
        })
        .collect()
}

// =============================================================================
// Discovery
// =============================================================================

/// Discover everything the teardown must delete
pub async fn discover_targets(
    cluster: &dyn ClusterOps,
    config: &TeardownConfig,
) -> Result<TeardownTargets> {
    let classes = all_storage_classes(cluster).await?;
    let storage_classes = owned_storage_classes(&classes, &OCS_PROVISIONERS);
    debug!("operator-owned storage classes: {:?}", storage_classes);

    let mut claims = Vec::new();
    for storage_class in &storage_classes {
        let bound = pvcs_in_storage_class(cluster, storage_class).await?;
        claims.extend(claims_to_delete(&bound, RESERVED_CLAIM_SUBSTRING));
    }
    let claim_names: Vec<String> = claims.iter().map(|claim| claim.name.clone()).collect();

    let mut pods = Vec::new();
    for namespace in [
        config.namespace.as_str(),
        IMAGE_REGISTRY_NAMESPACE,
        MONITORING_NAMESPACE,
    ] {
        let namespace_pods = pods_in_namespace(cluster, namespace).await?;
        pods.extend(pods_bound_to_claims(&namespace_pods, &claim_names));
    }

    Ok(TeardownTargets {
        storage_classes,
        claims,
        pods,
    })
}

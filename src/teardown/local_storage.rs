//! Local-storage teardown
//!
//! When the deployment is backed by local disks a nested cleanup runs:
//! the PVs provisioned for the LocalVolume, the mount directories and
//! partition tables on every storage node, and finally the storage class
//! and the LocalVolume resource itself.

use crate::cluster::queries::{labeled_node_names, name_of};
use crate::cluster::{ClusterOps, ResourceKind, ResourceRef};
use crate::config::TeardownConfig;
use crate::constants::{
    LOCAL_STORAGE_MOUNT_DIR, LOCAL_STORAGE_NAMESPACE, LOCAL_VOLUME_OWNER_LABEL,
    LOCAL_VOLUME_PV_SELECTOR, OPERATOR_NODE_LABEL, STORAGE_CLUSTER_NAME,
};
use crate::error::{Error, Result};
use crate::teardown::event::{EventSink, TeardownEvent};
use crate::teardown::report::{ItemFailure, TeardownStep};
use serde_json::Value;
use tracing::info;

/// What the nested teardown removed and what it could not
#[derive(Debug, Default)]
pub struct LocalStorageOutcome {
    /// Storage class deleted here, excluded from the later class sweep
    pub removed_storage_class: Option<String>,
    /// Per-volume and per-node failures; the run keeps going
    pub failures: Vec<ItemFailure>,
}

// =============================================================================
// Command Builders
// =============================================================================

/// Shell command removing a storage class's local mount directory
pub fn mount_cleanup_command(storage_class: &str) -> String {
    format!("rm -rfv {}/{}", LOCAL_STORAGE_MOUNT_DIR, storage_class)
}

/// Command pair wiping the partition table of every listed device
pub fn disk_wipe_commands(device_paths: &[String]) -> Vec<String> {
    let mut disks = String::new();
    for device in device_paths {
        disks.push_str(&format!(" {}", device));
    }
    vec![
        format!("DISKS=\"{}\"", disks),
        "for disk in $DISKS; do sgdisk --zap-all $disk;done".to_string(),
    ]
}

// =============================================================================
// Nested Teardown
// =============================================================================

/// Tear down the local-storage layer under the deployment.
///
/// Resolves the device-backed storage class from the StorageCluster spec,
/// the LocalVolume owning it, and the labeled node set. Per-volume and
/// per-node failures are collected rather than aborting, so every node
/// gets its cleanup attempt.
pub async fn teardown_local_storage(
    cluster: &dyn ClusterOps,
    config: &TeardownConfig,
    events: &dyn EventSink,
) -> Result<LocalStorageOutcome> {
    let step = TeardownStep::TeardownLocalStorage;

    let storage_cluster = cluster
        .get(&ResourceRef::namespaced(
            ResourceKind::StorageCluster,
            STORAGE_CLUSTER_NAME,
            &config.namespace,
        ))
        .await?;
    let storage_class = device_set_storage_class(&storage_cluster)?;

    let class_obj = cluster
        .get(&ResourceRef::cluster(
            ResourceKind::StorageClass,
            &storage_class,
        ))
        .await?;
    let local_volume = owner_local_volume(&class_obj)?;
    info!("storage class: {}  local volume: {}", storage_class, local_volume);

    let lv_obj = cluster
        .get(&ResourceRef::namespaced(
            ResourceKind::LocalVolume,
            &local_volume,
            LOCAL_STORAGE_NAMESPACE,
        ))
        .await?;
    let device_paths = device_paths_of(&lv_obj)?;
    let nodes = labeled_node_names(cluster, OPERATOR_NODE_LABEL).await?;

    let mut outcome = LocalStorageOutcome::default();

    info!("deleting local volume PVs");
    let selector = format!("{}={}", LOCAL_VOLUME_PV_SELECTOR, local_volume);
    let volumes = cluster
        .list(ResourceKind::PersistentVolume, None, Some(&selector))
        .await?;
    for pv_name in volumes.iter().filter_map(name_of) {
        let target = ResourceRef::cluster(ResourceKind::PersistentVolume, pv_name);
        events.emit(TeardownEvent::Deleting {
            resource: target.clone(),
        });
        match cluster.delete(&target).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {}
            Err(err) => {
                events.emit(TeardownEvent::ItemFailed {
                    step,
                    target: target.to_string(),
                    reason: err.to_string(),
                });
                outcome.failures.push(ItemFailure {
                    step,
                    target: target.to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }

    info!("removing local volume mounts from storage nodes");
    let cleanup = [mount_cleanup_command(&storage_class)];
    for node in &nodes {
        exec_on_node(cluster, events, step, node, &cleanup, &mut outcome.failures).await;
    }

    info!("wiping local disks on storage nodes");
    let wipe = disk_wipe_commands(&device_paths);
    for node in &nodes {
        exec_on_node(cluster, events, step, node, &wipe, &mut outcome.failures).await;
    }

    info!("deleting storage class {}", storage_class);
    let class_ref = ResourceRef::cluster(ResourceKind::StorageClass, &storage_class);
    events.emit(TeardownEvent::Deleting {
        resource: class_ref.clone(),
    });
    match cluster.delete(&class_ref).await {
        Ok(()) => {}
        Err(err) if err.is_not_found() => {}
        Err(err) => return Err(err),
    }

    info!("deleting local volume {}", local_volume);
    let lv_ref = ResourceRef::namespaced(
        ResourceKind::LocalVolume,
        &local_volume,
        LOCAL_STORAGE_NAMESPACE,
    );
    events.emit(TeardownEvent::Deleting {
        resource: lv_ref.clone(),
    });
    match cluster.delete(&lv_ref).await {
        Ok(()) => {}
        Err(err) if err.is_not_found() => {}
        Err(err) => return Err(err),
    }

    outcome.removed_storage_class = Some(storage_class);
    Ok(outcome)
}

/// Run commands on one node, recording a failure instead of bailing so the
/// remaining nodes still get cleaned
pub(crate) async fn exec_on_node(
    cluster: &dyn ClusterOps,
    events: &dyn EventSink,
    step: TeardownStep,
    node: &str,
    commands: &[String],
    failures: &mut Vec<ItemFailure>,
) {
    events.emit(TeardownEvent::NodeCommand {
        node: node.to_string(),
        command: commands.join("; "),
    });
    if let Err(err) = cluster.exec_debug_cmd(node, commands).await {
        events.emit(TeardownEvent::ItemFailed {
            step,
            target: node.to_string(),
            reason: err.to_string(),
        });
        failures.push(ItemFailure {
            step,
            target: node.to_string(),
            reason: err.to_string(),
        });
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Storage class named by the first device set's claim template
fn device_set_storage_class(storage_cluster: &Value) -> Result<String> {
    storage_cluster
        .pointer("/spec/storageDeviceSets/0/dataPVCTemplate/spec/storageClassName")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::UnavailableAttribute {
            resource: name_of(storage_cluster)
                .unwrap_or(STORAGE_CLUSTER_NAME)
                .to_string(),
            attribute: "storageDeviceSets".to_string(),
        })
}

/// LocalVolume owning a storage class, from its owner label
fn owner_local_volume(storage_class: &Value) -> Result<String> {
    storage_class
        .get("metadata")
        .and_then(|meta| meta.get("labels"))
        .and_then(|labels| labels.get(LOCAL_VOLUME_OWNER_LABEL))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::UnavailableAttribute {
            resource: name_of(storage_class).unwrap_or("storageclass").to_string(),
            attribute: LOCAL_VOLUME_OWNER_LABEL.to_string(),
        })
}

/// Device paths listed by the first storage class device group
fn device_paths_of(local_volume: &Value) -> Result<Vec<String>> {
    local_volume
        .pointer("/spec/storageClassDevices/0/devicePaths")
        .and_then(Value::as_array)
        .map(|paths| {
            paths
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .ok_or_else(|| Error::UnavailableAttribute {
            resource: name_of(local_volume).unwrap_or("localvolume").to_string(),
            attribute: "storageClassDevices".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mount_cleanup_command() {
        assert_eq!(
            mount_cleanup_command("localblock"),
            "rm -rfv /mnt/local-storage/localblock"
        );
    }

    #[test]
    fn test_disk_wipe_commands() {
        let commands = disk_wipe_commands(&["/dev/sdb".to_string(), "/dev/sdc".to_string()]);
        assert_eq!(
            commands,
            vec![
                "DISKS=\" /dev/sdb /dev/sdc\"".to_string(),
                "for disk in $DISKS; do sgdisk --zap-all $disk;done".to_string(),
            ]
        );
    }

    #[test]
    fn test_device_set_storage_class() {
        let storage_cluster = json!({
            "metadata": { "name": "ocs-storagecluster" },
            "spec": {
                "storageDeviceSets": [{
                    "dataPVCTemplate": {
                        "spec": { "storageClassName": "localblock" }
                    }
                }]
            }
        });
        assert_eq!(
            device_set_storage_class(&storage_cluster).ok(),
            Some("localblock".to_string())
        );

        let empty = json!({ "metadata": { "name": "ocs-storagecluster" }, "spec": {} });
        assert!(device_set_storage_class(&empty).is_err());
    }

    #[test]
    fn test_owner_local_volume() {
        let storage_class = json!({
            "metadata": {
                "name": "localblock",
                "labels": { "local.storage.openshift.io/owner-name": "local-block" }
            }
        });
        assert_eq!(
            owner_local_volume(&storage_class).ok(),
            Some("local-block".to_string())
        );
    }

    #[test]
    fn test_device_paths_of() {
        let local_volume = json!({
            "metadata": { "name": "local-block" },
            "spec": {
                "storageClassDevices": [
                    { "devicePaths": ["/dev/sdb", "/dev/sdc"] }
                ]
            }
        });
        assert_eq!(
            device_paths_of(&local_volume).ok(),
            Some(vec!["/dev/sdb".to_string(), "/dev/sdc".to_string()])
        );
    }
}

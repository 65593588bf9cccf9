//! Kubernetes implementation of the cluster port
//!
//! All resource verbs go through dynamic-object APIs addressed by the
//! static coordinates on [`ResourceKind`], so no type generation or
//! discovery is needed for the operator's custom resources. Node commands
//! run through a short-lived privileged debug pod that chroots into the
//! host filesystem.

use crate::cluster::{ClusterOps, ResourceKind, ResourceRef};
use crate::error::{Error, Result};
use async_trait::async_trait;
use backoff::ExponentialBackoff;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{
    Api, ApiResource, AttachParams, DeleteParams, DynamicObject, ListParams, Patch as KubePatch,
    PatchParams, PostParams,
};
use kube::core::GroupVersionKind;
use kube::Client;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

/// Namespace the debug pods are created in
const DEBUG_POD_NAMESPACE: &str = "default";

/// Image used for debug pods; needs chroot and sgdisk on board
const DEBUG_POD_IMAGE: &str = "registry.redhat.io/rhel8/support-tools";

/// How long to wait for a debug pod to reach Running
const DEBUG_POD_TIMEOUT: Duration = Duration::from_secs(120);

/// Initial poll interval for deletion waits
const WAIT_POLL_INTERVAL: Duration = Duration::from_secs(3);

// =============================================================================
// Kube Cluster
// =============================================================================

/// Cluster port backed by a real apiserver connection
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    /// Wrap an established client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn dynamic_api(&self, kind: ResourceKind, namespace: Option<&str>) -> Api<DynamicObject> {
        let resource = api_resource(kind);
        match namespace {
            Some(ns) if kind.namespaced() => {
                Api::namespaced_with(self.client.clone(), ns, &resource)
            }
            _ => Api::all_with(self.client.clone(), &resource),
        }
    }

    fn api_for(&self, resource: &ResourceRef) -> Api<DynamicObject> {
        self.dynamic_api(resource.kind, resource.namespace.as_deref())
    }

    async fn run_in_debug_pod(
        &self,
        pods: &Api<Pod>,
        pod_name: &str,
        node: &str,
        commands: &[String],
    ) -> Result<String> {
        wait_for_running(pods, pod_name, node).await?;

        let script = commands.join("; ");
        debug!("node {}: {}", node, script);
        let attach = AttachParams::default().stdout(true).stderr(true);
        let mut attached = pods
            .exec(
                pod_name,
                ["chroot", "/host", "sh", "-c", script.as_str()],
                &attach,
            )
            .await
            .map_err(Error::Kube)?;

        let mut output = String::new();
        if let Some(mut stdout) = attached.stdout() {
            stdout.read_to_string(&mut output).await?;
        }

        if let Some(status) = attached.take_status() {
            if let Some(status) = status.await {
                if status.status.as_deref() != Some("Success") {
                    return Err(Error::RemoteCommand {
                        node: node.to_string(),
                        reason: status
                            .message
                            .unwrap_or_else(|| "command terminated with non-zero exit".to_string()),
                    });
                }
            }
        }
        let _ = attached.join().await;

        Ok(output)
    }
}

#[async_trait]
impl ClusterOps for KubeCluster {
    async fn get(&self, resource: &ResourceRef) -> Result<Value> {
        let obj = self
            .api_for(resource)
            .get(&resource.name)
            .await
            .map_err(|err| api_err(resource, err))?;
        Ok(serde_json::to_value(obj)?)
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        selector: Option<&str>,
    ) -> Result<Vec<Value>> {
        let mut params = ListParams::default();
        if let Some(selector) = selector {
            params = params.labels(selector);
        }
        let objects = self
            .dynamic_api(kind, namespace)
            .list(&params)
            .await
            .map_err(|err| list_err(kind, err))?;
        objects
            .items
            .into_iter()
            .map(|obj| serde_json::to_value(obj).map_err(Error::JsonParse))
            .collect()
    }

    async fn patch(&self, resource: &ResourceRef, patch: &json_patch::Patch) -> Result<()> {
        debug!("patching {}", resource);
        self.api_for(resource)
            .patch(
                &resource.name,
                &PatchParams::default(),
                &KubePatch::<()>::Json(patch.clone()),
            )
            .await
            .map_err(|err| api_err(resource, err))?;
        Ok(())
    }

    async fn delete(&self, resource: &ResourceRef) -> Result<()> {
        debug!("deleting {}", resource);
        self.api_for(resource)
            .delete(&resource.name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|err| api_err(resource, err))
    }

    async fn add_label(&self, resource: &ResourceRef, label: &str) -> Result<()> {
        debug!("labeling {} with {}", resource, label);
        self.api_for(resource)
            .patch(
                &resource.name,
                &PatchParams::default(),
                &KubePatch::Merge(label_patch(label)),
            )
            .await
            .map_err(|err| api_err(resource, err))?;
        Ok(())
    }

    async fn exec_debug_cmd(&self, node: &str, commands: &[String]) -> Result<String> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), DEBUG_POD_NAMESPACE);
        let pod_name = debug_pod_name(node);
        let manifest = debug_pod_manifest(&pod_name, node)?;

        info!("starting debug pod {} on node {}", pod_name, node);
        match pods.create(&PostParams::default(), &manifest).await {
            Ok(_) => {}
            // A leftover pod from an interrupted run blocks the name.
            Err(kube::Error::Api(ae)) if ae.code == 409 => {
                pods.delete(&pod_name, &DeleteParams::default())
                    .await
                    .map_err(Error::Kube)?;
                let pod_ref =
                    ResourceRef::namespaced(ResourceKind::Pod, &pod_name, DEBUG_POD_NAMESPACE);
                self.wait_for_delete(&pod_ref, Duration::from_secs(60))
                    .await?;
                pods.create(&PostParams::default(), &manifest)
                    .await
                    .map_err(Error::Kube)?;
            }
            Err(err) => return Err(Error::Kube(err)),
        }

        let result = self.run_in_debug_pod(&pods, &pod_name, node, commands).await;
        let _ = pods.delete(&pod_name, &DeleteParams::default()).await;
        result
    }

    async fn delete_namespace(&self, name: &str) -> Result<()> {
        self.delete(&ResourceRef::cluster(ResourceKind::Namespace, name))
            .await
    }

    async fn wait_for_delete(&self, resource: &ResourceRef, timeout: Duration) -> Result<()> {
        debug!("waiting for {} to be deleted", resource);
        let started = Instant::now();
        let policy = ExponentialBackoff {
            initial_interval: WAIT_POLL_INTERVAL,
            max_interval: Duration::from_secs(30),
            max_elapsed_time: Some(timeout),
            ..ExponentialBackoff::default()
        };
        backoff::future::retry(policy, || async {
            match self.get(resource).await {
                Err(err) if err.is_not_found() => Ok(()),
                Ok(_) => Err(backoff::Error::transient(Error::WaitTimeout {
                    kind: resource.kind.kind().to_string(),
                    name: resource.name.clone(),
                    elapsed_secs: started.elapsed().as_secs(),
                })),
                Err(err) => Err(backoff::Error::permanent(err)),
            }
        })
        .await
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn api_resource(kind: ResourceKind) -> ApiResource {
    let gvk = GroupVersionKind::gvk(kind.group(), kind.version(), kind.kind());
    ApiResource::from_gvk_with_plural(&gvk, kind.plural())
}

fn api_err(resource: &ResourceRef, err: kube::Error) -> Error {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => Error::NotFound {
            kind: resource.kind.kind().to_string(),
            name: resource.name.clone(),
        },
        kube::Error::Api(ae) if ae.code == 422 => Error::PatchRejected {
            kind: resource.kind.kind().to_string(),
            name: resource.name.clone(),
            reason: ae.message,
        },
        other => Error::Kube(other),
    }
}

fn list_err(kind: ResourceKind, err: kube::Error) -> Error {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => Error::NotFound {
            kind: kind.kind().to_string(),
            name: "*".to_string(),
        },
        other => Error::Kube(other),
    }
}

/// Merge-patch body for a label in wire syntax (`key=value` sets,
/// `key-` removes, bare key sets an empty value)
fn label_patch(label: &str) -> Value {
    let (key, value) = if let Some((key, value)) = label.split_once('=') {
        (key.to_string(), Value::String(value.to_string()))
    } else if let Some(key) = label.strip_suffix('-') {
        (key.to_string(), Value::Null)
    } else {
        (label.to_string(), Value::String(String::new()))
    };
    let mut labels = serde_json::Map::new();
    labels.insert(key, value);
    json!({ "metadata": { "labels": labels } })
}

fn debug_pod_name(node: &str) -> String {
    let mut name = format!("teardown-debug-{}", node.replace('.', "-"));
    name.truncate(63);
    name.trim_end_matches('-').to_string()
}

fn debug_pod_manifest(name: &str, node: &str) -> Result<Pod> {
    let pod = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {
            "name": name,
            "labels": { "app": "ocs-teardown-debug" }
        },
        "spec": {
            "nodeName": node,
            "hostPID": true,
            "restartPolicy": "Never",
            "containers": [{
                "name": "debug",
                "image": DEBUG_POD_IMAGE,
                "command": ["sleep", "86400"],
                "securityContext": { "privileged": true },
                "volumeMounts": [{ "name": "host", "mountPath": "/host" }]
            }],
            "volumes": [{ "name": "host", "hostPath": { "path": "/" } }],
            "tolerations": [{ "operator": "Exists" }]
        }
    }))?;
    Ok(pod)
}

async fn wait_for_running(pods: &Api<Pod>, pod_name: &str, node: &str) -> Result<()> {
    let policy = ExponentialBackoff {
        initial_interval: Duration::from_secs(1),
        max_interval: Duration::from_secs(5),
        max_elapsed_time: Some(DEBUG_POD_TIMEOUT),
        ..ExponentialBackoff::default()
    };
    backoff::future::retry(policy, || async {
        let pod = pods
            .get(pod_name)
            .await
            .map_err(|err| backoff::Error::permanent(Error::Kube(err)))?;
        let phase = pod
            .status
            .as_ref()
            .and_then(|status| status.phase.as_deref())
            .unwrap_or("Pending");
        if phase == "Running" {
            Ok(())
        } else {
            Err(backoff::Error::transient(Error::RemoteCommand {
                node: node.to_string(),
                reason: format!("debug pod stuck in phase {}", phase),
            }))
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_patch_set() {
        assert_eq!(
            label_patch("topology.rook.io/rack=rack0"),
            json!({ "metadata": { "labels": { "topology.rook.io/rack": "rack0" } } })
        );
        assert_eq!(
            label_patch("cluster.ocs.openshift.io/openshift-storage"),
            json!({ "metadata": { "labels": { "cluster.ocs.openshift.io/openshift-storage": "" } } })
        );
    }

    #[test]
    fn test_label_patch_remove() {
        assert_eq!(
            label_patch("topology.rook.io/rack-"),
            json!({ "metadata": { "labels": { "topology.rook.io/rack": null } } })
        );
    }

    #[test]
    fn test_debug_pod_name() {
        assert_eq!(
            debug_pod_name("worker-0.example.com"),
            "teardown-debug-worker-0-example-com"
        );
        let long = debug_pod_name(&"n".repeat(100));
        assert!(long.len() <= 63);
        assert!(!long.ends_with('-'));
    }

    #[test]
    fn test_api_resource_coordinates() {
        let resource = api_resource(ResourceKind::StorageCluster);
        assert_eq!(resource.group, "ocs.openshift.io");
        assert_eq!(resource.version, "v1");
        assert_eq!(resource.kind, "StorageCluster");
        assert_eq!(resource.plural, "storageclusters");

        let core = api_resource(ResourceKind::Namespace);
        assert_eq!(core.api_version, "v1");
    }

    #[test]
    fn test_debug_pod_manifest_targets_node() {
        let pod = debug_pod_manifest("teardown-debug-n1", "n1").unwrap();
        let spec = pod.spec.unwrap();
        assert_eq!(spec.node_name.as_deref(), Some("n1"));
        assert_eq!(spec.host_pid, Some(true));
    }
}

//! In-memory cluster fake for tests
//!
//! Holds resources as raw JSON keyed by kind, namespace, and name, records
//! every call in order, and lets tests inject failures per target.

use super::{ClusterOps, ResourceKind, ResourceRef};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// One recorded cluster call, in invocation order
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Get(ResourceRef),
    List {
        kind: ResourceKind,
        namespace: Option<String>,
        selector: Option<String>,
    },
    Patch {
        resource: ResourceRef,
        patch: Value,
    },
    Delete(ResourceRef),
    AddLabel {
        resource: ResourceRef,
        label: String,
    },
    ExecDebug {
        node: String,
        commands: Vec<String>,
    },
    DeleteNamespace(String),
    WaitForDelete(ResourceRef),
}

type ObjectKey = (ResourceKind, Option<String>, String);

#[derive(Default)]
pub struct FakeCluster {
    objects: Mutex<HashMap<ObjectKey, Value>>,
    calls: Mutex<Vec<Call>>,
    fail_delete: Mutex<HashSet<String>>,
    fail_wait: Mutex<HashSet<String>>,
    fail_exec: Mutex<HashSet<String>>,
    absent_kinds: Mutex<HashSet<ResourceKind>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object; kind plus the object's own metadata decide the key
    pub fn insert(&self, kind: ResourceKind, object: Value) {
        let name = object
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let namespace = object
            .pointer("/metadata/namespace")
            .and_then(Value::as_str)
            .map(str::to_string);
        self.objects.lock().insert((kind, namespace, name), object);
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn contains(&self, resource: &ResourceRef) -> bool {
        self.objects.lock().contains_key(&key_of(resource))
    }

    pub fn object(&self, resource: &ResourceRef) -> Option<Value> {
        self.objects.lock().get(&key_of(resource)).cloned()
    }

    /// Make deletes of this resource fail with a server error
    pub fn fail_delete_on(&self, resource: &ResourceRef) {
        self.fail_delete.lock().insert(resource.to_string());
    }

    /// Make deletion waits on this resource time out
    pub fn fail_wait_on(&self, resource: &ResourceRef) {
        self.fail_wait.lock().insert(resource.to_string());
    }

    /// Make node commands on this node fail
    pub fn fail_exec_on(&self, node: &str) {
        self.fail_exec.lock().insert(node.to_string());
    }

    /// Make lists of this kind fail as if its CRD is not installed
    pub fn mark_kind_absent(&self, kind: ResourceKind) {
        self.absent_kinds.lock().insert(kind);
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

fn key_of(resource: &ResourceRef) -> ObjectKey {
    (
        resource.kind,
        resource.namespace.clone(),
        resource.name.clone(),
    )
}

fn not_found(resource: &ResourceRef) -> Error {
    Error::NotFound {
        kind: resource.kind.to_string(),
        name: resource.name.clone(),
    }
}

fn server_error(resource: &ResourceRef) -> Error {
    Error::Kube(kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("injected failure deleting {}", resource),
        reason: "InternalError".to_string(),
        code: 500,
    }))
}

/// Match a single-term label selector, either `key=value` or a bare `key`
fn selector_matches(object: &Value, selector: &str) -> bool {
    let labels = match object.pointer("/metadata/labels") {
        Some(Value::Object(labels)) => labels,
        _ => return false,
    };
    match selector.split_once('=') {
        Some((key, value)) => labels.get(key).and_then(Value::as_str) == Some(value),
        None => labels.contains_key(selector),
    }
}

#[async_trait]
impl ClusterOps for FakeCluster {
    async fn get(&self, resource: &ResourceRef) -> Result<Value> {
        self.record(Call::Get(resource.clone()));
        self.object(resource).ok_or_else(|| not_found(resource))
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        selector: Option<&str>,
    ) -> Result<Vec<Value>> {
        self.record(Call::List {
            kind,
            namespace: namespace.map(str::to_string),
            selector: selector.map(str::to_string),
        });
        if self.absent_kinds.lock().contains(&kind) {
            return Err(Error::NotFound {
                kind: kind.to_string(),
                name: "*".to_string(),
            });
        }
        let objects = self.objects.lock();
        Ok(objects
            .iter()
            .filter(|((object_kind, object_ns, _), _)| {
                *object_kind == kind
                    && namespace.map_or(true, |ns| object_ns.as_deref() == Some(ns))
            })
            .filter(|(_, object)| selector.map_or(true, |sel| selector_matches(object, sel)))
            .map(|(_, object)| object.clone())
            .collect())
    }

    async fn patch(&self, resource: &ResourceRef, patch: &json_patch::Patch) -> Result<()> {
        self.record(Call::Patch {
            resource: resource.clone(),
            patch: serde_json::to_value(patch).unwrap_or(Value::Null),
        });
        let mut objects = self.objects.lock();
        let object = objects
            .get_mut(&key_of(resource))
            .ok_or_else(|| not_found(resource))?;
        json_patch::patch(object, patch).map_err(|err| Error::PatchRejected {
            kind: resource.kind.to_string(),
            name: resource.name.clone(),
            reason: err.to_string(),
        })
    }

    async fn delete(&self, resource: &ResourceRef) -> Result<()> {
        self.record(Call::Delete(resource.clone()));
        if self.fail_delete.lock().contains(&resource.to_string()) {
            return Err(server_error(resource));
        }
        self.objects
            .lock()
            .remove(&key_of(resource))
            .map(|_| ())
            .ok_or_else(|| not_found(resource))
    }

    async fn add_label(&self, resource: &ResourceRef, label: &str) -> Result<()> {
        self.record(Call::AddLabel {
            resource: resource.clone(),
            label: label.to_string(),
        });
        let mut objects = self.objects.lock();
        let object = objects
            .get_mut(&key_of(resource))
            .ok_or_else(|| not_found(resource))?;
        let metadata = object
            .as_object_mut()
            .and_then(|object| object.get_mut("metadata"))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| not_found(resource))?;
        let labels = metadata
            .entry("labels")
            .or_insert_with(|| Value::Object(Default::default()));
        if let Some(labels) = labels.as_object_mut() {
            match label.split_once('=') {
                Some((key, value)) => {
                    labels.insert(key.to_string(), Value::String(value.to_string()));
                }
                None => match label.strip_suffix('-') {
                    Some(key) => {
                        labels.remove(key);
                    }
                    None => {
                        labels.insert(label.to_string(), Value::String(String::new()));
                    }
                },
            }
        }
        Ok(())
    }

    async fn exec_debug_cmd(&self, node: &str, commands: &[String]) -> Result<String> {
        self.record(Call::ExecDebug {
            node: node.to_string(),
            commands: commands.to_vec(),
        });
        if self.fail_exec.lock().contains(node) {
            return Err(Error::RemoteCommand {
                node: node.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        Ok(String::new())
    }

    async fn delete_namespace(&self, name: &str) -> Result<()> {
        self.record(Call::DeleteNamespace(name.to_string()));
        let resource = ResourceRef::cluster(ResourceKind::Namespace, name);
        if self.fail_delete.lock().contains(&resource.to_string()) {
            return Err(server_error(&resource));
        }
        self.objects
            .lock()
            .remove(&key_of(&resource))
            .map(|_| ())
            .ok_or_else(|| not_found(&resource))
    }

    async fn wait_for_delete(&self, resource: &ResourceRef, timeout: Duration) -> Result<()> {
        self.record(Call::WaitForDelete(resource.clone()));
        let timed_out = self.fail_wait.lock().contains(&resource.to_string())
            || self.contains(resource);
        if timed_out {
            return Err(Error::WaitTimeout {
                kind: resource.kind.to_string(),
                name: resource.name.clone(),
                elapsed_secs: timeout.as_secs(),
            });
        }
        Ok(())
    }
}

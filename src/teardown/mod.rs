//! Storage Operator Teardown
//!
//! Dependency-ordered removal of an OpenShift Container Storage deployment.
//! Consumers of the storage are detached first, then workloads and claims,
//! then the storage layers themselves, and finally the operator's labels,
//! CRDs, and namespace.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Teardown Run                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  discover targets                                            │
//! │       │                                                      │
//! │  detach consumers (monitoring, registry, logging)            │
//! │       │                                                      │
//! │  delete pods ─► delete claims                                │
//! │       │                                                      │
//! │  local storage teardown (PVs, mounts, disks, SC, LV)         │
//! │       │                                                      │
//! │  delete StorageCluster ─► clean /var/lib/rook on nodes       │
//! │       │                                                      │
//! │  delete storage classes ─► unlabel nodes ─► delete CRDs      │
//! │       │                                                      │
//! │  delete operator namespace                                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every step is idempotent: already-deleted resources are treated as a
//! success, so a run can be repeated after an interruption. Steps either
//! abort the run on failure or record the failure and continue, depending
//! on whether later steps can still make progress without them.
//!
//! # Usage
//!
//! ```ignore
//! use ocs_teardown::cluster::KubeCluster;
//! use ocs_teardown::config::TeardownConfig;
//! use ocs_teardown::teardown::Uninstaller;
//! use std::sync::Arc;
//!
//! let client = kube::Client::try_default().await?;
//! let config = TeardownConfig::default();
//! let report = Uninstaller::new(Arc::new(KubeCluster::new(client)), config)
//!     .uninstall()
//!     .await?;
//! println!("outcome: {:?}", report.outcome());
//! ```

pub mod detach;
pub mod discovery;
pub mod event;
pub mod local_storage;
pub mod report;
pub mod uninstall;

// Re-export main types
pub use detach::{detach_logging, detach_monitoring, detach_registry};
pub use discovery::{discover_targets, TeardownTargets};
pub use event::{EventSink, TeardownEvent, TracingSink};
pub use local_storage::{teardown_local_storage, LocalStorageOutcome};
pub use report::{
    FailurePolicy, ItemFailure, Outcome, StepReport, StepStatus, TeardownReport, TeardownStep,
};
pub use uninstall::{uninstall, Uninstaller};

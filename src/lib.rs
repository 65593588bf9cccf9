//! OCS Teardown - Storage Operator Removal
//!
//! Automation for completely removing an OpenShift Container Storage
//! deployment from a cluster: detaching the platform services that consume
//! it, deleting the workloads and volumes bound to it, tearing down any
//! local-storage layer underneath it, and erasing the operator's own
//! resources, node labels, CRDs, and namespace.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Uninstaller                             │
//! │            (ordered steps, per-step failure policy)              │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────────────┐  │
//! │  │  Discovery   │  │   Detach     │  │   Local Storage        │  │
//! │  │  (SC/PVC/Pod │  │ (monitoring, │  │   (PVs, mounts,        │  │
//! │  │   targets)   │  │  registry,   │  │    disk wipe)          │  │
//! │  └──────┬───────┘  │  logging)    │  └───────────┬────────────┘  │
//! │         │          └──────┬───────┘              │               │
//! │         └─────────────────┼──────────────────────┘               │
//! │                           │                                      │
//! │                 ┌─────────┴──────────┐                           │
//! │                 │    ClusterOps      │                           │
//! │                 │ (apiserver access, │                           │
//! │                 │  node debug pods)  │                           │
//! │                 └────────────────────┘                           │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`teardown`]: The step sequence, orchestration, and run reports
//! - [`cluster`]: Cluster API access and node command execution
//! - [`config`]: Run configuration and platform selection
//! - [`constants`]: Resource names, labels, and namespaces touched
//! - [`error`]: Error types and handling

pub mod cluster;
pub mod config;
pub mod constants;
pub mod error;
pub mod teardown;

// Re-export commonly used types
pub use cluster::{ClusterOps, ClusterRef, KubeCluster, ResourceKind, ResourceRef};

pub use config::{Platform, TeardownConfig};

pub use error::{Error, Result};

pub use teardown::{
    uninstall, EventSink, Outcome, StepStatus, TeardownEvent, TeardownReport, TeardownStep,
    TracingSink, Uninstaller,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

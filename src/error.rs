//! Error types for the teardown orchestrator
//!
//! Provides structured error types for cluster operations, remote node
//! commands, deletion waits, and step-level orchestration failures.

use crate::teardown::report::TeardownStep;
use thiserror::Error;

/// Unified error type for the teardown
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Cluster API Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Resource not found: {kind}/{name}")]
    NotFound { kind: String, name: String },

    #[error("Patch rejected for {kind}/{name}: {reason}")]
    PatchRejected {
        kind: String,
        name: String,
        reason: String,
    },

    // =========================================================================
    // Resource Shape Errors
    // =========================================================================
    #[error("Resource {resource} has no {attribute}")]
    UnavailableAttribute { resource: String, attribute: String },

    // =========================================================================
    // Remote Execution Errors
    // =========================================================================
    #[error("Command on node {node} failed: {reason}")]
    RemoteCommand { node: String, reason: String },

    // =========================================================================
    // Wait Errors
    // =========================================================================
    #[error("Timed out waiting for {kind}/{name} deletion after {elapsed_secs}s")]
    WaitTimeout {
        kind: String,
        name: String,
        elapsed_secs: u64,
    },

    // =========================================================================
    // Orchestration Errors
    // =========================================================================
    #[error("Teardown step {step} failed: {source}")]
    StepFailed {
        step: TeardownStep,
        #[source]
        source: Box<Error>,
    },

    // =========================================================================
    // Parse/IO Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error means the target resource is already gone
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Check if this error is a deletion-wait timeout
    pub fn is_wait_timeout(&self) -> bool {
        matches!(self, Error::WaitTimeout { .. })
    }

    /// Check if this error is a rejected patch request
    pub fn is_patch_rejected(&self) -> bool {
        matches!(self, Error::PatchRejected { .. })
    }
}

/// Result type alias for the teardown
pub type Result<T> = std::result::Result<T, Error>;

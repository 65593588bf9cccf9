//! Teardown step model and run report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Steps
// =============================================================================

/// The teardown steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeardownStep {
    Discover,
    DetachMonitoring,
    DetachRegistry,
    DetachLogging,
    DeletePods,
    DeleteClaims,
    TeardownLocalStorage,
    DeleteStorageCluster,
    CleanNodeDirectories,
    DeleteStorageClasses,
    UnlabelNodes,
    DeleteCrds,
    DeleteNamespace,
}

impl TeardownStep {
    /// Every step in execution order
    pub const ALL: [TeardownStep; 13] = [
        TeardownStep::Discover,
        TeardownStep::DetachMonitoring,
        TeardownStep::DetachRegistry,
        TeardownStep::DetachLogging,
        TeardownStep::DeletePods,
        TeardownStep::DeleteClaims,
        TeardownStep::TeardownLocalStorage,
        TeardownStep::DeleteStorageCluster,
        TeardownStep::CleanNodeDirectories,
        TeardownStep::DeleteStorageClasses,
        TeardownStep::UnlabelNodes,
        TeardownStep::DeleteCrds,
        TeardownStep::DeleteNamespace,
    ];

    /// What a wholesale failure of this step does to the run.
    ///
    /// Cleanup loops tolerate failures and keep the run going; the
    /// remaining steps leave the cluster in a state later steps cannot
    /// work with, so they abort.
    pub fn policy(&self) -> FailurePolicy {
        match self {
            TeardownStep::DeletePods
            | TeardownStep::DeleteClaims
            | TeardownStep::CleanNodeDirectories
            | TeardownStep::DeleteStorageClasses
            | TeardownStep::UnlabelNodes
            | TeardownStep::DeleteCrds => FailurePolicy::Continue,
            _ => FailurePolicy::Abort,
        }
    }
}

impl std::fmt::Display for TeardownStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TeardownStep::Discover => "discover",
            TeardownStep::DetachMonitoring => "detach-monitoring",
            TeardownStep::DetachRegistry => "detach-registry",
            TeardownStep::DetachLogging => "detach-logging",
            TeardownStep::DeletePods => "delete-pods",
            TeardownStep::DeleteClaims => "delete-claims",
            TeardownStep::TeardownLocalStorage => "teardown-local-storage",
            TeardownStep::DeleteStorageCluster => "delete-storage-cluster",
            TeardownStep::CleanNodeDirectories => "clean-node-directories",
            TeardownStep::DeleteStorageClasses => "delete-storage-classes",
            TeardownStep::UnlabelNodes => "unlabel-nodes",
            TeardownStep::DeleteCrds => "delete-crds",
            TeardownStep::DeleteNamespace => "delete-namespace",
        };
        write!(f, "{}", name)
    }
}

/// How a step's wholesale failure affects the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// End the run, later steps depend on this one
    Abort,
    /// Record the failure and keep going
    Continue,
}

// =============================================================================
// Step Results
// =============================================================================

/// Terminal status of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    /// Every item handled cleanly
    Completed,
    /// The step ran to the end but some items failed
    CompletedWithErrors,
    /// The step did not apply to this cluster
    Skipped,
    /// The step failed wholesale
    Failed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::CompletedWithErrors => write!(f, "completed with errors"),
            StepStatus::Skipped => write!(f, "skipped"),
            StepStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One isolated failure inside a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub step: TeardownStep,
    /// The resource, node, or CRD that failed
    pub target: String,
    pub reason: String,
}

/// Recorded result of one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: TeardownStep,
    pub status: StepStatus,
}

// =============================================================================
// Run Report
// =============================================================================

/// Overall run outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// All steps completed or were skipped, no item failures
    Success,
    /// The run finished but left failures behind
    PartialFailure,
}

/// Summary of a full teardown run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeardownReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<StepReport>,
    pub item_failures: Vec<ItemFailure>,
}

impl TeardownReport {
    /// Derive the overall outcome from the recorded steps and failures
    pub fn outcome(&self) -> Outcome {
        let steps_clean = self
            .steps
            .iter()
            .all(|step| matches!(step.status, StepStatus::Completed | StepStatus::Skipped));
        if steps_clean && self.item_failures.is_empty() {
            Outcome::Success
        } else {
            Outcome::PartialFailure
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome() == Outcome::Success
    }
}

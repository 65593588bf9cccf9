//! Teardown orchestration
//!
//! [`Uninstaller`] drives the fixed step sequence: detach consumers, delete
//! workloads and claims, tear down local storage, then remove the operator's
//! own resources, labels, CRDs, and namespace. Each step's failure policy
//! decides whether an error ends the run or is recorded and stepped past.

use crate::cluster::queries::{all_node_names, labeled_node_names, local_volume_present};
use crate::cluster::{ClusterRef, ResourceKind, ResourceRef};
use crate::config::TeardownConfig;
use crate::constants::{
    OCS_CRDS, OPERATOR_NODE_LABEL, ROOK_STATE_DIR, STORAGE_CLUSTER_NAME, TOPOLOGY_ROOK_LABEL,
};
use crate::error::{Error, Result};
use crate::teardown::detach;
use crate::teardown::discovery::{discover_targets, TeardownTargets};
use crate::teardown::event::{EventSink, TeardownEvent, TracingSink};
use crate::teardown::local_storage::{exec_on_node, teardown_local_storage};
use crate::teardown::report::{
    FailurePolicy, ItemFailure, Outcome, StepReport, StepStatus, TeardownReport, TeardownStep,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of one step body: its status plus the item failures it absorbed
struct StepOutcome {
    status: StepStatus,
    failures: Vec<ItemFailure>,
}

impl StepOutcome {
    fn completed() -> Self {
        Self {
            status: StepStatus::Completed,
            failures: Vec::new(),
        }
    }

    fn skipped() -> Self {
        Self {
            status: StepStatus::Skipped,
            failures: Vec::new(),
        }
    }

    fn from_failures(failures: Vec<ItemFailure>) -> Self {
        let status = if failures.is_empty() {
            StepStatus::Completed
        } else {
            StepStatus::CompletedWithErrors
        };
        Self { status, failures }
    }
}

// =============================================================================
// Uninstaller
// =============================================================================

/// Drives a complete teardown run against one cluster
pub struct Uninstaller {
    cluster: ClusterRef,
    config: TeardownConfig,
    events: Arc<dyn EventSink>,
}

impl Uninstaller {
    pub fn new(cluster: ClusterRef, config: TeardownConfig) -> Self {
        Self {
            cluster,
            config,
            events: Arc::new(TracingSink),
        }
    }

    /// Replace the default log-backed sink with a caller-supplied observer
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Run every teardown step in order.
    ///
    /// Returns the run report when the sequence finishes, even if individual
    /// items failed along the way. Returns [`Error::StepFailed`] when a step
    /// that later steps depend on fails.
    pub async fn uninstall(&self) -> Result<TeardownReport> {
        let started_at = Utc::now();
        info!(
            namespace = %self.config.namespace,
            platform = %self.config.platform,
            "starting storage operator teardown"
        );

        let mut steps: Vec<StepReport> = Vec::new();
        let mut item_failures: Vec<ItemFailure> = Vec::new();

        self.begin(TeardownStep::Discover);
        let mut targets = match discover_targets(self.cluster.as_ref(), &self.config).await {
            Ok(targets) => targets,
            Err(err) => {
                return Err(Error::StepFailed {
                    step: TeardownStep::Discover,
                    source: Box::new(err),
                })
            }
        };
        self.events.emit(TeardownEvent::Discovered {
            storage_classes: targets.storage_classes.len(),
            claims: targets.claims.len(),
            pods: targets.pods.len(),
        });
        self.seal(
            &mut steps,
            &mut item_failures,
            TeardownStep::Discover,
            Ok(StepOutcome::completed()),
        )?;

        self.begin(TeardownStep::DetachMonitoring);
        let outcome = self.detach_monitoring_step().await;
        self.seal(
            &mut steps,
            &mut item_failures,
            TeardownStep::DetachMonitoring,
            outcome,
        )?;

        self.begin(TeardownStep::DetachRegistry);
        let outcome = self.detach_registry_step().await;
        self.seal(
            &mut steps,
            &mut item_failures,
            TeardownStep::DetachRegistry,
            outcome,
        )?;

        self.begin(TeardownStep::DetachLogging);
        let outcome = self.detach_logging_step().await;
        self.seal(
            &mut steps,
            &mut item_failures,
            TeardownStep::DetachLogging,
            outcome,
        )?;

        self.begin(TeardownStep::DeletePods);
        let outcome = self.delete_pods_step(&targets).await;
        self.seal(
            &mut steps,
            &mut item_failures,
            TeardownStep::DeletePods,
            outcome,
        )?;

        self.begin(TeardownStep::DeleteClaims);
        let outcome = self.delete_claims_step(&targets).await;
        self.seal(
            &mut steps,
            &mut item_failures,
            TeardownStep::DeleteClaims,
            outcome,
        )?;

        self.begin(TeardownStep::TeardownLocalStorage);
        let outcome = self.local_storage_step(&mut targets).await;
        self.seal(
            &mut steps,
            &mut item_failures,
            TeardownStep::TeardownLocalStorage,
            outcome,
        )?;

        self.begin(TeardownStep::DeleteStorageCluster);
        let outcome = self.delete_storage_cluster_step().await;
        self.seal(
            &mut steps,
            &mut item_failures,
            TeardownStep::DeleteStorageCluster,
            outcome,
        )?;

        self.begin(TeardownStep::CleanNodeDirectories);
        let outcome = self.clean_node_directories_step().await;
        self.seal(
            &mut steps,
            &mut item_failures,
            TeardownStep::CleanNodeDirectories,
            outcome,
        )?;

        self.begin(TeardownStep::DeleteStorageClasses);
        let outcome = self.delete_storage_classes_step(&targets).await;
        self.seal(
            &mut steps,
            &mut item_failures,
            TeardownStep::DeleteStorageClasses,
            outcome,
        )?;

        self.begin(TeardownStep::UnlabelNodes);
        let outcome = self.unlabel_nodes_step().await;
        self.seal(
            &mut steps,
            &mut item_failures,
            TeardownStep::UnlabelNodes,
            outcome,
        )?;

        self.begin(TeardownStep::DeleteCrds);
        let outcome = self.delete_crds_step().await;
        self.seal(
            &mut steps,
            &mut item_failures,
            TeardownStep::DeleteCrds,
            outcome,
        )?;

        self.begin(TeardownStep::DeleteNamespace);
        let outcome = self.delete_namespace_step().await;
        self.seal(
            &mut steps,
            &mut item_failures,
            TeardownStep::DeleteNamespace,
            outcome,
        )?;

        let report = TeardownReport {
            started_at,
            finished_at: Utc::now(),
            steps,
            item_failures,
        };
        match report.outcome() {
            Outcome::Success => info!("teardown finished cleanly"),
            Outcome::PartialFailure => warn!(
                "teardown finished with {} recorded failure(s)",
                report.item_failures.len()
            ),
        }
        Ok(report)
    }

    // =========================================================================
    // Run-loop plumbing
    // =========================================================================

    fn begin(&self, step: TeardownStep) {
        self.events.emit(TeardownEvent::StepStarted { step });
    }

    /// Record a step's result and apply its failure policy.
    ///
    /// A failed step with [`FailurePolicy::Continue`] becomes a recorded
    /// item failure; with [`FailurePolicy::Abort`] the run ends here.
    fn seal(
        &self,
        steps: &mut Vec<StepReport>,
        item_failures: &mut Vec<ItemFailure>,
        step: TeardownStep,
        outcome: Result<StepOutcome>,
    ) -> Result<()> {
        match outcome {
            Ok(outcome) => {
                if outcome.status != StepStatus::Skipped {
                    self.events.emit(TeardownEvent::StepCompleted {
                        step,
                        status: outcome.status,
                    });
                }
                steps.push(StepReport {
                    step,
                    status: outcome.status,
                });
                item_failures.extend(outcome.failures);
                Ok(())
            }
            Err(err) => {
                steps.push(StepReport {
                    step,
                    status: StepStatus::Failed,
                });
                match step.policy() {
                    FailurePolicy::Continue => {
                        warn!("step {} failed, continuing: {}", step, err);
                        self.record_failure(item_failures, step, step.to_string(), err.to_string());
                        Ok(())
                    }
                    FailurePolicy::Abort => Err(Error::StepFailed {
                        step,
                        source: Box::new(err),
                    }),
                }
            }
        }
    }

    fn skip(&self, step: TeardownStep, reason: &str) -> StepOutcome {
        self.events.emit(TeardownEvent::StepSkipped {
            step,
            reason: reason.to_string(),
        });
        StepOutcome::skipped()
    }

    fn record_failure(
        &self,
        failures: &mut Vec<ItemFailure>,
        step: TeardownStep,
        target: String,
        reason: String,
    ) {
        self.events.emit(TeardownEvent::ItemFailed {
            step,
            target: target.clone(),
            reason: reason.clone(),
        });
        failures.push(ItemFailure {
            step,
            target,
            reason,
        });
    }

    /// Delete each target, tolerating already-gone resources and collecting
    /// failures so one bad delete never strands the rest
    async fn delete_each(&self, step: TeardownStep, targets: &[ResourceRef]) -> Vec<ItemFailure> {
        let mut failures = Vec::new();
        for target in targets {
            self.events.emit(TeardownEvent::Deleting {
                resource: target.clone(),
            });
            match self.cluster.delete(target).await {
                Ok(()) => {}
                Err(err) if err.is_not_found() => {}
                Err(err) => {
                    self.record_failure(&mut failures, step, target.to_string(), err.to_string())
                }
            }
        }
        failures
    }

    // =========================================================================
    // Step Bodies
    // =========================================================================

    async fn detach_monitoring_step(&self) -> Result<StepOutcome> {
        detach::detach_monitoring(self.cluster.as_ref(), self.events.as_ref()).await?;
        Ok(StepOutcome::completed())
    }

    async fn detach_registry_step(&self) -> Result<StepOutcome> {
        let patched = detach::detach_registry(
            self.cluster.as_ref(),
            &self.config.platform,
            self.events.as_ref(),
        )
        .await?;
        if patched {
            Ok(StepOutcome::completed())
        } else {
            Ok(self.skip(
                TeardownStep::DetachRegistry,
                "platform registry not supported",
            ))
        }
    }

    async fn detach_logging_step(&self) -> Result<StepOutcome> {
        let deleted = detach::detach_logging(self.cluster.as_ref(), self.events.as_ref()).await?;
        if deleted {
            Ok(StepOutcome::completed())
        } else {
            Ok(self.skip(TeardownStep::DetachLogging, "no logging operator installed"))
        }
    }

    /// Pods go before their claims so nothing republishes a volume while
    /// the claim deletion is in flight
    async fn delete_pods_step(&self, targets: &TeardownTargets) -> Result<StepOutcome> {
        info!("deleting {} pod(s) bound to operator storage", targets.pods.len());
        let failures = self.delete_each(TeardownStep::DeletePods, &targets.pods).await;
        Ok(StepOutcome::from_failures(failures))
    }

    async fn delete_claims_step(&self, targets: &TeardownTargets) -> Result<StepOutcome> {
        info!("deleting {} claim(s)", targets.claims.len());
        let failures = self
            .delete_each(TeardownStep::DeleteClaims, &targets.claims)
            .await;
        Ok(StepOutcome::from_failures(failures))
    }

    async fn local_storage_step(&self, targets: &mut TeardownTargets) -> Result<StepOutcome> {
        if !local_volume_present(self.cluster.as_ref()).await? {
            return Ok(self.skip(
                TeardownStep::TeardownLocalStorage,
                "no LocalVolume resources",
            ));
        }
        let outcome =
            teardown_local_storage(self.cluster.as_ref(), &self.config, self.events.as_ref())
                .await?;
        // the nested teardown already deleted its storage class
        if let Some(removed) = &outcome.removed_storage_class {
            targets.storage_classes.retain(|name| name != removed);
        }
        Ok(StepOutcome::from_failures(outcome.failures))
    }

    async fn delete_storage_cluster_step(&self) -> Result<StepOutcome> {
        info!("deleting storage cluster {}", STORAGE_CLUSTER_NAME);
        let target = ResourceRef::namespaced(
            ResourceKind::StorageCluster,
            STORAGE_CLUSTER_NAME,
            &self.config.namespace,
        );
        self.events.emit(TeardownEvent::Deleting {
            resource: target.clone(),
        });
        match self.cluster.delete(&target).await {
            Ok(()) => Ok(StepOutcome::completed()),
            Err(err) if err.is_not_found() => Ok(StepOutcome::completed()),
            Err(err) => Err(err),
        }
    }

    async fn clean_node_directories_step(&self) -> Result<StepOutcome> {
        info!("removing state directories from storage nodes");
        let nodes = labeled_node_names(self.cluster.as_ref(), OPERATOR_NODE_LABEL).await?;
        let commands = [format!("rm -rf {}", ROOK_STATE_DIR)];
        let mut failures = Vec::new();
        for node in &nodes {
            exec_on_node(
                self.cluster.as_ref(),
                self.events.as_ref(),
                TeardownStep::CleanNodeDirectories,
                node,
                &commands,
                &mut failures,
            )
            .await;
        }
        Ok(StepOutcome::from_failures(failures))
    }

    async fn delete_storage_classes_step(&self, targets: &TeardownTargets) -> Result<StepOutcome> {
        info!(
            "deleting {} operator storage class(es)",
            targets.storage_classes.len()
        );
        let refs: Vec<ResourceRef> = targets
            .storage_classes
            .iter()
            .map(|name| ResourceRef::cluster(ResourceKind::StorageClass, name))
            .collect();
        let failures = self
            .delete_each(TeardownStep::DeleteStorageClasses, &refs)
            .await;
        Ok(StepOutcome::from_failures(failures))
    }

    async fn unlabel_nodes_step(&self) -> Result<StepOutcome> {
        info!("removing operator labels from all nodes");
        let nodes = all_node_names(self.cluster.as_ref()).await?;
        let removals = [
            format!("{}-", OPERATOR_NODE_LABEL),
            format!("{}-", TOPOLOGY_ROOK_LABEL),
        ];
        let mut failures = Vec::new();
        for node in &nodes {
            let target = ResourceRef::cluster(ResourceKind::Node, node);
            for removal in &removals {
                match self.cluster.add_label(&target, removal).await {
                    Ok(()) => {}
                    Err(err) if err.is_not_found() => {}
                    Err(err) => {
                        self.record_failure(
                            &mut failures,
                            TeardownStep::UnlabelNodes,
                            target.to_string(),
                            err.to_string(),
                        );
                    }
                }
            }
        }
        Ok(StepOutcome::from_failures(failures))
    }

    /// Every CRD gets its own delete and bounded wait; a stuck finalizer on
    /// one never blocks the attempt on the others
    async fn delete_crds_step(&self) -> Result<StepOutcome> {
        info!("deleting operator CRDs");
        let mut failures = Vec::new();
        for crd in OCS_CRDS {
            let target = ResourceRef::cluster(ResourceKind::CustomResourceDefinition, crd);
            self.events.emit(TeardownEvent::Deleting {
                resource: target.clone(),
            });
            match self.cluster.delete(&target).await {
                Ok(()) => {}
                Err(err) if err.is_not_found() => continue,
                Err(err) => {
                    self.record_failure(
                        &mut failures,
                        TeardownStep::DeleteCrds,
                        target.to_string(),
                        err.to_string(),
                    );
                    continue;
                }
            }
            if let Err(err) = self
                .cluster
                .wait_for_delete(&target, self.config.crd_timeout)
                .await
            {
                self.record_failure(
                    &mut failures,
                    TeardownStep::DeleteCrds,
                    target.to_string(),
                    err.to_string(),
                );
            }
        }
        Ok(StepOutcome::from_failures(failures))
    }

    async fn delete_namespace_step(&self) -> Result<StepOutcome> {
        info!("deleting namespace {}", self.config.namespace);
        let target = ResourceRef::cluster(ResourceKind::Namespace, &self.config.namespace);
        self.events.emit(TeardownEvent::Deleting {
            resource: target.clone(),
        });
        match self.cluster.delete_namespace(&self.config.namespace).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => return Ok(StepOutcome::completed()),
            Err(err) => return Err(err),
        }
        self.cluster
            .wait_for_delete(&target, self.config.namespace_timeout)
            .await?;
        Ok(StepOutcome::completed())
    }
}

/// Run a full teardown with the default log-backed event sink
pub async fn uninstall(cluster: ClusterRef, config: TeardownConfig) -> Result<TeardownReport> {
    Uninstaller::new(cluster, config).uninstall().await
}

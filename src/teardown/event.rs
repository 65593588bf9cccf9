//! Teardown audit events
//!
//! Destructive intent and failures are announced through an injected sink
//! so callers can capture the stream; the default sink writes to the log.

use crate::cluster::ResourceRef;
use crate::teardown::report::{StepStatus, TeardownStep};
use tracing::{info, warn};

/// Events emitted over the course of a teardown run
#[derive(Debug, Clone, PartialEq)]
pub enum TeardownEvent {
    /// A step is about to run
    StepStarted { step: TeardownStep },
    /// A step finished with the given status
    StepCompleted { step: TeardownStep, status: StepStatus },
    /// A step was skipped entirely
    StepSkipped { step: TeardownStep, reason: String },
    /// Discovery summary
    Discovered {
        storage_classes: usize,
        claims: usize,
        pods: usize,
    },
    /// A resource is about to be deleted
    Deleting { resource: ResourceRef },
    /// A resource is about to be patched
    Patching { resource: ResourceRef },
    /// A shell command is about to run on a node
    NodeCommand { node: String, command: String },
    /// One item inside a step failed; the step keeps going
    ItemFailed {
        step: TeardownStep,
        target: String,
        reason: String,
    },
}

/// Observer for teardown events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: TeardownEvent);
}

/// Default sink that forwards events to the tracing log
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: TeardownEvent) {
        match event {
            TeardownEvent::StepStarted { step } => info!("step {}: starting", step),
            TeardownEvent::StepCompleted { step, status } => {
                info!("step {}: {}", step, status)
            }
            TeardownEvent::StepSkipped { step, reason } => {
                info!("step {}: skipped ({})", step, reason)
            }
            TeardownEvent::Discovered {
                storage_classes,
                claims,
                pods,
            } => info!(
                "discovered {} storage classes, {} claims, {} pods",
                storage_classes, claims, pods
            ),
            TeardownEvent::Deleting { resource } => info!("deleting {}", resource),
            TeardownEvent::Patching { resource } => info!("patching {}", resource),
            TeardownEvent::NodeCommand { node, command } => {
                info!("node {}: running `{}`", node, command)
            }
            TeardownEvent::ItemFailed { step, target, reason } => {
                warn!("step {}: {} failed: {}", step, target, reason)
            }
        }
    }
}

/// Test sink that stores every event in order
#[cfg(test)]
#[derive(Default)]
pub struct RecordingSink {
    events: parking_lot::Mutex<Vec<TeardownEvent>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TeardownEvent> {
        self.events.lock().clone()
    }
}

#[cfg(test)]
impl EventSink for RecordingSink {
    fn emit(&self, event: TeardownEvent) {
        self.events.lock().push(event);
    }
}

//! Teardown configuration

use crate::constants::STORAGE_NAMESPACE;
use std::time::Duration;

// =============================================================================
// Platform
// =============================================================================

/// Platform the cluster is deployed on.
///
/// Only AWS and vSphere have a defined registry-detachment procedure; every
/// other platform takes the no-op branch there.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Platform {
    Aws,
    Vsphere,
    Other(String),
}

impl Platform {
    /// Parse a platform name, case-insensitively. Unrecognized names are
    /// carried through as [`Platform::Other`].
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "aws" => Platform::Aws,
            "vsphere" => Platform::Vsphere,
            other => Platform::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Aws => write!(f, "aws"),
            Platform::Vsphere => write!(f, "vsphere"),
            Platform::Other(name) => write!(f, "{}", name),
        }
    }
}

// =============================================================================
// Teardown Configuration
// =============================================================================

/// Configuration for a teardown run
#[derive(Debug, Clone)]
pub struct TeardownConfig {
    /// Platform the cluster runs on; selects the registry-detachment branch
    pub platform: Platform,
    /// Namespace the storage operator is deployed in
    pub namespace: String,
    /// Wait bound applied to each CRD deletion
    pub crd_timeout: Duration,
    /// Wait bound applied to the final namespace deletion
    pub namespace_timeout: Duration,
}

impl Default for TeardownConfig {
    fn default() -> Self {
        Self {
            platform: Platform::Other("unknown".to_string()),
            namespace: STORAGE_NAMESPACE.to_string(),
            crd_timeout: Duration::from_secs(300 * 60),
            namespace_timeout: Duration::from_secs(300),
        }
    }
}

impl TeardownConfig {
    /// Default configuration for the given platform
    pub fn for_platform(platform: Platform) -> Self {
        Self {
            platform,
            ..Self::default()
        }
    }
}

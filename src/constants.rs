//! Fixed identities of the storage deployment
//!
//! Namespaces, resource names, labels, and node paths that the teardown
//! operates on. These mirror what the operator creates at install time.

// =============================================================================
// Namespaces
// =============================================================================

/// Namespace the storage operator is deployed in.
pub const STORAGE_NAMESPACE: &str = "openshift-storage";

/// Namespace of the cluster monitoring stack.
pub const MONITORING_NAMESPACE: &str = "openshift-monitoring";

/// Namespace of the image registry.
pub const IMAGE_REGISTRY_NAMESPACE: &str = "openshift-image-registry";

/// Namespace of the cluster logging operator.
pub const LOGGING_NAMESPACE: &str = "openshift-logging";

/// Namespace holding LocalVolume resources.
pub const LOCAL_STORAGE_NAMESPACE: &str = "local-storage";

// =============================================================================
// Provisioners & Claims
// =============================================================================

/// CSI provisioners owned by the storage operator. Storage classes with any
/// other provisioner are left untouched.
pub const OCS_PROVISIONERS: [&str; 3] = [
    "openshift-storage.rbd.csi.ceph.com",
    "openshift-storage.cephfs.csi.ceph.com",
    "openshift-storage.noobaa.io/obc",
];

/// Claims whose name contains this substring belong to the object storage
/// subsystem and are cleaned up by its own operator, not here.
pub const RESERVED_CLAIM_SUBSTRING: &str = "noobaa";

// =============================================================================
// Resource Names
// =============================================================================

/// Fixed name of the StorageCluster singleton.
pub const STORAGE_CLUSTER_NAME: &str = "ocs-storagecluster";

/// Config map wiring persistent storage into the monitoring stack.
pub const MONITORING_CONFIG_MAP: &str = "cluster-monitoring-config";

/// Cluster-scoped image registry configuration object.
pub const IMAGE_REGISTRY_CONFIG_NAME: &str = "cluster";

/// Fixed name of the ClusterLogging singleton.
pub const CLUSTER_LOGGING_INSTANCE: &str = "instance";

// =============================================================================
// Labels
// =============================================================================

/// Label marking nodes that carry storage daemons.
pub const OPERATOR_NODE_LABEL: &str = "cluster.ocs.openshift.io/openshift-storage";

/// Rack topology label applied by the operator.
pub const TOPOLOGY_ROOK_LABEL: &str = "topology.rook.io/rack";

/// Label on a storage class naming the LocalVolume that owns it.
pub const LOCAL_VOLUME_OWNER_LABEL: &str = "local.storage.openshift.io/owner-name";

/// Label selector prefix matching PVs provisioned for a LocalVolume.
pub const LOCAL_VOLUME_PV_SELECTOR: &str = "storage.openshift.com/local-volume-owner-name";

// =============================================================================
// Node Paths
// =============================================================================

/// On-disk state directory the storage daemons leave behind on each node.
pub const ROOK_STATE_DIR: &str = "/var/lib/rook";

/// Mount directory root used by local-volume storage classes.
pub const LOCAL_STORAGE_MOUNT_DIR: &str = "/mnt/local-storage";

// =============================================================================
// Custom Resource Definitions
// =============================================================================

/// CRDs installed by the operator, deleted after all instances are gone.
pub const OCS_CRDS: [&str; 12] = [
    "backingstores.noobaa.io",
    "bucketclasses.noobaa.io",
    "cephblockpools.ceph.rook.io",
    "cephfilesystems.ceph.rook.io",
    "cephnfses.ceph.rook.io",
    "cephobjectstores.ceph.rook.io",
    "cephobjectstoreusers.ceph.rook.io",
    "noobaas.noobaa.io",
    "ocsinitializations.ocs.openshift.io",
    "storageclusterinitializations.ocs.openshift.io",
    "storageclusters.ocs.openshift.io",
    "cephclusters.ceph.rook.io",
];

//! Shard context and namespace metadata seams.

use std::time::SystemTime;

use crate::error::ServiceError;

/// The slice of the shard context the transfer executor needs.
pub trait ShardContext: Send + Sync {
    fn shard_id(&self) -> u32;

    /// This shard's estimate of the named cluster's clock.
    ///
    /// Standby ladders measure task age against the active cluster's time
    /// rather than the local wall clock, so replication lag does not count
    /// against a task.
    fn current_time(&self, cluster_name: &str) -> SystemTime;
}

/// Namespace metadata lookup.
///
/// Only global namespaces replicate across clusters and carry meaningful
/// failover versions. Tasks of local namespaces skip version verification.
pub trait NamespaceRegistry: Send + Sync {
    fn is_global_namespace(&self, namespace_id: &str) -> Result<bool, ServiceError>;
}

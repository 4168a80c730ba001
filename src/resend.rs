//! Replication resender seams.
//!
//! When a transfer task outlives the resend threshold and its triggering
//! event still hasn't replicated, the executor asks the active cluster to
//! re-send the workflow's history. Two models exist side by side: the
//! current one addresses history by `(event id, version)` pairs, the legacy
//! one only by event id.

use async_trait::async_trait;

use crate::error::ServiceError;

/// Resender for version-tracked histories (current replication model).
#[async_trait]
pub trait NdcHistoryResender: Send + Sync {
    /// Ask the active cluster to re-send one workflow run's history,
    /// starting after `(last_event_id, last_event_version)`. Zero end
    /// coordinates mean "up to the current tail".
    #[allow(clippy::too_many_arguments)]
    async fn send_single_workflow_history(
        &self,
        namespace_id: &str,
        workflow_id: &str,
        run_id: &str,
        last_event_id: i64,
        last_event_version: i64,
        end_event_id: i64,
        end_event_version: i64,
    ) -> Result<(), ServiceError>;
}

/// Resender for histories that predate version tracking (legacy model).
#[async_trait]
pub trait HistoryRereplicator: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn send_multi_workflow_history(
        &self,
        namespace_id: &str,
        workflow_id: &str,
        run_id: &str,
        begin_event_id: i64,
        end_run_id: &str,
        end_event_id: i64,
    ) -> Result<(), ServiceError>;
}

//! Visibility sink seam.
//!
//! Visibility is the secondary index behind workflow search and listing.
//! A standby cluster maintains its own visibility store, so started, closed
//! and search-attribute records are side effects the standby owes locally
//! even though the active cluster originated the events.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::state::{Memo, SearchAttributes, WorkflowStatus};

/// Open-workflow record, written at start and rewritten on upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowStartedRecord {
    pub namespace_id: String,
    pub workflow_id: String,
    pub run_id: String,
    pub workflow_type: String,
    pub start_time: SystemTime,
    /// Effective start: the raw start shifted by any first-task backoff.
    pub execution_time: SystemTime,
    pub run_timeout: Duration,
    pub task_id: i64,
    pub task_queue: String,
    pub memo: Memo,
    pub search_attributes: SearchAttributes,
}

/// Closed-workflow record.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowClosedRecord {
    pub namespace_id: String,
    pub workflow_id: String,
    pub run_id: String,
    pub workflow_type: String,
    pub start_time: SystemTime,
    pub execution_time: SystemTime,
    /// Timestamp of the completion event.
    pub close_time: SystemTime,
    pub status: WorkflowStatus,
    /// Number of events in the final history.
    pub history_length: i64,
    pub task_id: i64,
    pub task_queue: String,
    pub memo: Memo,
    pub search_attributes: SearchAttributes,
}

/// Client for the visibility store.
#[async_trait]
pub trait VisibilityClient: Send + Sync {
    async fn record_workflow_started(
        &self,
        record: WorkflowStartedRecord,
    ) -> Result<(), ServiceError>;

    async fn record_workflow_closed(
        &self,
        record: WorkflowClosedRecord,
    ) -> Result<(), ServiceError>;

    async fn upsert_workflow_execution(
        &self,
        record: WorkflowStartedRecord,
    ) -> Result<(), ServiceError>;
}

//! Matching-service client seam.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ServiceError;

/// Request to enqueue an activity task in matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddActivityTaskRequest {
    pub namespace_id: String,
    pub workflow_id: String,
    pub run_id: String,
    pub task_queue: String,
    pub schedule_id: i64,
    /// Already clamped to `MAX_TASK_TIMEOUT` by the caller.
    pub schedule_to_start_timeout: Duration,
}

/// Request to enqueue a decision task in matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddDecisionTaskRequest {
    pub namespace_id: String,
    pub workflow_id: String,
    pub run_id: String,
    pub task_queue: String,
    pub schedule_id: i64,
    /// Already clamped to `MAX_TASK_TIMEOUT` by the caller.
    pub schedule_to_start_timeout: Duration,
}

/// Client for the matching service.
///
/// Adds are idempotent from the caller's standpoint: matching dedupes on
/// (namespace, run, schedule id), so re-delivering a task it has already
/// seen is harmless.
#[async_trait]
pub trait MatchingClient: Send + Sync {
    async fn add_activity_task(&self, request: AddActivityTaskRequest) -> Result<(), ServiceError>;
    async fn add_decision_task(&self, request: AddDecisionTaskRequest) -> Result<(), ServiceError>;
}

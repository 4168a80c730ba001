//! Read-only view of a workflow's mutable-state projection.
//!
//! Mutable state is the in-memory projection of a workflow's event history
//! maintained by the history engine. The standby executor only ever reads
//! it: every lookup here answers the question "has the event this task was
//! generated from replicated to this cluster yet".

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use crate::error::ServiceError;

/// Workflow memo: opaque key/value payloads surfaced through visibility.
pub type Memo = HashMap<String, serde_json::Value>;

/// Indexed search attributes surfaced through visibility.
pub type SearchAttributes = HashMap<String, serde_json::Value>;

/// Close status of a workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WorkflowStatus {
    #[default]
    Running,
    Completed,
    Failed,
    Canceled,
    Terminated,
    ContinuedAsNew,
    TimedOut,
}

/// A single history event, reduced to the fields the transfer path reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub event_id: i64,
    pub version: i64,
    pub timestamp: SystemTime,
    /// Backoff before the first decision task. Set on start events of cron
    /// or retry-delayed workflows.
    pub first_task_backoff: Option<Duration>,
}

/// Pending-activity bookkeeping, keyed by the schedule event id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityState {
    pub version: i64,
    pub schedule_id: i64,
    /// `EMPTY_EVENT_ID` until the activity-started event arrives.
    pub started_id: i64,
    pub schedule_to_start_timeout: Duration,
}

/// Pending-decision bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionState {
    pub version: i64,
    pub schedule_id: i64,
    /// `EMPTY_EVENT_ID` until the decision-started event arrives.
    pub started_id: i64,
}

/// Pending request to cancel an external workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestCancelState {
    pub version: i64,
    pub initiated_id: i64,
}

/// Pending signal to an external workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalState {
    pub version: i64,
    pub initiated_id: i64,
}

/// Pending child workflow start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildExecutionState {
    pub version: i64,
    pub initiated_id: i64,
    /// `EMPTY_EVENT_ID` until the child-started event arrives.
    pub started_id: i64,
}

/// Fixed per-execution attributes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExecutionInfo {
    pub workflow_type: String,
    pub run_timeout: Duration,
    pub task_queue: String,
    pub memo: Memo,
    pub search_attributes: SearchAttributes,
    pub status: WorkflowStatus,
}

/// Last item of the current version history: the newest event this cluster
/// has accepted and the failover version it was written under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionHistoryItem {
    pub event_id: i64,
    pub version: i64,
}

/// In-memory projection of one workflow run's event history.
///
/// Implementations live in the history engine; this crate only reads them
/// while holding the workflow lease.
pub trait MutableState: Send + Sync {
    fn is_workflow_running(&self) -> bool;

    fn activity_state(&self, schedule_id: i64) -> Option<ActivityState>;
    fn decision_state(&self, schedule_id: i64) -> Option<DecisionState>;
    fn request_cancel_state(&self, initiated_id: i64) -> Option<RequestCancelState>;
    fn signal_state(&self, initiated_id: i64) -> Option<SignalState>;
    fn child_execution_state(&self, initiated_id: i64) -> Option<ChildExecutionState>;

    fn execution_info(&self) -> &ExecutionInfo;

    /// The workflow-started event. Errors if the projection is corrupted.
    fn start_event(&self) -> Result<HistoryEvent, ServiceError>;

    /// The completion event. Errors while the workflow is still running.
    fn completion_event(&self) -> Result<HistoryEvent, ServiceError>;

    /// Version of the most recent write to this projection.
    fn last_write_version(&self) -> Result<i64, ServiceError>;

    /// Version the workflow was started under.
    fn start_version(&self) -> Result<i64, ServiceError>;

    /// Id the next history event will take; `next_event_id() - 1` is the
    /// current history length.
    fn next_event_id(&self) -> i64;

    /// NDC resend cursor. `None` on legacy histories that predate version
    /// tracking; callers fall back to `next_event_id`.
    fn version_history_cursor(&self) -> Result<Option<VersionHistoryItem>, ServiceError>;
}

/// Effective start of execution: the raw start time shifted by the
/// first-task backoff when the start was delayed (cron schedule, retry
/// policy).
pub fn workflow_execution_time(start_event: &HistoryEvent) -> SystemTime {
    match start_event.first_task_backoff {
        Some(backoff) => start_event.timestamp + backoff,
        None => start_event.timestamp,
    }
}

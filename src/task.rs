//! Queue task model for the transfer queue.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Identifies one workflow run within a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowKey {
    pub namespace_id: String,
    pub workflow_id: String,
    pub run_id: String,
}

/// The side effect a transfer task implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferTaskKind {
    /// An activity was scheduled; offer it to matching.
    ActivityTask,
    /// A decision was scheduled; offer it to matching.
    DecisionTask,
    /// The workflow finished; record it into visibility.
    CloseExecution,
    /// The workflow asked to cancel an external workflow.
    CancelExecution,
    /// The workflow asked to signal an external workflow.
    SignalExecution,
    /// The workflow asked to start a child workflow.
    StartChildExecution,
    /// The workflow started; record it into visibility.
    RecordWorkflowStarted,
    /// The workflow was reset. Standby clusters never act on this.
    ResetWorkflow,
    /// Search attributes changed; sync them into visibility.
    UpsertSearchAttributes,
    /// Storage value written by a build newer than this one.
    Unknown(i32),
}

/// One transfer task row, immutable once read from the shard's queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferTask {
    pub namespace_id: String,
    pub workflow_id: String,
    pub run_id: String,
    /// Monotonic per shard.
    pub task_id: i64,
    pub kind: TransferTaskKind,
    /// Event id of the triggering event, when the kind has one.
    pub schedule_id: i64,
    /// Version of the event the task was generated from.
    pub version: i64,
    pub task_queue: String,
    /// When the task became visible to the queue processor. Task age is
    /// measured from here.
    pub visibility_timestamp: SystemTime,
}

impl TransferTask {
    pub fn workflow_key(&self) -> WorkflowKey {
        WorkflowKey {
            namespace_id: self.namespace_id.clone(),
            workflow_id: self.workflow_id.clone(),
            run_id: self.run_id.clone(),
        }
    }
}

/// Timer-queue payload. Drained by the timer executors; the transfer
/// executor rejects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerTask {
    pub namespace_id: String,
    pub workflow_id: String,
    pub run_id: String,
    pub task_id: i64,
    pub visibility_timestamp: SystemTime,
}

/// Payload handed to a queue-task executor.
///
/// A shard multiplexes several task families over the same processing
/// machinery; each executor takes the generic payload and rejects what
/// isn't addressed to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueueTask {
    Transfer(TransferTask),
    Timer(TimerTask),
}

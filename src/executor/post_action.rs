//! Post-action ladder: converts "predicate not yet satisfied" into timed
//! resend and discard decisions.
//!
//! The ladder measures task age against the active cluster's clock and
//! walks three rungs: below the resend delay the task simply retries,
//! between the two thresholds the executor acts (push to matching or fetch
//! history from the active cluster), and past the discard delay the task is
//! given up.

use std::time::{Duration, Instant};

use tracing::error;

use super::StandbyTransferTaskExecutor;
use crate::error::TaskError;
use crate::limits::{EMPTY_EVENT_ID, EMPTY_VERSION, END_EVENT_ID, MAX_TASK_TIMEOUT};
use crate::matching::{AddActivityTaskRequest, AddDecisionTaskRequest};
use crate::state::MutableState;
use crate::task::TransferTask;

/// What a predicate asks the executor to do once it has decided local
/// state is behind. Exactly one variant is produced per task family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostActionInfo {
    /// Activity scheduled but not started: offer it to matching.
    PushActivity { schedule_to_start_timeout: Duration },
    /// Decision scheduled but not started: offer it to matching.
    PushDecision {
        schedule_to_start_timeout: Duration,
        task_queue: String,
    },
    /// Local history is missing the triggering event: ask the active
    /// cluster to re-send.
    HistoryResend {
        /// NDC cursor. `EMPTY_EVENT_ID`/`EMPTY_VERSION` when the history
        /// predates version tracking.
        last_event_id: i64,
        last_event_version: i64,
        /// Legacy cursor, set when no NDC cursor is available.
        next_event_id: Option<i64>,
    },
}

/// Build the resend cursor for a workflow from its local projection.
pub(crate) fn history_resend_info(
    state: &dyn MutableState,
) -> Result<PostActionInfo, TaskError> {
    match state.version_history_cursor().map_err(TaskError::Service)? {
        Some(item) => Ok(PostActionInfo::HistoryResend {
            last_event_id: item.event_id,
            last_event_version: item.version,
            next_event_id: None,
        }),
        None => Ok(PostActionInfo::HistoryResend {
            last_event_id: EMPTY_EVENT_ID,
            last_event_version: EMPTY_VERSION,
            next_event_id: Some(state.next_event_id()),
        }),
    }
}

impl StandbyTransferTaskExecutor {
    /// Decide what happens to a task after its predicate ran.
    ///
    /// `None` means the predicate was satisfied (or intentionally skipped)
    /// and the task is done. Otherwise the ladder picks the next effect
    /// from the task's age.
    pub(super) async fn post_action(
        &self,
        task: &TransferTask,
        info: Option<PostActionInfo>,
    ) -> Result<(), TaskError> {
        let info = match info {
            Some(info) => info,
            None => return Ok(()),
        };

        let now = self.shard.current_time(&self.cluster_name);
        let resend_delay = self.config.resend_delay();
        let discard_delay = self.config.discard_delay();
        let age = now
            .duration_since(task.visibility_timestamp)
            .unwrap_or(Duration::ZERO);

        if age < resend_delay {
            // too fresh to bother the active cluster; the queue processor
            // will re-dispatch
            return Err(TaskError::Retry);
        }

        if age < discard_delay {
            return match info {
                PostActionInfo::PushActivity {
                    schedule_to_start_timeout,
                } => self.push_activity(task, schedule_to_start_timeout).await,
                PostActionInfo::PushDecision {
                    schedule_to_start_timeout,
                    task_queue,
                } => {
                    self.push_decision(task, schedule_to_start_timeout, task_queue)
                        .await
                }
                PostActionInfo::HistoryResend {
                    last_event_id,
                    last_event_version,
                    next_event_id,
                } => {
                    self.fetch_history_from_remote(
                        task,
                        last_event_id,
                        last_event_version,
                        next_event_id,
                    )
                    .await
                }
            };
        }

        match info {
            // Late pushes still go out when enabled: matching dedupes on
            // task identity, so the worst case is a duplicate offer.
            PostActionInfo::PushActivity {
                schedule_to_start_timeout,
            } if self.config.late_push_enabled() => {
                self.push_activity(task, schedule_to_start_timeout).await
            }
            PostActionInfo::PushDecision {
                schedule_to_start_timeout,
                task_queue,
            } if self.config.late_push_enabled() => {
                self.push_decision(task, schedule_to_start_timeout, task_queue)
                    .await
            }
            _ => {
                error!(
                    target: "replox::executor",
                    shard_id = self.shard.shard_id(),
                    namespace_id = %task.namespace_id,
                    workflow_id = %task.workflow_id,
                    run_id = %task.run_id,
                    task_id = task.task_id,
                    "Discarding standby transfer task pending for too long"
                );
                Err(TaskError::Discarded)
            }
        }
    }

    async fn push_activity(
        &self,
        task: &TransferTask,
        schedule_to_start_timeout: Duration,
    ) -> Result<(), TaskError> {
        let timeout = schedule_to_start_timeout.min(MAX_TASK_TIMEOUT);
        self.matching
            .add_activity_task(AddActivityTaskRequest {
                namespace_id: task.namespace_id.clone(),
                workflow_id: task.workflow_id.clone(),
                run_id: task.run_id.clone(),
                task_queue: task.task_queue.clone(),
                schedule_id: task.schedule_id,
                schedule_to_start_timeout: timeout,
            })
            .await
            .map_err(TaskError::Service)
    }

    async fn push_decision(
        &self,
        task: &TransferTask,
        schedule_to_start_timeout: Duration,
        task_queue: String,
    ) -> Result<(), TaskError> {
        let timeout = schedule_to_start_timeout.min(MAX_TASK_TIMEOUT);
        self.matching
            .add_decision_task(AddDecisionTaskRequest {
                namespace_id: task.namespace_id.clone(),
                workflow_id: task.workflow_id.clone(),
                run_id: task.run_id.clone(),
                task_queue,
                schedule_id: task.schedule_id,
                schedule_to_start_timeout: timeout,
            })
            .await
            .map_err(TaskError::Service)
    }

    /// Ask the active cluster to re-send the missing history range.
    ///
    /// Never reports success: even a completed fetch only means the events
    /// are on their way, so the task retries and its predicate re-runs
    /// against the replayed state on the next pass.
    pub(super) async fn fetch_history_from_remote(
        &self,
        task: &TransferTask,
        last_event_id: i64,
        last_event_version: i64,
        next_event_id: Option<i64>,
    ) -> Result<(), TaskError> {
        self.metrics.record_rereplication_request();
        let started_at = Instant::now();

        let outcome = if last_event_id != EMPTY_EVENT_ID && last_event_version != EMPTY_VERSION {
            self.ndc_resender
                .send_single_workflow_history(
                    &task.namespace_id,
                    &task.workflow_id,
                    &task.run_id,
                    last_event_id,
                    last_event_version,
                    0,
                    0,
                )
                .await
        } else if let Some(next_event_id) = next_event_id {
            // the end of the remote branch is unknown; request up to the tail
            self.rereplicator
                .send_multi_workflow_history(
                    &task.namespace_id,
                    &task.workflow_id,
                    &task.run_id,
                    next_event_id,
                    &task.run_id,
                    END_EVENT_ID,
                )
                .await
        } else {
            self.metrics.record_rereplication_latency(started_at.elapsed());
            return Err(TaskError::internal(
                "standby transfer task has empty history resend info",
            ));
        };

        self.metrics.record_rereplication_latency(started_at.elapsed());

        if let Err(err) = outcome {
            error!(
                target: "replox::executor",
                shard_id = self.shard.shard_id(),
                namespace_id = %task.namespace_id,
                workflow_id = %task.workflow_id,
                run_id = %task.run_id,
                source_cluster = %self.cluster_name,
                error = %err,
                "Error re-replicating history from remote"
            );
        }

        Err(TaskError::Retry)
    }
}

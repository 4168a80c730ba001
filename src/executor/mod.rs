//! Standby transfer-task executor.
//!
//! A standby cluster does not originate workflow events; it replays what
//! the active cluster replicated and performs only the side effects owed
//! locally: visibility records and matching enqueues. Each transfer task is
//! therefore processed defensively. The per-kind predicate checks whether
//! the triggering event has arrived in local mutable state; when it hasn't,
//! the post-action ladder decides between waiting, pulling the missing
//! history from the active cluster, and giving the task up.

mod post_action;

pub use post_action::PostActionInfo;

use std::sync::Arc;

use tracing::debug;

use crate::cache::WorkflowCache;
use crate::cluster::{NamespaceRegistry, ShardContext};
use crate::config::StandbyConfig;
use crate::error::TaskError;
use crate::limits::EMPTY_EVENT_ID;
use crate::matching::MatchingClient;
use crate::metrics::StandbyMetrics;
use crate::resend::{HistoryRereplicator, NdcHistoryResender};
use crate::state::{workflow_execution_time, MutableState};
use crate::task::{QueueTask, TransferTask, TransferTaskKind};
use crate::visibility::{VisibilityClient, WorkflowClosedRecord, WorkflowStartedRecord};

/// Predicate a transfer task runs against local mutable state, under the
/// workflow lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Predicate {
    ActivityPending,
    DecisionPending,
    WorkflowClosed,
    CancelRequested,
    SignalRequested,
    ChildWorkflowPending,
    WorkflowStarted,
    SearchAttributesChanged,
}

/// Per-kind standby behavior.
#[derive(Debug, Clone, Copy)]
struct KindHandler {
    predicate: Predicate,
    /// Close-execution still needs its visibility record after the
    /// workflow finished; every other kind stops at a closed workflow.
    process_if_closed: bool,
}

/// Executes transfer tasks on a standby cluster.
///
/// The queue processor calls [`execute`](Self::execute) for every task in
/// task-id order per workflow and interprets the returned [`TaskError`]
/// sentinels: `Retry` reschedules the task, `Discarded` acknowledges it.
pub struct StandbyTransferTaskExecutor {
    shard: Arc<dyn ShardContext>,
    cache: Arc<dyn WorkflowCache>,
    namespaces: Arc<dyn NamespaceRegistry>,
    matching: Arc<dyn MatchingClient>,
    visibility: Arc<dyn VisibilityClient>,
    rereplicator: Arc<dyn HistoryRereplicator>,
    ndc_resender: Arc<dyn NdcHistoryResender>,
    config: StandbyConfig,
    metrics: Arc<StandbyMetrics>,
    /// Name of the active cluster this standby follows. Used both for
    /// remote clock estimation and as the source of re-sent history.
    cluster_name: String,
}

impl StandbyTransferTaskExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        shard: Arc<dyn ShardContext>,
        cache: Arc<dyn WorkflowCache>,
        namespaces: Arc<dyn NamespaceRegistry>,
        matching: Arc<dyn MatchingClient>,
        visibility: Arc<dyn VisibilityClient>,
        rereplicator: Arc<dyn HistoryRereplicator>,
        ndc_resender: Arc<dyn NdcHistoryResender>,
        config: StandbyConfig,
        metrics: Arc<StandbyMetrics>,
        cluster_name: impl Into<String>,
    ) -> Self {
        Self {
            shard,
            cache,
            namespaces,
            matching,
            visibility,
            rereplicator,
            ndc_resender,
            config,
            metrics,
            cluster_name: cluster_name.into(),
        }
    }

    /// Execute one queue task.
    ///
    /// `should_process` is the queue processor's own verdict on whether the
    /// task is worth running (e.g. its namespace recently failed over).
    /// Close-execution tasks run regardless: the workflow close must be
    /// recorded into visibility.
    pub async fn execute(&self, task: &QueueTask, should_process: bool) -> Result<(), TaskError> {
        let transfer_task = match task {
            QueueTask::Transfer(task) => task,
            _ => return Err(TaskError::UnexpectedPayload),
        };

        if !should_process && transfer_task.kind != TransferTaskKind::CloseExecution {
            return Ok(());
        }

        let handler = match transfer_task.kind {
            TransferTaskKind::ActivityTask => KindHandler {
                predicate: Predicate::ActivityPending,
                process_if_closed: false,
            },
            TransferTaskKind::DecisionTask => KindHandler {
                predicate: Predicate::DecisionPending,
                process_if_closed: false,
            },
            TransferTaskKind::CloseExecution => KindHandler {
                predicate: Predicate::WorkflowClosed,
                process_if_closed: true,
            },
            TransferTaskKind::CancelExecution => KindHandler {
                predicate: Predicate::CancelRequested,
                process_if_closed: false,
            },
            TransferTaskKind::SignalExecution => KindHandler {
                predicate: Predicate::SignalRequested,
                process_if_closed: false,
            },
            TransferTaskKind::StartChildExecution => KindHandler {
                predicate: Predicate::ChildWorkflowPending,
                process_if_closed: false,
            },
            TransferTaskKind::RecordWorkflowStarted => KindHandler {
                predicate: Predicate::WorkflowStarted,
                process_if_closed: false,
            },
            TransferTaskKind::ResetWorkflow => {
                // resets are driven by the active cluster only
                return Ok(());
            }
            TransferTaskKind::UpsertSearchAttributes => KindHandler {
                predicate: Predicate::SearchAttributesChanged,
                process_if_closed: false,
            },
            TransferTaskKind::Unknown(kind) => return Err(TaskError::UnknownTaskKind(kind)),
        };

        self.process_transfer(transfer_task, handler).await
    }

    /// Common skeleton around every predicate: acquire the workflow lease,
    /// load mutable state, run the predicate under the lease, release, then
    /// run the post-action ladder.
    async fn process_transfer(
        &self,
        task: &TransferTask,
        handler: KindHandler,
    ) -> Result<(), TaskError> {
        let mut lease = self
            .cache
            .acquire_for_background(&task.workflow_key())
            .await
            .map_err(TaskError::Service)?;

        let mutable_state = match lease.context().load_mutable_state(task).await {
            Ok(Some(state)) => state,
            Ok(None) => {
                // workflow unknown locally; nothing to do until its history arrives
                lease.release(None);
                return Ok(());
            }
            Err(err) => {
                let err = TaskError::Service(err);
                lease.release(Some(&err));
                return Err(err);
            }
        };

        if !mutable_state.is_workflow_running() && !handler.process_if_closed {
            // workflow already finished, nothing left to transfer
            lease.release(None);
            return Ok(());
        }

        let outcome = self
            .run_predicate(handler.predicate, task, mutable_state.as_ref())
            .await;

        // Release before the post-action. On success and on the retry
        // sentinel the cached projection stays valid for the next attempt;
        // any other error evicts the entry.
        let post_action_info = match outcome {
            Ok(info) => {
                lease.release(None);
                info
            }
            Err(err) => {
                if err.is_retry() {
                    lease.release(None);
                } else {
                    lease.release(Some(&err));
                }
                return Err(err);
            }
        };

        self.post_action(task, post_action_info).await
    }

    async fn run_predicate(
        &self,
        predicate: Predicate,
        task: &TransferTask,
        state: &dyn MutableState,
    ) -> Result<Option<PostActionInfo>, TaskError> {
        match predicate {
            Predicate::ActivityPending => self.activity_pending(task, state),
            Predicate::DecisionPending => self.decision_pending(task, state),
            Predicate::WorkflowClosed => self.workflow_closed(task, state).await,
            Predicate::CancelRequested => self.cancel_requested(task, state),
            Predicate::SignalRequested => self.signal_requested(task, state),
            Predicate::ChildWorkflowPending => self.child_workflow_pending(task, state),
            Predicate::WorkflowStarted => {
                self.record_started_or_upsert(task, state, true).await
            }
            Predicate::SearchAttributesChanged => {
                self.record_started_or_upsert(task, state, false).await
            }
        }
    }

    fn activity_pending(
        &self,
        task: &TransferTask,
        state: &dyn MutableState,
    ) -> Result<Option<PostActionInfo>, TaskError> {
        let activity = match state.activity_state(task.schedule_id) {
            Some(activity) => activity,
            None => return Ok(None),
        };

        if !self.verify_task_version(task, activity.version)? {
            return Ok(None);
        }

        if activity.started_id == EMPTY_EVENT_ID {
            return Ok(Some(PostActionInfo::PushActivity {
                schedule_to_start_timeout: activity.schedule_to_start_timeout,
            }));
        }

        Ok(None)
    }

    fn decision_pending(
        &self,
        task: &TransferTask,
        state: &dyn MutableState,
    ) -> Result<Option<PostActionInfo>, TaskError> {
        let decision = match state.decision_state(task.schedule_id) {
            Some(decision) => decision,
            None => return Ok(None),
        };

        let decision_timeout = state
            .execution_info()
            .run_timeout
            .min(crate::limits::MAX_TASK_TIMEOUT);

        if !self.verify_task_version(task, decision.version)? {
            return Ok(None);
        }

        if decision.started_id == EMPTY_EVENT_ID {
            return Ok(Some(PostActionInfo::PushDecision {
                schedule_to_start_timeout: decision_timeout,
                task_queue: task.task_queue.clone(),
            }));
        }

        Ok(None)
    }

    async fn workflow_closed(
        &self,
        task: &TransferTask,
        state: &dyn MutableState,
    ) -> Result<Option<PostActionInfo>, TaskError> {
        if state.is_workflow_running() {
            // the close was undone by a reset; this task is stale
            return Ok(None);
        }

        let completion_event = state.completion_event().map_err(TaskError::Service)?;
        let close_time = completion_event.timestamp;

        let execution_info = state.execution_info();
        let workflow_type = execution_info.workflow_type.clone();
        let status = execution_info.status;
        let task_queue = execution_info.task_queue.clone();
        let memo = execution_info.memo.clone();
        let search_attributes = execution_info.search_attributes.clone();
        let history_length = state.next_event_id() - 1;

        let start_event = state.start_event().map_err(TaskError::Service)?;
        let start_time = start_event.timestamp;
        let execution_time = workflow_execution_time(&start_event);

        let last_write_version = state.last_write_version().map_err(TaskError::Service)?;
        if !self.verify_task_version(task, last_write_version)? {
            return Ok(None);
        }

        // Do not reply to the parent workflow: that notification is the
        // active cluster's to make.
        self.visibility
            .record_workflow_closed(WorkflowClosedRecord {
                namespace_id: task.namespace_id.clone(),
                workflow_id: task.workflow_id.clone(),
                run_id: task.run_id.clone(),
                workflow_type,
                start_time,
                execution_time,
                close_time,
                status,
                history_length,
                task_id: task.task_id,
                task_queue,
                memo,
                search_attributes,
            })
            .await
            .map_err(TaskError::Service)?;

        Ok(None)
    }

    fn cancel_requested(
        &self,
        task: &TransferTask,
        state: &dyn MutableState,
    ) -> Result<Option<PostActionInfo>, TaskError> {
        let cancel = match state.request_cancel_state(task.schedule_id) {
            Some(cancel) => cancel,
            None => return Ok(None),
        };

        if !self.verify_task_version(task, cancel.version)? {
            return Ok(None);
        }

        post_action::history_resend_info(state).map(Some)
    }

    fn signal_requested(
        &self,
        task: &TransferTask,
        state: &dyn MutableState,
    ) -> Result<Option<PostActionInfo>, TaskError> {
        let signal = match state.signal_state(task.schedule_id) {
            Some(signal) => signal,
            None => return Ok(None),
        };

        if !self.verify_task_version(task, signal.version)? {
            return Ok(None);
        }

        post_action::history_resend_info(state).map(Some)
    }

    fn child_workflow_pending(
        &self,
        task: &TransferTask,
        state: &dyn MutableState,
    ) -> Result<Option<PostActionInfo>, TaskError> {
        let child = match state.child_execution_state(task.schedule_id) {
            Some(child) => child,
            None => return Ok(None),
        };

        if !self.verify_task_version(task, child.version)? {
            return Ok(None);
        }

        if child.started_id != EMPTY_EVENT_ID {
            return Ok(None);
        }

        post_action::history_resend_info(state).map(Some)
    }

    /// Shared body of `RecordWorkflowStarted` and `UpsertSearchAttributes`.
    async fn record_started_or_upsert(
        &self,
        task: &TransferTask,
        state: &dyn MutableState,
        is_record_start: bool,
    ) -> Result<Option<PostActionInfo>, TaskError> {
        // Upsert skips version verification: it is a plain sync of mutable
        // state into visibility.
        if is_record_start {
            let start_version = state.start_version().map_err(TaskError::Service)?;
            if !self.verify_task_version(task, start_version)? {
                return Ok(None);
            }
        }

        let execution_info = state.execution_info();
        let workflow_type = execution_info.workflow_type.clone();
        let run_timeout = execution_info.run_timeout;
        let task_queue = execution_info.task_queue.clone();
        let memo = execution_info.memo.clone();
        let search_attributes = execution_info.search_attributes.clone();

        let start_event = state.start_event().map_err(TaskError::Service)?;
        let start_time = start_event.timestamp;
        let execution_time = workflow_execution_time(&start_event);

        let record = WorkflowStartedRecord {
            namespace_id: task.namespace_id.clone(),
            workflow_id: task.workflow_id.clone(),
            run_id: task.run_id.clone(),
            workflow_type,
            start_time,
            execution_time,
            run_timeout,
            task_id: task.task_id,
            task_queue,
            memo,
            search_attributes,
        };

        let result = if is_record_start {
            self.visibility.record_workflow_started(record).await
        } else {
            self.visibility.upsert_workflow_execution(record).await
        };
        result.map_err(TaskError::Service)?;

        Ok(None)
    }

    /// Compare the locally recorded event version against the version the
    /// task was generated from.
    ///
    /// Local (non-global) namespaces carry no failover versions and always
    /// pass. A mismatch means the task belongs to a history branch this
    /// cluster did not accept; the caller skips the task.
    fn verify_task_version(
        &self,
        task: &TransferTask,
        local_version: i64,
    ) -> Result<bool, TaskError> {
        if !self
            .namespaces
            .is_global_namespace(&task.namespace_id)
            .map_err(TaskError::Service)?
        {
            return Ok(true);
        }

        if local_version != task.version {
            debug!(
                target: "replox::executor",
                shard_id = self.shard.shard_id(),
                namespace_id = %task.namespace_id,
                workflow_id = %task.workflow_id,
                run_id = %task.run_id,
                task_id = task.task_id,
                local_version,
                task_version = task.version,
                "Transfer task version mismatch, skipping task"
            );
            return Ok(false);
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StandbyConfig;
    use crate::testing::StandbyHarness;
    use crate::task::TimerTask;
    use std::time::{Duration, SystemTime};

    fn transfer_task(kind: TransferTaskKind) -> QueueTask {
        QueueTask::Transfer(TransferTask {
            namespace_id: "ns".to_string(),
            workflow_id: "wf".to_string(),
            run_id: "run".to_string(),
            task_id: 7,
            kind,
            schedule_id: 5,
            version: 11,
            task_queue: "orders".to_string(),
            visibility_timestamp: SystemTime::UNIX_EPOCH,
        })
    }

    #[tokio::test]
    async fn timer_payload_is_rejected() {
        let harness = StandbyHarness::new(StandbyConfig::default());
        let task = QueueTask::Timer(TimerTask {
            namespace_id: "ns".to_string(),
            workflow_id: "wf".to_string(),
            run_id: "run".to_string(),
            task_id: 7,
            visibility_timestamp: SystemTime::UNIX_EPOCH,
        });
        let result = harness.executor.execute(&task, true).await;
        assert_eq!(result, Err(TaskError::UnexpectedPayload));
    }

    #[tokio::test]
    async fn unknown_kind_is_rejected_before_any_collaborator_call() {
        let harness = StandbyHarness::new(StandbyConfig::default());
        let task = transfer_task(TransferTaskKind::Unknown(9999));
        let result = harness.executor.execute(&task, true).await;
        assert_eq!(result, Err(TaskError::UnknownTaskKind(9999)));
        assert_eq!(harness.cache.releases.total(), 0);
    }

    #[tokio::test]
    async fn reset_workflow_is_a_no_op() {
        let harness = StandbyHarness::new(StandbyConfig::default());
        let task = transfer_task(TransferTaskKind::ResetWorkflow);
        assert_eq!(harness.executor.execute(&task, true).await, Ok(()));
        assert_eq!(harness.cache.releases.total(), 0);
    }

    #[tokio::test]
    async fn skipped_tasks_short_circuit_except_close_execution() {
        let harness = StandbyHarness::new(StandbyConfig::default());
        for kind in [
            TransferTaskKind::ActivityTask,
            TransferTaskKind::DecisionTask,
            TransferTaskKind::CancelExecution,
            TransferTaskKind::SignalExecution,
            TransferTaskKind::StartChildExecution,
            TransferTaskKind::RecordWorkflowStarted,
            TransferTaskKind::UpsertSearchAttributes,
        ] {
            assert_eq!(
                harness.executor.execute(&transfer_task(kind), false).await,
                Ok(())
            );
        }
        assert_eq!(harness.cache.releases.total(), 0);

        // close execution still acquires the workflow even when skipped
        let close = transfer_task(TransferTaskKind::CloseExecution);
        assert_eq!(harness.executor.execute(&close, false).await, Ok(()));
        assert_eq!(harness.cache.releases.total(), 1);
    }

    #[tokio::test]
    async fn version_mismatch_on_local_namespace_is_ignored() {
        let harness = StandbyHarness::new(StandbyConfig::fixed(
            Duration::from_secs(10),
            Duration::from_secs(300),
        ));
        harness.namespaces.set_global(false);
        harness.shard.set_time(SystemTime::UNIX_EPOCH + Duration::from_secs(60));

        let mut state = crate::testing::StubMutableState::running();
        state.activities.insert(
            5,
            crate::state::ActivityState {
                version: 99,
                schedule_id: 5,
                started_id: crate::limits::EMPTY_EVENT_ID,
                schedule_to_start_timeout: Duration::from_secs(30),
            },
        );
        harness.put_state("ns", "wf", "run", state);

        // local namespace: version 99 vs task version 11 is not a mismatch
        let task = transfer_task(TransferTaskKind::ActivityTask);
        assert_eq!(harness.executor.execute(&task, true).await, Ok(()));
        assert_eq!(harness.matching.activity_adds.lock().await.len(), 1);
    }
}

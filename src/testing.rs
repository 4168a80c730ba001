//! In-memory collaborator implementations.
//!
//! These mirror the production seams closely enough to drive the executor
//! end to end without a cluster: a fixed-clock shard, recording matching
//! and visibility clients, a recording resender, and a workflow cache with
//! release accounting. They back this crate's own tests and are public so
//! embedders can test their queue processors against the same behavior.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::sync::Mutex as TokioMutex;

use crate::cache::{WorkflowCache, WorkflowContext, WorkflowLease};
use crate::cluster::{NamespaceRegistry, ShardContext};
use crate::config::StandbyConfig;
use crate::error::ServiceError;
use crate::executor::StandbyTransferTaskExecutor;
use crate::limits::FIRST_EVENT_ID;
use crate::matching::{AddActivityTaskRequest, AddDecisionTaskRequest, MatchingClient};
use crate::metrics::StandbyMetrics;
use crate::resend::{HistoryRereplicator, NdcHistoryResender};
use crate::state::{
    ActivityState, ChildExecutionState, DecisionState, ExecutionInfo, HistoryEvent, MutableState,
    RequestCancelState, SignalState, VersionHistoryItem,
};
use crate::task::{TransferTask, WorkflowKey};
use crate::visibility::{VisibilityClient, WorkflowClosedRecord, WorkflowStartedRecord};

/// Shard with a fixed id and a controllable clock.
pub struct FakeShard {
    shard_id: u32,
    now: Mutex<SystemTime>,
}

impl FakeShard {
    pub fn new(shard_id: u32, now: SystemTime) -> Self {
        Self {
            shard_id,
            now: Mutex::new(now),
        }
    }

    pub fn set_time(&self, now: SystemTime) {
        *self.now.lock().unwrap() = now;
    }
}

impl ShardContext for FakeShard {
    fn shard_id(&self) -> u32 {
        self.shard_id
    }

    fn current_time(&self, _cluster_name: &str) -> SystemTime {
        *self.now.lock().unwrap()
    }
}

/// Registry where every namespace shares one global/local flag.
pub struct FakeNamespaceRegistry {
    global: AtomicBool,
}

impl FakeNamespaceRegistry {
    pub fn new(global: bool) -> Self {
        Self {
            global: AtomicBool::new(global),
        }
    }

    pub fn set_global(&self, global: bool) {
        self.global.store(global, Ordering::SeqCst);
    }
}

impl NamespaceRegistry for FakeNamespaceRegistry {
    fn is_global_namespace(&self, _namespace_id: &str) -> Result<bool, ServiceError> {
        Ok(self.global.load(Ordering::SeqCst))
    }
}

/// Records every task pushed to matching.
#[derive(Default)]
pub struct RecordingMatching {
    pub activity_adds: TokioMutex<Vec<AddActivityTaskRequest>>,
    pub decision_adds: TokioMutex<Vec<AddDecisionTaskRequest>>,
}

#[async_trait]
impl MatchingClient for RecordingMatching {
    async fn add_activity_task(&self, request: AddActivityTaskRequest) -> Result<(), ServiceError> {
        self.activity_adds.lock().await.push(request);
        Ok(())
    }

    async fn add_decision_task(&self, request: AddDecisionTaskRequest) -> Result<(), ServiceError> {
        self.decision_adds.lock().await.push(request);
        Ok(())
    }
}

/// Records every visibility write.
#[derive(Default)]
pub struct RecordingVisibility {
    pub started: TokioMutex<Vec<WorkflowStartedRecord>>,
    pub closed: TokioMutex<Vec<WorkflowClosedRecord>>,
    pub upserts: TokioMutex<Vec<WorkflowStartedRecord>>,
}

#[async_trait]
impl VisibilityClient for RecordingVisibility {
    async fn record_workflow_started(
        &self,
        record: WorkflowStartedRecord,
    ) -> Result<(), ServiceError> {
        self.started.lock().await.push(record);
        Ok(())
    }

    async fn record_workflow_closed(
        &self,
        record: WorkflowClosedRecord,
    ) -> Result<(), ServiceError> {
        self.closed.lock().await.push(record);
        Ok(())
    }

    async fn upsert_workflow_execution(
        &self,
        record: WorkflowStartedRecord,
    ) -> Result<(), ServiceError> {
        self.upserts.lock().await.push(record);
        Ok(())
    }
}

/// One recorded NDC resend request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdcResendRequest {
    pub namespace_id: String,
    pub workflow_id: String,
    pub run_id: String,
    pub last_event_id: i64,
    pub last_event_version: i64,
    pub end_event_id: i64,
    pub end_event_version: i64,
}

/// One recorded legacy resend request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyResendRequest {
    pub namespace_id: String,
    pub workflow_id: String,
    pub run_id: String,
    pub begin_event_id: i64,
    pub end_run_id: String,
    pub end_event_id: i64,
}

/// Records resend requests; optionally fails them after recording.
#[derive(Default)]
pub struct RecordingResender {
    pub ndc_requests: TokioMutex<Vec<NdcResendRequest>>,
    pub legacy_requests: TokioMutex<Vec<LegacyResendRequest>>,
    fail: TokioMutex<Option<ServiceError>>,
}

impl RecordingResender {
    /// Make every subsequent resend call fail with `err`.
    pub async fn fail_with(&self, err: ServiceError) {
        *self.fail.lock().await = Some(err);
    }
}

#[async_trait]
impl NdcHistoryResender for RecordingResender {
    async fn send_single_workflow_history(
        &self,
        namespace_id: &str,
        workflow_id: &str,
        run_id: &str,
        last_event_id: i64,
        last_event_version: i64,
        end_event_id: i64,
        end_event_version: i64,
    ) -> Result<(), ServiceError> {
        self.ndc_requests.lock().await.push(NdcResendRequest {
            namespace_id: namespace_id.to_string(),
            workflow_id: workflow_id.to_string(),
            run_id: run_id.to_string(),
            last_event_id,
            last_event_version,
            end_event_id,
            end_event_version,
        });
        match self.fail.lock().await.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl HistoryRereplicator for RecordingResender {
    async fn send_multi_workflow_history(
        &self,
        namespace_id: &str,
        workflow_id: &str,
        run_id: &str,
        begin_event_id: i64,
        end_run_id: &str,
        end_event_id: i64,
    ) -> Result<(), ServiceError> {
        self.legacy_requests.lock().await.push(LegacyResendRequest {
            namespace_id: namespace_id.to_string(),
            workflow_id: workflow_id.to_string(),
            run_id: run_id.to_string(),
            begin_event_id,
            end_run_id: end_run_id.to_string(),
            end_event_id,
        });
        match self.fail.lock().await.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Scripted mutable-state projection.
#[derive(Debug, Clone, Default)]
pub struct StubMutableState {
    pub running: bool,
    pub activities: HashMap<i64, ActivityState>,
    pub decisions: HashMap<i64, DecisionState>,
    pub request_cancels: HashMap<i64, RequestCancelState>,
    pub signals: HashMap<i64, SignalState>,
    pub child_executions: HashMap<i64, ChildExecutionState>,
    pub execution_info: ExecutionInfo,
    pub start_event: Option<HistoryEvent>,
    pub completion_event: Option<HistoryEvent>,
    pub last_write_version: i64,
    pub start_version: i64,
    pub next_event_id: i64,
    pub version_history: Option<VersionHistoryItem>,
}

impl StubMutableState {
    pub fn running() -> Self {
        Self {
            running: true,
            next_event_id: FIRST_EVENT_ID,
            ..Default::default()
        }
    }

    pub fn closed() -> Self {
        Self {
            running: false,
            next_event_id: FIRST_EVENT_ID,
            ..Default::default()
        }
    }
}

impl MutableState for StubMutableState {
    fn is_workflow_running(&self) -> bool {
        self.running
    }

    fn activity_state(&self, schedule_id: i64) -> Option<ActivityState> {
        self.activities.get(&schedule_id).cloned()
    }

    fn decision_state(&self, schedule_id: i64) -> Option<DecisionState> {
        self.decisions.get(&schedule_id).cloned()
    }

    fn request_cancel_state(&self, initiated_id: i64) -> Option<RequestCancelState> {
        self.request_cancels.get(&initiated_id).cloned()
    }

    fn signal_state(&self, initiated_id: i64) -> Option<SignalState> {
        self.signals.get(&initiated_id).cloned()
    }

    fn child_execution_state(&self, initiated_id: i64) -> Option<ChildExecutionState> {
        self.child_executions.get(&initiated_id).cloned()
    }

    fn execution_info(&self) -> &ExecutionInfo {
        &self.execution_info
    }

    fn start_event(&self) -> Result<HistoryEvent, ServiceError> {
        self.start_event
            .clone()
            .ok_or_else(|| ServiceError::permanent("start_event", "start event not found"))
    }

    fn completion_event(&self) -> Result<HistoryEvent, ServiceError> {
        self.completion_event
            .clone()
            .ok_or_else(|| ServiceError::permanent("completion_event", "completion event not found"))
    }

    fn last_write_version(&self) -> Result<i64, ServiceError> {
        Ok(self.last_write_version)
    }

    fn start_version(&self) -> Result<i64, ServiceError> {
        Ok(self.start_version)
    }

    fn next_event_id(&self) -> i64 {
        self.next_event_id
    }

    fn version_history_cursor(&self) -> Result<Option<VersionHistoryItem>, ServiceError> {
        Ok(self.version_history)
    }
}

/// Release accounting shared between the fake cache and tests.
#[derive(Debug, Default)]
pub struct ReleaseLog {
    /// Releases with no error (cached entry kept).
    pub clean: AtomicUsize,
    /// Releases carrying an error (cached entry evicted).
    pub errored: AtomicUsize,
}

impl ReleaseLog {
    pub fn total(&self) -> usize {
        self.clean.load(Ordering::SeqCst) + self.errored.load(Ordering::SeqCst)
    }
}

struct FakeWorkflowContext {
    state: Option<Arc<StubMutableState>>,
    load_error: Option<ServiceError>,
}

#[async_trait]
impl WorkflowContext for FakeWorkflowContext {
    async fn load_mutable_state(
        &self,
        _task: &TransferTask,
    ) -> Result<Option<Arc<dyn MutableState>>, ServiceError> {
        if let Some(err) = &self.load_error {
            return Err(err.clone());
        }
        Ok(self
            .state
            .clone()
            .map(|state| state as Arc<dyn MutableState>))
    }
}

/// Workflow cache over scripted projections, with release accounting.
#[derive(Default)]
pub struct FakeWorkflowCache {
    states: Mutex<HashMap<WorkflowKey, Arc<StubMutableState>>>,
    load_error: Mutex<Option<ServiceError>>,
    pub releases: Arc<ReleaseLog>,
}

impl FakeWorkflowCache {
    pub fn put(&self, key: WorkflowKey, state: StubMutableState) {
        self.states.lock().unwrap().insert(key, Arc::new(state));
    }

    /// Make every subsequent mutable-state load fail with `err`.
    pub fn fail_loads_with(&self, err: ServiceError) {
        *self.load_error.lock().unwrap() = Some(err);
    }
}

#[async_trait]
impl WorkflowCache for FakeWorkflowCache {
    async fn acquire_for_background(
        &self,
        key: &WorkflowKey,
    ) -> Result<WorkflowLease, ServiceError> {
        let state = self.states.lock().unwrap().get(key).cloned();
        let load_error = self.load_error.lock().unwrap().clone();
        let releases = self.releases.clone();
        Ok(WorkflowLease::new(
            Arc::new(FakeWorkflowContext { state, load_error }),
            Box::new(move |outcome| {
                match outcome {
                    None => releases.clean.fetch_add(1, Ordering::SeqCst),
                    Some(_) => releases.errored.fetch_add(1, Ordering::SeqCst),
                };
            }),
        ))
    }
}

/// A standby executor wired to fakes, plus handles to every fake.
pub struct StandbyHarness {
    pub shard: Arc<FakeShard>,
    pub cache: Arc<FakeWorkflowCache>,
    pub namespaces: Arc<FakeNamespaceRegistry>,
    pub matching: Arc<RecordingMatching>,
    pub visibility: Arc<RecordingVisibility>,
    pub resender: Arc<RecordingResender>,
    pub metrics: Arc<StandbyMetrics>,
    pub executor: StandbyTransferTaskExecutor,
}

impl StandbyHarness {
    /// The harness follows an active cluster named `"active"`, with the
    /// shard clock starting at the unix epoch.
    pub fn new(config: StandbyConfig) -> Self {
        let shard = Arc::new(FakeShard::new(1, SystemTime::UNIX_EPOCH));
        let cache = Arc::new(FakeWorkflowCache::default());
        let namespaces = Arc::new(FakeNamespaceRegistry::new(true));
        let matching = Arc::new(RecordingMatching::default());
        let visibility = Arc::new(RecordingVisibility::default());
        let resender = Arc::new(RecordingResender::default());
        let metrics = Arc::new(StandbyMetrics::default());
        let executor = StandbyTransferTaskExecutor::new(
            shard.clone(),
            cache.clone(),
            namespaces.clone(),
            matching.clone(),
            visibility.clone(),
            resender.clone(),
            resender.clone(),
            config,
            metrics.clone(),
            "active",
        );
        Self {
            shard,
            cache,
            namespaces,
            matching,
            visibility,
            resender,
            metrics,
            executor,
        }
    }

    pub fn put_state(
        &self,
        namespace_id: &str,
        workflow_id: &str,
        run_id: &str,
        state: StubMutableState,
    ) {
        self.cache.put(
            WorkflowKey {
                namespace_id: namespace_id.to_string(),
                workflow_id: workflow_id.to_string(),
                run_id: run_id.to_string(),
            },
            state,
        );
    }
}

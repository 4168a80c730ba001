//! Workflow-context cache seam and the lease release discipline.
//!
//! The cache hands out exclusive per-workflow contexts; acquisitions of the
//! same key serialize, so at most one executor call per workflow is in
//! flight at any instant. How a lease is released decides whether the
//! cached projection survives: a clean release keeps it warm for the next
//! task, a release carrying an error evicts it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ServiceError, TaskError};
use crate::state::MutableState;
use crate::task::{TransferTask, WorkflowKey};

/// Handle to a cached workflow, valid while the lease is held.
#[async_trait]
pub trait WorkflowContext: Send + Sync {
    /// Load the mutable-state projection this transfer task targets.
    ///
    /// `Ok(None)` means the workflow is unknown on this cluster: its
    /// history has not replicated yet, or it was already deleted.
    async fn load_mutable_state(
        &self,
        task: &TransferTask,
    ) -> Result<Option<Arc<dyn MutableState>>, ServiceError>;
}

/// Callback invoked exactly once when a lease ends. `None` keeps the cached
/// entry; `Some(err)` evicts it.
pub type ReleaseFn = Box<dyn FnOnce(Option<&TaskError>) + Send>;

/// Exclusive acquisition of one workflow's context.
///
/// Exactly one release happens per lease: the first `release` call wins and
/// later calls are no-ops. Dropping a lease that was never released counts
/// as releasing with an error, so an entry whose processing was abandoned
/// mid-way is evicted rather than reused.
pub struct WorkflowLease {
    context: Arc<dyn WorkflowContext>,
    release: Option<ReleaseFn>,
}

impl WorkflowLease {
    pub fn new(context: Arc<dyn WorkflowContext>, release: ReleaseFn) -> Self {
        Self {
            context,
            release: Some(release),
        }
    }

    pub fn context(&self) -> &Arc<dyn WorkflowContext> {
        &self.context
    }

    /// Finalize the lease. No-op if already released.
    pub fn release(&mut self, outcome: Option<&TaskError>) {
        if let Some(release) = self.release.take() {
            release(outcome);
        }
    }
}

impl Drop for WorkflowLease {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(Some(&TaskError::internal(
                "workflow lease dropped without release",
            )));
        }
    }
}

/// Cache handing out per-workflow contexts.
#[async_trait]
pub trait WorkflowCache: Send + Sync {
    /// Acquire in background mode (queue processors, not frontend calls).
    async fn acquire_for_background(
        &self,
        key: &WorkflowKey,
    ) -> Result<WorkflowLease, ServiceError>;
}

//! Error and control-signal types for standby task execution.

use std::fmt;

/// Collaborator error with retry classification.
///
/// The shard, workflow cache, matching, visibility and resender seams all
/// return this type. The queue processor uses `is_retryable()` to decide
/// whether to back off and re-dispatch the task.
///
/// **Retryable (retryable = true)**: persistence busy, connection timeouts,
/// remote cluster unreachable, temporary resource exhaustion.
///
/// **Non-retryable (retryable = false)**: corrupted projection (missing
/// start or completion event), invalid request, configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    /// Operation that failed (e.g. "load_mutable_state", "add_activity_task")
    pub operation: String,
    /// Human-readable error message
    pub message: String,
    /// Whether this error should be retried
    pub retryable: bool,
}

impl ServiceError {
    /// Create a retryable (transient) error.
    pub fn retryable(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
            retryable: true,
        }
    }

    /// Create a non-retryable (permanent) error.
    pub fn permanent(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
            retryable: false,
        }
    }

    /// Check if the error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.operation, self.message)
    }
}

impl std::error::Error for ServiceError {}

/// Outcome of one standby `execute` call.
///
/// The queue processor pattern-matches on the two sentinels: `Retry` means
/// "re-dispatch this task later", `Discarded` means "acknowledge it, the
/// standby gave up". Everything else is surfaced to the operator while the
/// task stays in the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Transient: the predicate is not yet satisfiable, reschedule the task.
    Retry,
    /// Terminal: the task was pending past the discard threshold.
    Discarded,
    /// The queue handed this executor a non-transfer payload.
    UnexpectedPayload,
    /// Storage carried a transfer task kind this build does not recognize.
    UnknownTaskKind(i32),
    /// Invariant violation inside the executor.
    Internal(String),
    /// Propagated collaborator failure.
    Service(ServiceError),
}

impl TaskError {
    /// Create an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        TaskError::Internal(message.into())
    }

    /// True for the retry sentinel only.
    pub fn is_retry(&self) -> bool {
        matches!(self, TaskError::Retry)
    }

    /// True for the discard sentinel only.
    pub fn is_discarded(&self) -> bool {
        matches!(self, TaskError::Discarded)
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::Retry => write!(f, "task retry"),
            TaskError::Discarded => write!(f, "task discarded"),
            TaskError::UnexpectedPayload => write!(f, "unexpected queue task payload"),
            TaskError::UnknownTaskKind(kind) => write!(f, "unknown transfer task kind {kind}"),
            TaskError::Internal(message) => write!(f, "internal: {message}"),
            TaskError::Service(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TaskError::Service(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ServiceError> for TaskError {
    fn from(err: ServiceError) -> Self {
        TaskError::Service(err)
    }
}

//! # Replox: standby-side transfer task execution
//!
//! A multi-cluster workflow deployment keeps one *active* cluster per
//! namespace and replicates its event histories asynchronously to one or
//! more *standby* clusters. Every cluster materializes the same per-workflow
//! event log and derives the same queue of transfer tasks from it: dispatch
//! an activity to matching, record a close into visibility, signal a peer.
//!
//! On the active cluster those tasks execute eagerly. On a standby they
//! cannot: the standby only observes events after replication, so a task
//! may arrive before the event that justifies it. This crate implements the
//! standby executor that processes transfer tasks defensively:
//!
//! - If the triggering event has replicated, perform the side effect the
//!   standby owes locally (visibility record, matching enqueue) and stop.
//! - If it hasn't, retry for a while ([`TaskError::Retry`]), then ask the
//!   active cluster to re-send the missing history, and eventually give
//!   the task up ([`TaskError::Discarded`]).
//!
//! The executor never originates events and never performs authoritative
//! work the active cluster already did (it does not reply to parent
//! workflows, and resets are ignored outright).
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::time::{Duration, SystemTime};
//! use replox::config::StandbyConfig;
//! use replox::testing::StandbyHarness;
//! use replox::{QueueTask, TransferTask, TransferTaskKind};
//!
//! # async fn example() -> Result<(), replox::TaskError> {
//! // Production wiring hands StandbyTransferTaskExecutor::new the real
//! // shard, cache, matching, visibility and resender implementations.
//! // The in-memory harness wires the same executor to fakes.
//! let harness = StandbyHarness::new(StandbyConfig::fixed(
//!     Duration::from_secs(10 * 60),
//!     Duration::from_secs(15 * 60),
//! ));
//!
//! let task = QueueTask::Transfer(TransferTask {
//!     namespace_id: "ns".to_string(),
//!     workflow_id: "order-1234".to_string(),
//!     run_id: "run-1".to_string(),
//!     task_id: 42,
//!     kind: TransferTaskKind::ActivityTask,
//!     schedule_id: 5,
//!     version: 11,
//!     task_queue: "orders".to_string(),
//!     visibility_timestamp: SystemTime::now(),
//! });
//!
//! harness.executor.execute(&task, true).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Key concepts
//!
//! - **Transfer task**: queued side-effecting action implied by a workflow
//!   event ([`TransferTask`]).
//! - **Mutable state**: the in-memory projection of a workflow's event
//!   history ([`state::MutableState`]); every predicate reads it under an
//!   exclusive per-workflow lease ([`cache::WorkflowLease`]).
//! - **Post-action ladder**: the retry / resend / discard decision driven
//!   by task age against the two configured thresholds
//!   ([`config::StandbyConfig`]).
//! - **Control sentinels**: [`TaskError::Retry`] and
//!   [`TaskError::Discarded`] are pattern-matched by the enclosing queue
//!   processor; they are signals, not failures.

pub mod cache;
pub mod cluster;
pub mod config;
pub mod error;
pub mod executor;
pub mod limits;
pub mod matching;
pub mod metrics;
pub mod resend;
pub mod state;
pub mod task;
pub mod testing;
pub mod visibility;

pub use error::{ServiceError, TaskError};
pub use executor::{PostActionInfo, StandbyTransferTaskExecutor};
pub use task::{QueueTask, TimerTask, TransferTask, TransferTaskKind, WorkflowKey};

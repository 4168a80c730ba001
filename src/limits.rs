//! Protocol constants shared across the replication path.
//!
//! Collect all event-id and version sentinels in one place so they're easy
//! to find, document, and reference from both executor code and test
//! fixtures. These values are part of the cross-cluster contract, not an
//! implementation detail.

use std::time::Duration;

/// Event id meaning "no event".
///
/// An activity or child workflow whose `started_id` equals this value has
/// been scheduled but not yet started.
pub const EMPTY_EVENT_ID: i64 = 0;

/// First event id of every workflow history.
pub const FIRST_EVENT_ID: i64 = 1;

/// Version meaning "no version recorded" (histories written before version
/// tracking, or namespaces that never fail over).
pub const EMPTY_VERSION: i64 = 0;

/// Upper bound used when requesting history replay and the end of the
/// branch is unknown.
pub const END_EVENT_ID: i64 = i64::MAX;

/// Cap applied to every schedule-to-start timeout handed to matching.
///
/// A single workflow configured with an absurd timeout must not be able to
/// park a task in the matching service forever.
pub const MAX_TASK_TIMEOUT: Duration = Duration::from_secs(366 * 24 * 60 * 60);

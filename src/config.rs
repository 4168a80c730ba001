//! Executor configuration.
//!
//! Thresholds are dynamic: operators can tighten or relax them on a live
//! cluster, so every value sits behind an accessor function that is read on
//! each task execution rather than cached across tasks.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Dynamically readable duration setting.
pub type DurationSetting = Arc<dyn Fn() -> Duration + Send + Sync>;

/// Dynamically readable boolean setting.
pub type BoolSetting = Arc<dyn Fn() -> bool + Send + Sync>;

/// Configuration consumed by the standby transfer-task executor.
#[derive(Clone)]
pub struct StandbyConfig {
    /// How long a task may wait for its events to replicate before the
    /// executor asks the active cluster to re-send history.
    pub standby_task_missing_events_resend_delay: DurationSetting,
    /// How long before a task whose events never arrived is abandoned.
    /// Must be at least the resend delay.
    pub standby_task_missing_events_discard_delay: DurationSetting,
    /// Whether activity and decision tasks past the discard threshold are
    /// still offered to matching. Matching dedupes on task identity, so the
    /// default keeps delivering; turning this off discards them instead.
    pub standby_task_late_push_enabled: BoolSetting,
}

impl StandbyConfig {
    /// Fixed-value configuration (tests, single-binary deployments).
    pub fn fixed(resend_delay: Duration, discard_delay: Duration) -> Self {
        Self {
            standby_task_missing_events_resend_delay: Arc::new(move || resend_delay),
            standby_task_missing_events_discard_delay: Arc::new(move || discard_delay),
            standby_task_late_push_enabled: Arc::new(|| true),
        }
    }

    pub fn resend_delay(&self) -> Duration {
        (self.standby_task_missing_events_resend_delay)()
    }

    pub fn discard_delay(&self) -> Duration {
        (self.standby_task_missing_events_discard_delay)()
    }

    pub fn late_push_enabled(&self) -> bool {
        (self.standby_task_late_push_enabled)()
    }
}

impl Default for StandbyConfig {
    fn default() -> Self {
        Self::fixed(
            Duration::from_secs(10 * 60),
            Duration::from_secs(15 * 60),
        )
    }
}

impl fmt::Debug for StandbyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandbyConfig")
            .field("resend_delay", &self.resend_delay())
            .field("discard_delay", &self.discard_delay())
            .field("late_push_enabled", &self.late_push_enabled())
            .finish()
    }
}

//! A single recurring task and its scheduling state.

use std::fmt;

use crate::delegate::TaskDelegate;

/// Guard divisor for tasks with a zero period.
const MIN_PERIOD: f64 = 1e-8;

/// Opaque, stable identifier for a task registered in a [`Scheduler`].
///
/// Handles are allocated from a monotonically increasing counter and never
/// reused, so a handle held past its task's removal can at worst name a task
/// that no longer exists; all scheduler operations tolerate that.
///
/// [`Scheduler`]: crate::Scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(pub(crate) i32);

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Scheduling state for one registered task.
///
/// The scheduler exclusively owns all tasks; external code only ever holds
/// [`TaskHandle`]s.
#[derive(Debug)]
pub(crate) struct Task {
    pub(crate) handle: TaskHandle,
    /// Target seconds between invocations. Zero means "run every eligible tick".
    pub(crate) period: f64,
    /// Eligible even before the period has elapsed, to fill unused budget.
    pub(crate) tick_as_often_as_possible: bool,
    pub(crate) paused: bool,
    /// Scheduler-relative timestamp of the last execution.
    pub(crate) last_invocation_time: f64,
    pub(crate) debug_name: Option<String>,
    pub(crate) delegate: TaskDelegate,
    overtime_seconds: f64,
    overtime_fraction: f64,
}

impl Task {
    pub(crate) fn new(
        handle: TaskHandle,
        delegate: TaskDelegate,
        period: f64,
        tick_as_often_as_possible: bool,
    ) -> Self {
        Self {
            handle,
            period,
            tick_as_often_as_possible,
            paused: false,
            // Register maximally overdue so the first eligible tick picks the
            // task up promptly instead of waiting out a full period.
            last_invocation_time: -period,
            debug_name: None,
            delegate,
            overtime_seconds: 0.0,
            overtime_fraction: 0.0,
        }
    }

    /// Next time this task wants to be invoked, in scheduler seconds.
    pub(crate) fn next_desired_invocation_time(&self) -> f64 {
        self.last_invocation_time + self.period
    }

    /// Refresh the cached overtime metrics. Skipped while paused, so a paused
    /// task's overtime freezes at its value from the pausing tick.
    pub(crate) fn recompute_overtime(&mut self, now: f64) {
        if self.paused {
            return;
        }
        self.overtime_seconds = now - self.next_desired_invocation_time();
        self.overtime_fraction = self.overtime_seconds / self.period.max(MIN_PERIOD);
    }

    /// Seconds past (negative: before) the desired next invocation.
    pub(crate) fn overtime_seconds(&self) -> f64 {
        self.overtime_seconds
    }

    /// Overtime as a fraction of the period (0.5 = 50% overtime).
    pub(crate) fn overtime_fraction(&self) -> f64 {
        self.overtime_fraction
    }

    /// Projected overtime fraction `frames_ahead` frames into the future,
    /// assuming frames keep taking `predicted_delta_time` seconds. Used only
    /// for sort tie-breaking; does not mutate state.
    pub(crate) fn predicted_overtime_fraction(
        &self,
        predicted_delta_time: f64,
        frames_ahead: u32,
    ) -> f64 {
        self.overtime_fraction
            + (predicted_delta_time / self.period.max(MIN_PERIOD)) * f64::from(frames_ahead)
    }

    /// Invoke the callback and stamp the invocation time. The caller checks
    /// eligibility beforehand.
    pub(crate) fn execute(&mut self, now: f64) {
        self.delegate.invoke();
        self.last_invocation_time = now;
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.delegate.is_alive()
    }

    pub(crate) fn display_name(&self) -> &str {
        self.debug_name.as_deref().unwrap_or("<unnamed>")
    }
}

//! Debug accounting for recent ticks.
//!
//! None of this feeds back into scheduling; it exists so a host can surface
//! whether the configured budget is balanced against the registered task
//! load (e.g. in an in-game debug overlay). The whole module sits behind the
//! `stats` cargo feature and can be compiled out without changing behavior.

use crate::ring::SampleRing;
use crate::task::TaskHandle;

/// How many recent ticks of accounting data are retained.
const STATS_WINDOW: usize = 60;

/// One executed task: which tick ran it and how long it waited since its
/// previous invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskExecutionRecord {
    pub tick: u64,
    pub handle: TaskHandle,
    pub wait_seconds: f64,
}

/// Per-tick overtime aggregates collected during the recompute pass.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct OvertimeAggregate {
    max_seconds: f64,
    sum_seconds: f64,
    max_fraction: f64,
    sum_fraction: f64,
}

impl OvertimeAggregate {
    pub(crate) fn record(&mut self, overtime_seconds: f64, overtime_fraction: f64, clamp: bool) {
        let seconds = if clamp {
            overtime_seconds.max(0.0)
        } else {
            overtime_seconds
        };
        let fraction = if clamp {
            overtime_fraction.max(0.0)
        } else {
            overtime_fraction
        };
        self.sum_seconds += seconds;
        self.max_seconds = self.max_seconds.max(seconds);
        self.sum_fraction += fraction;
        self.max_fraction = self.max_fraction.max(fraction);
    }
}

/// Rolling windows of scheduling metrics over the last [`STATS_WINDOW`] ticks.
#[derive(Debug)]
pub struct SchedulerStats {
    max_overtime_seconds: SampleRing<f64>,
    average_overtime_seconds: SampleRing<f64>,
    max_overtime_fraction: SampleRing<f64>,
    average_overtime_fraction: SampleRing<f64>,
    executed_per_tick: SampleRing<usize>,
    execution_history: SampleRing<TaskExecutionRecord>,
}

impl Default for SchedulerStats {
    fn default() -> Self {
        Self {
            max_overtime_seconds: SampleRing::new(STATS_WINDOW),
            average_overtime_seconds: SampleRing::new(STATS_WINDOW),
            max_overtime_fraction: SampleRing::new(STATS_WINDOW),
            average_overtime_fraction: SampleRing::new(STATS_WINDOW),
            executed_per_tick: SampleRing::new(STATS_WINDOW),
            execution_history: SampleRing::new(STATS_WINDOW),
        }
    }
}

impl SchedulerStats {
    pub(crate) fn record_overtime(&mut self, aggregate: &OvertimeAggregate, task_count: usize) {
        debug_assert!(task_count > 0);
        let task_count = task_count.max(1) as f64;
        self.max_overtime_seconds.push(aggregate.max_seconds);
        self.average_overtime_seconds
            .push(aggregate.sum_seconds / task_count);
        self.max_overtime_fraction.push(aggregate.max_fraction);
        self.average_overtime_fraction
            .push(aggregate.sum_fraction / task_count);
    }

    pub(crate) fn record_execution(&mut self, tick: u64, handle: TaskHandle, wait_seconds: f64) {
        self.execution_history.push(TaskExecutionRecord {
            tick,
            handle,
            wait_seconds,
        });
    }

    pub(crate) fn record_executed_count(&mut self, executed: usize) {
        self.executed_per_tick.push(executed);
    }

    /// Worst overtime seconds seen per tick.
    pub fn max_overtime_seconds(&self) -> &SampleRing<f64> {
        &self.max_overtime_seconds
    }

    /// Mean overtime seconds across tasks, per tick.
    pub fn average_overtime_seconds(&self) -> &SampleRing<f64> {
        &self.average_overtime_seconds
    }

    /// Worst overtime fraction seen per tick.
    pub fn max_overtime_fraction(&self) -> &SampleRing<f64> {
        &self.max_overtime_fraction
    }

    /// Mean overtime fraction across tasks, per tick.
    pub fn average_overtime_fraction(&self) -> &SampleRing<f64> {
        &self.average_overtime_fraction
    }

    /// How many tasks each recent tick actually executed.
    pub fn executed_per_tick(&self) -> &SampleRing<usize> {
        &self.executed_per_tick
    }

    /// Mean number of executions per tick over the window.
    pub fn average_executed_per_tick(&self) -> f64 {
        self.executed_per_tick.average()
    }

    /// Recent task executions, oldest first.
    pub fn recent_executions(&self) -> impl Iterator<Item = &TaskExecutionRecord> {
        self.execution_history.iter()
    }
}

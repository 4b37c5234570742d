//! The frame scheduler: registry, pending staging, and the tick algorithm.
//!
//! One [`Scheduler::tick`] call per frame does all the work: it folds staged
//! additions and removals into the active queue, refreshes every task's
//! overtime metrics, sorts the queue by overtime fraction (with a bounded
//! predictive lookahead to break ties), then executes due tasks up to the
//! configured per-tick budget.
//!
//! Mutations never happen mid-iteration. [`Scheduler::add_task`] and
//! [`Scheduler::remove_task`] only stage into pending buffers shared with
//! [`SchedulerRemote`], and those buffers are folded at a fixed point at the
//! start of the next tick. That is also what makes it safe for a task
//! callback to remove itself (or add new tasks) while the tick walk is in
//! progress.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, trace, warn};

use crate::config::SchedulerConfig;
use crate::delegate::TaskDelegate;
use crate::error::{Result, SchedulerError};
use crate::ring::SampleRing;
#[cfg(feature = "stats")]
use crate::stats::{OvertimeAggregate, SchedulerStats};
use crate::task::{Task, TaskHandle};

/// Two overtime fractions closer than this count as tied while sorting.
const OVERTIME_TIE_TOLERANCE: f64 = 1e-4;

/// Mutations staged for the next tick, shared between the scheduler and its
/// remotes via `Rc<RefCell<..>>` so callbacks can stage reentrantly.
struct PendingOps {
    next_task_id: i32,
    add: Vec<Task>,
    remove: Vec<TaskHandle>,
}

impl PendingOps {
    fn new() -> Self {
        Self {
            next_task_id: 0,
            add: Vec::new(),
            remove: Vec::new(),
        }
    }

    fn stage_add(
        &mut self,
        delegate: TaskDelegate,
        period: f64,
        tick_as_often_as_possible: bool,
        debug_name: Option<String>,
    ) -> TaskHandle {
        debug_assert!(period >= 0.0, "task period must be non-negative");
        let period = period.max(0.0);

        let handle = TaskHandle(self.next_task_id);
        // Simple incrementing counter without reuse. The system is not
        // designed for more than i32::MAX lifetime registrations, so running
        // out of handles is a fatal programming error.
        self.next_task_id = self
            .next_task_id
            .checked_add(1)
            .expect("task handle space exhausted");

        let mut task = Task::new(handle, delegate, period, tick_as_often_as_possible);
        task.debug_name = debug_name;
        self.add.push(task);
        handle
    }

    fn stage_remove(&mut self, handle: TaskHandle) {
        // A task added and removed within the same tick window never activates.
        self.add.retain(|task| task.handle != handle);
        if !self.remove.contains(&handle) {
            self.remove.push(handle);
        }
    }

    fn pending_task_mut(&mut self, handle: TaskHandle) -> Option<&mut Task> {
        self.add.iter_mut().find(|task| task.handle == handle)
    }
}

/// Cloneable staging handle for mutating the scheduler from task callbacks.
///
/// A remote can only stage: additions and removals registered through it take
/// effect at the start of the next tick, exactly like calls made on the
/// [`Scheduler`] itself. Callbacks capture a clone of the remote, which keeps
/// them from ever aliasing the scheduler's live state mid-tick.
#[derive(Clone)]
pub struct SchedulerRemote {
    ops: Rc<RefCell<PendingOps>>,
}

impl SchedulerRemote {
    /// Stage a task addition. See [`Scheduler::add_task`].
    pub fn add_task(
        &self,
        delegate: TaskDelegate,
        period: f64,
        tick_as_often_as_possible: bool,
    ) -> TaskHandle {
        self.ops
            .borrow_mut()
            .stage_add(delegate, period, tick_as_often_as_possible, None)
    }

    /// Stage a task addition with a debug name. See [`Scheduler::add_named_task`].
    pub fn add_named_task(
        &self,
        name: &str,
        delegate: TaskDelegate,
        period: f64,
        tick_as_often_as_possible: bool,
    ) -> TaskHandle {
        self.ops.borrow_mut().stage_add(
            delegate,
            period,
            tick_as_often_as_possible,
            Some(name.to_string()),
        )
    }

    /// Stage a task removal. Idempotent. See [`Scheduler::remove_task`].
    pub fn remove_task(&self, handle: TaskHandle) {
        self.ops.borrow_mut().stage_remove(handle);
    }
}

/// Spreads recurring task invocations over frames under a per-tick budget.
///
/// See the [crate docs](crate) for the overall model. The scheduler is
/// single-threaded; it provides no event loop of its own and expects the host
/// to call [`tick`](Scheduler::tick) exactly once per frame.
pub struct Scheduler {
    config: SchedulerConfig,
    ops: Rc<RefCell<PendingOps>>,
    /// Exclusive owner of all task state, keyed by handle.
    registry: HashMap<TaskHandle, Task>,
    /// Handles under scheduling consideration, re-sorted every tick. Kept
    /// separate from the registry so sorting moves handles, not tasks.
    active_queue: Vec<TaskHandle>,
    /// Recent tick delta times, averaged to predict near-future delta time
    /// for the sort lookahead.
    recent_delta_times: SampleRing<f64>,
    /// Scheduler-relative clock, advanced by accumulated delta time.
    now: f64,
    tick_counter: u64,
    #[cfg(feature = "stats")]
    stats: SchedulerStats,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Scheduler with the default configuration (budget of one task per tick).
    pub fn new() -> Self {
        Self::with_validated_config(SchedulerConfig::default())
    }

    /// Scheduler with a custom configuration.
    pub fn with_config(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_validated_config(config))
    }

    fn with_validated_config(config: SchedulerConfig) -> Self {
        Self {
            recent_delta_times: SampleRing::new(config.delta_time_window),
            config,
            ops: Rc::new(RefCell::new(PendingOps::new())),
            registry: HashMap::new(),
            active_queue: Vec::new(),
            now: 0.0,
            tick_counter: 0,
            #[cfg(feature = "stats")]
            stats: SchedulerStats::default(),
        }
    }

    /// A staging handle that task callbacks can capture to add or remove
    /// tasks reentrantly from inside a tick.
    pub fn remote(&self) -> SchedulerRemote {
        SchedulerRemote {
            ops: Rc::clone(&self.ops),
        }
    }

    /// Register a recurring task.
    ///
    /// `period` is the target seconds between invocations (zero: run every
    /// eligible tick). With `tick_as_often_as_possible` the task also fills
    /// unused budget before its period has elapsed.
    ///
    /// The task is staged and becomes active at the start of the next tick,
    /// registered as maximally overdue so it executes promptly. Never fails;
    /// exhausting the handle counter panics, as the scheduler is not designed
    /// for unbounded task churn.
    pub fn add_task(
        &mut self,
        delegate: TaskDelegate,
        period: f64,
        tick_as_often_as_possible: bool,
    ) -> TaskHandle {
        self.ops
            .borrow_mut()
            .stage_add(delegate, period, tick_as_often_as_possible, None)
    }

    /// [`add_task`](Self::add_task) with a recognizable name for debugging,
    /// used in warnings and the debug accounting.
    pub fn add_named_task(
        &mut self,
        name: &str,
        delegate: TaskDelegate,
        period: f64,
        tick_as_often_as_possible: bool,
    ) -> TaskHandle {
        self.ops.borrow_mut().stage_add(
            delegate,
            period,
            tick_as_often_as_possible,
            Some(name.to_string()),
        )
    }

    /// Stage a task removal, effective at the start of the next tick.
    ///
    /// Idempotent and safe on unknown or already-removed handles. A task
    /// added and removed within the same tick window never activates.
    pub fn remove_task(&mut self, handle: TaskHandle) {
        self.ops.borrow_mut().stage_remove(handle);
    }

    /// Give a task a recognizable name after registration.
    pub fn set_task_debug_name(&mut self, handle: TaskHandle, name: &str) -> Result<()> {
        if let Some(task) = self.registry.get_mut(&handle) {
            task.debug_name = Some(name.to_string());
            return Ok(());
        }
        if let Some(task) = self.ops.borrow_mut().pending_task_mut(handle) {
            task.debug_name = Some(name.to_string());
            return Ok(());
        }
        Err(SchedulerError::TaskNotFound(handle))
    }

    /// Whether the handle names a registered or pending task that is not
    /// staged for removal.
    pub fn task_exists(&self, handle: TaskHandle) -> bool {
        let ops = self.ops.borrow();
        if ops.remove.contains(&handle) {
            return false;
        }
        self.registry.contains_key(&handle) || ops.add.iter().any(|task| task.handle == handle)
    }

    /// Pause a task: it keeps its place in the registry but is skipped for
    /// both overtime computation and execution. No-op on unknown handles.
    ///
    /// The scheduler clock keeps running while a task is paused; after
    /// unpausing, the next tick sees the full elapsed gap as overtime.
    pub fn pause_task(&mut self, handle: TaskHandle) {
        self.set_task_paused(handle, true);
    }

    /// Resume a paused task. No-op on unknown handles.
    pub fn unpause_task(&mut self, handle: TaskHandle) {
        self.set_task_paused(handle, false);
    }

    /// Whether the task is currently paused. `false` for unknown handles.
    pub fn is_task_paused(&self, handle: TaskHandle) -> bool {
        if let Some(task) = self.registry.get(&handle) {
            return task.paused;
        }
        self.ops
            .borrow()
            .add
            .iter()
            .find(|task| task.handle == handle)
            .is_some_and(|task| task.paused)
    }

    fn set_task_paused(&mut self, handle: TaskHandle, paused: bool) {
        if let Some(task) = self.registry.get_mut(&handle) {
            task.paused = paused;
            return;
        }
        if let Some(task) = self.ops.borrow_mut().pending_task_mut(handle) {
            task.paused = paused;
        }
    }

    /// Current per-tick execution budget.
    pub fn max_tasks_per_tick(&self) -> usize {
        self.config.max_tasks_per_tick
    }

    /// Change the per-tick execution budget. Values below one are clamped.
    pub fn set_max_tasks_per_tick(&mut self, budget: usize) {
        self.config.max_tasks_per_tick = budget.max(1);
    }

    /// Number of ticks processed so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// Number of active (folded-in) tasks. Pending additions do not count
    /// until the next tick.
    pub fn active_task_count(&self) -> usize {
        self.registry.len()
    }

    /// Debug accounting for the recent ticks.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Advance the scheduler by one frame.
    ///
    /// Must be called exactly once per frame from one central place, with the
    /// frame's delta time in seconds. Executes at most
    /// `max_tasks_per_tick` due tasks, preferring those furthest past their
    /// desired invocation time relative to their period.
    pub fn tick(&mut self, delta_time: f64) {
        debug_assert!(delta_time >= 0.0, "delta_time must be non-negative");
        let delta_time = delta_time.max(0.0);

        self.tick_counter += 1;
        self.now += delta_time;
        self.recent_delta_times.push(delta_time);
        let predicted_delta_time = self.recent_delta_times.average();

        self.fold_pending();

        if self.active_queue.is_empty() {
            return;
        }

        #[cfg(feature = "stats")]
        let mut aggregate = OvertimeAggregate::default();
        for handle in &self.active_queue {
            let Some(task) = self.registry.get_mut(handle) else {
                continue;
            };
            task.recompute_overtime(self.now);
            #[cfg(feature = "stats")]
            aggregate.record(
                task.overtime_seconds(),
                task.overtime_fraction(),
                self.config.clamp_stats,
            );
        }
        #[cfg(feature = "stats")]
        self.stats
            .record_overtime(&aggregate, self.active_queue.len());

        self.sort_active_queue(predicted_delta_time);
        let executed = self.execute_due_tasks();

        #[cfg(feature = "stats")]
        self.stats.record_executed_count(executed);
        trace!(
            "tick {}: executed {}/{} active tasks",
            self.tick_counter,
            executed,
            self.active_queue.len()
        );
    }

    /// Fold staged removals and additions into the registry and active queue.
    /// Removals first, so a landed removal never shadows a later addition.
    fn fold_pending(&mut self) {
        let mut ops = self.ops.borrow_mut();
        for handle in ops.remove.drain(..) {
            if self.registry.remove(&handle).is_some() {
                self.active_queue.retain(|queued| *queued != handle);
                debug!("removed {handle}");
            }
        }
        for task in ops.add.drain(..) {
            let handle = task.handle;
            debug!("activated {handle} (period {:.3}s)", task.period);
            self.active_queue.push(handle);
            self.registry.insert(handle, task);
        }
    }

    /// Sort the active queue by descending overtime fraction.
    ///
    /// Near-equal fractions are re-compared using predicted overtime an
    /// increasing number of frames ahead, up to `lookahead_frames` steps per
    /// pair. A tie that survives the lookahead keeps the current order (the
    /// sort is stable), which makes equal-period, equal-phase tasks alternate
    /// across ticks as their invocation times drift apart.
    fn sort_active_queue(&mut self, predicted_delta_time: f64) {
        let registry = &self.registry;
        let lookahead_frames = self.config.lookahead_frames;
        self.active_queue.sort_by(|a, b| {
            let (Some(task_a), Some(task_b)) = (registry.get(a), registry.get(b)) else {
                return Ordering::Equal;
            };
            let mut overtime_a = task_a.overtime_fraction();
            let mut overtime_b = task_b.overtime_fraction();
            let mut frame = 1;
            while (overtime_a - overtime_b).abs() <= OVERTIME_TIE_TOLERANCE
                && frame <= lookahead_frames
            {
                overtime_a = task_a.predicted_overtime_fraction(predicted_delta_time, frame);
                overtime_b = task_b.predicted_overtime_fraction(predicted_delta_time, frame);
                frame += 1;
            }
            overtime_b.partial_cmp(&overtime_a).unwrap_or(Ordering::Equal)
        });
    }

    /// Walk the sorted queue and execute due tasks until the budget is spent.
    ///
    /// Tasks that are not due yet are passed over without consuming budget,
    /// so a not-yet-due task never blocks a due one sorted below it. Tasks
    /// whose callback target died are evicted on the spot with a warning.
    fn execute_due_tasks(&mut self) -> usize {
        let budget = self.config.max_tasks_per_tick;
        let mut executed = 0;
        let mut index = 0;
        while index < self.active_queue.len() && executed < budget {
            let handle = self.active_queue[index];
            let Some(task) = self.registry.get_mut(&handle) else {
                index += 1;
                continue;
            };

            if !task.is_alive() {
                warn!(
                    "{handle} ({}) was auto-removed: callback target no longer alive",
                    task.display_name()
                );
                self.active_queue.remove(index);
                self.registry.remove(&handle);
                continue;
            }

            if task.paused {
                index += 1;
                continue;
            }

            // Negative overtime means the task is not due yet. Unless it
            // wants to tick as often as possible we must not pick it
            // prematurely, no matter where it sorted.
            if !task.tick_as_often_as_possible && task.overtime_seconds() < 0.0 {
                index += 1;
                continue;
            }

            #[cfg(feature = "stats")]
            let previous_invocation = task.last_invocation_time;
            task.execute(self.now);
            executed += 1;
            #[cfg(feature = "stats")]
            self.stats.record_execution(
                self.tick_counter,
                handle,
                self.now - previous_invocation,
            );
            index += 1;
        }
        executed
    }
}

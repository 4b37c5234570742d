//! Scheduler behavior integration tests
//!
//! Exercises the public scheduling contract end to end: budget enforcement,
//! fairness, gap filling, stale-task eviction, and reentrant mutation from
//! inside task callbacks.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use framesched::{Scheduler, SchedulerConfig, TaskDelegate};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A counting callback plus the counter it increments.
fn counting_delegate() -> (TaskDelegate, Rc<Cell<u32>>) {
    let count = Rc::new(Cell::new(0));
    let counter = count.clone();
    let delegate = TaskDelegate::from_fn(move || counter.set(counter.get() + 1));
    (delegate, count)
}

/// A freshly added task executes on the very next tick.
#[test]
fn test_added_task_executes_on_next_tick() {
    let mut scheduler = Scheduler::new();
    let (delegate, count) = counting_delegate();
    scheduler.add_task(delegate, 1.0, true);
    scheduler.tick(3.0);
    assert_eq!(count.get(), 1);
}

/// A removed task is never invoked again.
#[test]
fn test_removed_task_stops_executing() {
    let mut scheduler = Scheduler::new();
    let (delegate, count) = counting_delegate();
    let handle = scheduler.add_task(delegate, 1.0, true);
    scheduler.tick(3.0);
    scheduler.remove_task(handle);
    scheduler.tick(3.0);
    scheduler.tick(3.0);
    assert_eq!(count.get(), 1);
}

/// Removing one task does not disturb the execution of the others.
#[test]
fn test_remove_does_not_disturb_other_tasks() {
    let mut scheduler = Scheduler::with_config(SchedulerConfig::new(2)).unwrap();
    let (delegate_a, count_a) = counting_delegate();
    let (delegate_b, count_b) = counting_delegate();
    let handle_a = scheduler.add_task(delegate_a, 1.0, true);
    scheduler.add_task(delegate_b, 5.0, true);

    scheduler.tick(3.0);
    scheduler.remove_task(handle_a);
    scheduler.tick(3.0);

    assert_eq!(count_a.get(), 1);
    assert_eq!(count_b.get(), 2);
}

/// `RemoveTask` is idempotent, including on handles that were never active.
#[test]
fn test_remove_is_idempotent_and_safe_on_unknown_handles() {
    // Handle counters are per scheduler, so take a later handle from another
    // instance to get one the scheduler under test has never seen.
    let mut other = Scheduler::new();
    let (foreign_delegate, _foreign_count) = counting_delegate();
    other.add_task(TaskDelegate::from_fn(|| {}), 1.0, true);
    other.add_task(TaskDelegate::from_fn(|| {}), 1.0, true);
    let foreign = other.add_task(foreign_delegate, 1.0, true);

    let mut scheduler = Scheduler::new();
    let (delegate, count) = counting_delegate();
    let handle = scheduler.add_task(delegate, 1.0, true);

    scheduler.remove_task(foreign);
    scheduler.tick(1.0);
    scheduler.remove_task(handle);
    scheduler.remove_task(handle);
    scheduler.tick(1.0);
    scheduler.remove_task(handle);
    scheduler.tick(1.0);

    assert_eq!(count.get(), 1);
    assert!(!scheduler.task_exists(handle));
}

/// An as-often-as-possible task runs even before its period has elapsed.
#[test]
fn test_tick_as_often_fills_idle_ticks() {
    let mut scheduler = Scheduler::new();
    let (delegate, count) = counting_delegate();
    scheduler.add_task(delegate, 4.0, true);
    scheduler.tick(1.0);
    scheduler.tick(1.0);
    scheduler.tick(1.0);
    assert_eq!(count.get(), 3);
}

/// A strict-period task is only eligible once its period has fully elapsed.
#[test]
fn test_strict_period_task_waits_for_period() {
    let mut scheduler = Scheduler::new();
    let (delegate, count) = counting_delegate();
    scheduler.add_task(delegate, 3.0, false);
    // First tick runs it promptly (registered maximally overdue), afterwards
    // it has to sit out the full period.
    scheduler.tick(1.0);
    scheduler.tick(1.0);
    assert_eq!(count.get(), 1);
    scheduler.tick(1.0);
    scheduler.tick(1.0);
    assert_eq!(count.get(), 2);
}

/// No tick ever executes more than `max_tasks_per_tick` callbacks.
#[test]
fn test_budget_bound_holds_every_tick() {
    init_logging();
    let mut scheduler = Scheduler::with_config(SchedulerConfig::new(3)).unwrap();
    let counters: Vec<Rc<Cell<u32>>> = (0..10)
        .map(|_| {
            let (delegate, count) = counting_delegate();
            scheduler.add_task(delegate, 0.0, true);
            count
        })
        .collect();

    let mut previous_total = 0;
    for _ in 0..20 {
        scheduler.tick(0.016);
        let total: u32 = counters.iter().map(|count| count.get()).sum();
        assert_eq!(total - previous_total, 3);
        previous_total = total;
    }
}

/// One due task, budget of one: exactly one execution.
#[test]
fn test_budget_of_one_executes_single_task() {
    let mut scheduler = Scheduler::new();
    let (delegate_a, count_a) = counting_delegate();
    let (delegate_b, count_b) = counting_delegate();
    scheduler.add_task(delegate_a, 1.0, true);
    scheduler.add_task(delegate_b, 1.0, true);
    scheduler.tick(3.0);
    assert_eq!(count_a.get() + count_b.get(), 1);
}

/// A task never executes twice within the same tick, even with spare budget.
#[test]
fn test_task_never_executes_twice_per_tick() {
    let mut scheduler = Scheduler::with_config(SchedulerConfig::new(2)).unwrap();
    let (delegate, count) = counting_delegate();
    scheduler.add_task(delegate, 1.0, true);
    scheduler.tick(3.0);
    assert_eq!(count.get(), 1);
}

/// A strict-period task with period P and constant delta d executes once
/// every ceil(P / d) ticks.
#[test]
fn test_fairness_of_strict_period_task() {
    let mut scheduler = Scheduler::new();
    let (delegate, count) = counting_delegate();
    scheduler.add_task(delegate, 1.0, false);

    for _ in 0..30 {
        scheduler.tick(0.4);
    }
    // ceil(1.0 / 0.4) = 3, so ticks 1, 4, 7, ..., 28.
    assert_eq!(count.get(), 10);
}

/// An as-often task with a long period fills the ticks a strict-period task
/// leaves idle, without starving it once it comes due (scenario: A period 10
/// as-often, B period 5 strict, budget 1).
#[test]
fn test_gap_filling_without_starvation() {
    let mut scheduler = Scheduler::new();
    let (delegate_a, count_a) = counting_delegate();
    let (delegate_b, count_b) = counting_delegate();
    scheduler.add_task(delegate_a, 10.0, true);
    scheduler.add_task(delegate_b, 5.0, false);

    // B has the larger overtime fraction (1/5 vs 1/10) and wins the first tick.
    scheduler.tick(1.0);
    assert_eq!(count_a.get(), 0);
    assert_eq!(count_b.get(), 1);

    // While B is not due, A fills every tick.
    for _ in 0..4 {
        scheduler.tick(1.0);
    }
    assert_eq!(count_a.get(), 4);
    assert_eq!(count_b.get(), 1);

    // B's period has elapsed again; it must win the next tick.
    scheduler.tick(1.0);
    assert_eq!(count_a.get(), 4);
    assert_eq!(count_b.get(), 2);
}

/// Two tasks with identical period and phase alternate in pairs; within each
/// pair the order is an implementation detail.
#[test]
fn test_equal_tasks_alternate_in_pairs() {
    let mut scheduler = Scheduler::new();
    let (delegate_a, count_a) = counting_delegate();
    let (delegate_b, count_b) = counting_delegate();
    scheduler.add_task(delegate_a, 4.0, true);
    scheduler.add_task(delegate_b, 4.0, true);

    scheduler.tick(1.0);
    scheduler.tick(1.0);
    assert_eq!(count_a.get(), 1);
    assert_eq!(count_b.get(), 1);
    scheduler.tick(1.0);
    scheduler.tick(1.0);
    assert_eq!(count_a.get(), 2);
    assert_eq!(count_b.get(), 2);
}

/// Zero-period tasks share the budget fairly at budget 1.
#[test]
fn test_zero_period_tasks_alternate_at_budget_one() {
    let mut scheduler = Scheduler::new();
    let (delegate_a, count_a) = counting_delegate();
    let (delegate_b, count_b) = counting_delegate();
    scheduler.add_task(delegate_a, 0.0, true);
    scheduler.add_task(delegate_b, 0.0, true);

    for _ in 0..4 {
        scheduler.tick(1.0);
    }
    assert_eq!(count_a.get(), 2);
    assert_eq!(count_b.get(), 2);
}

/// With enough budget, zero-period tasks execute exactly once per tick each.
#[test]
fn test_zero_period_tasks_execute_once_per_tick_with_budget() {
    let mut scheduler = Scheduler::with_config(SchedulerConfig::new(2)).unwrap();
    let (delegate_a, count_a) = counting_delegate();
    let (delegate_b, count_b) = counting_delegate();
    scheduler.add_task(delegate_a, 0.0, true);
    scheduler.add_task(delegate_b, 0.0, true);

    for tick in 1..=3u32 {
        scheduler.tick(0.016);
        assert_eq!(count_a.get(), tick);
        assert_eq!(count_b.get(), tick);
    }
}

/// A task whose weakly bound target died is evicted without disturbing the
/// remaining tasks.
#[test]
fn test_stale_task_is_auto_removed() {
    init_logging();
    let mut scheduler = Scheduler::with_config(SchedulerConfig::new(2)).unwrap();

    let target = Rc::new(RefCell::new(0u32));
    scheduler.add_named_task(
        "doomed",
        TaskDelegate::from_weak(&target, |ticks| *ticks += 1),
        1.0,
        true,
    );
    let (delegate, count) = counting_delegate();
    scheduler.add_task(delegate, 1.0, true);

    // Destroy the target before its first eligible tick.
    drop(target);

    scheduler.tick(1.0);
    assert_eq!(scheduler.active_task_count(), 1);
    assert_eq!(count.get(), 1);

    scheduler.tick(1.0);
    assert_eq!(count.get(), 2);
}

/// A dead task is never invoked, not even once.
#[test]
fn test_stale_task_is_never_invoked() {
    let alive = Rc::new(Cell::new(false));
    let probe = alive.clone();
    let count = Rc::new(Cell::new(0u32));
    let counter = count.clone();

    let mut scheduler = Scheduler::new();
    let delegate = TaskDelegate::from_fn_with_liveness(
        move || counter.set(counter.get() + 1),
        move || probe.get(),
    );
    let handle = scheduler.add_task(delegate, 1.0, true);

    scheduler.tick(1.0);
    scheduler.tick(1.0);
    assert_eq!(count.get(), 0);
    assert!(!scheduler.task_exists(handle));
}

/// A task removing itself from inside its own callback does not disturb the
/// tick in progress: no panic, no skipped or double-executed neighbors.
#[test]
fn test_task_can_remove_itself_from_callback() {
    let mut scheduler = Scheduler::with_config(SchedulerConfig::new(2)).unwrap();
    let remote = scheduler.remote();

    let own_handle = Rc::new(Cell::new(None));
    let self_count = Rc::new(Cell::new(0u32));
    let handle_slot = own_handle.clone();
    let counter = self_count.clone();
    let handle = scheduler.add_task(
        TaskDelegate::from_fn(move || {
            counter.set(counter.get() + 1);
            if let Some(own) = handle_slot.get() {
                remote.remove_task(own);
            }
        }),
        0.5,
        true,
    );
    own_handle.set(Some(handle));

    let (delegate, other_count) = counting_delegate();
    scheduler.add_task(delegate, 0.5, true);

    scheduler.tick(1.0);
    assert_eq!(self_count.get(), 1);
    assert_eq!(other_count.get(), 1);

    scheduler.tick(1.0);
    assert_eq!(self_count.get(), 1);
    assert_eq!(other_count.get(), 2);
    assert!(!scheduler.task_exists(handle));
}

/// A callback can register new tasks mid-tick; they activate on the next tick.
#[test]
fn test_task_can_add_tasks_from_callback() {
    let mut scheduler = Scheduler::with_config(SchedulerConfig::new(2)).unwrap();
    let remote = scheduler.remote();

    let child_count = Rc::new(Cell::new(0u32));
    let spawned = Cell::new(false);
    let counter = child_count.clone();
    scheduler.add_task(
        TaskDelegate::from_fn(move || {
            if !spawned.get() {
                spawned.set(true);
                let child_counter = counter.clone();
                remote.add_task(
                    TaskDelegate::from_fn(move || child_counter.set(child_counter.get() + 1)),
                    0.0,
                    true,
                );
            }
        }),
        0.0,
        true,
    );

    scheduler.tick(1.0);
    assert_eq!(child_count.get(), 0);
    scheduler.tick(1.0);
    assert_eq!(child_count.get(), 1);
    scheduler.tick(1.0);
    assert_eq!(child_count.get(), 2);
}

/// Paused tasks are passed over without consuming budget and resume cleanly.
#[test]
fn test_paused_task_yields_its_slot() {
    let mut scheduler = Scheduler::new();
    let (delegate_a, count_a) = counting_delegate();
    let (delegate_b, count_b) = counting_delegate();
    let handle_a = scheduler.add_task(delegate_a, 1.0, true);
    scheduler.add_task(delegate_b, 1.0, true);

    scheduler.pause_task(handle_a);
    assert!(scheduler.is_task_paused(handle_a));

    scheduler.tick(1.0);
    scheduler.tick(1.0);
    assert_eq!(count_a.get(), 0);
    assert_eq!(count_b.get(), 2);

    scheduler.unpause_task(handle_a);
    scheduler.tick(1.0);
    scheduler.tick(1.0);
    assert!(count_a.get() >= 1);
}

#[cfg(feature = "stats")]
#[test]
fn test_stats_track_recent_executions() {
    let mut scheduler = Scheduler::new();
    let (delegate, _count) = counting_delegate();
    let handle = scheduler.add_named_task("tracked", delegate, 0.0, true);

    for _ in 0..5 {
        scheduler.tick(0.1);
    }

    let stats = scheduler.stats();
    assert_eq!(stats.executed_per_tick().last(), Some(&1));
    assert_eq!(stats.average_executed_per_tick(), 1.0);
    assert_eq!(stats.recent_executions().count(), 5);
    assert!(stats.recent_executions().all(|record| record.handle == handle));
    assert!(stats.max_overtime_fraction().last().is_some());
}

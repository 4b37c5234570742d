//! Framesched - a frame-budgeted scheduler for recurring tasks
//!
//! Framesched spreads the invocation of recurring tasks over multiple frames.
//! Each registered task wants to run at its own target period, but no single
//! tick ever executes more than a configured number of tasks. This trades a
//! small amount of per-task latency for a predictable per-frame cost: systems
//! that would otherwise all fire in the same frame (AI updates, environment
//! queries, bookkeeping sweeps) are sequenced one after another instead of
//! piling up into a hitch.
//!
//! The scheduler is single-threaded and fully synchronous. The host calls
//! [`Scheduler::tick`] exactly once per frame with the elapsed delta time;
//! everything else happens inside that call. Task callbacks may re-enter the
//! scheduler through a [`SchedulerRemote`] to add or remove tasks mid-tick.

pub mod config;
pub mod delegate;
pub mod error;
pub mod ring;
pub mod scheduler;
#[cfg(feature = "stats")]
pub mod stats;
pub mod task;

pub use config::SchedulerConfig;
pub use delegate::TaskDelegate;
pub use error::{Result, SchedulerError};
pub use scheduler::{Scheduler, SchedulerRemote};
#[cfg(feature = "stats")]
pub use stats::{SchedulerStats, TaskExecutionRecord};
pub use task::TaskHandle;

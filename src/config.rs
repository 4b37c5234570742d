//! Scheduler configuration.
//!
//! All knobs have sensible defaults; hosts that load configuration from a
//! file can embed [`SchedulerConfig`] as a serde section in their own config
//! struct.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};

/// Configuration for the frame scheduler.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Hard cap on task executions in a single tick.
    pub max_tasks_per_tick: usize,

    /// Number of predicted future frames used to break overtime ties while
    /// sorting. Zero disables the lookahead entirely.
    pub lookahead_frames: u32,

    /// Number of recent tick delta times kept for predicting the delta time
    /// of upcoming frames.
    pub delta_time_window: usize,

    /// Clamp negative overtime to zero in the debug accounting, so tasks that
    /// are ahead of schedule do not drag down the aggregates.
    pub clamp_stats: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_tick: 1,
            lookahead_frames: 3,
            delta_time_window: 60,
            clamp_stats: true,
        }
    }
}

impl SchedulerConfig {
    /// Create a config with the given execution budget and default everything else.
    pub fn new(max_tasks_per_tick: usize) -> Self {
        Self {
            max_tasks_per_tick,
            ..Self::default()
        }
    }

    /// Set the tie-break lookahead depth.
    pub fn with_lookahead_frames(mut self, frames: u32) -> Self {
        self.lookahead_frames = frames;
        self
    }

    /// Set the delta-time prediction window.
    pub fn with_delta_time_window(mut self, window: usize) -> Self {
        self.delta_time_window = window;
        self
    }

    /// Enable or disable clamping of negative overtime in the debug accounting.
    pub fn with_clamp_stats(mut self, clamp: bool) -> Self {
        self.clamp_stats = clamp;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.max_tasks_per_tick == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_tasks_per_tick must be at least 1".to_string(),
            ));
        }
        if self.delta_time_window == 0 {
            return Err(SchedulerError::InvalidConfig(
                "delta_time_window must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

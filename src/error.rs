//! Error types for framesched
//!
//! Centralized error handling using thiserror.
//!
//! Most scheduler operations deliberately do not fail: unknown handles passed
//! to removal, pause, or query operations are silent no-ops because handles
//! naturally outlive their tasks in caller code. The only fallible operations
//! are configuration validation and the strict debug-name setter.

use thiserror::Error;

use crate::task::TaskHandle;

/// All error types that can occur in framesched
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Rejected scheduler configuration value
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Handle does not name a registered or pending task
    #[error("Task not found: {0}")]
    TaskNotFound(TaskHandle),
}

/// Result type alias for framesched operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

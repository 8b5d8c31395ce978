//! # Feature: Scheduled Removal
//!
//! Revokes an applied profile after a delay. Tracks at most one pending
//! removal per target and guarantees each one either fires once or is
//! cancelled, never both.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.2.0: cancel_for_target and cancel_all for manual removal and shutdown
//! - 1.1.0: Supersede pending removals on reschedule instead of stacking them
//! - 1.0.0: Initial release with per-task tokio timers

pub mod clock;
pub mod scheduler;
pub mod task;

pub use clock::{Clock, SystemClock};
pub use scheduler::RemovalScheduler;
pub use task::{RemovalTask, TaskId, TaskState};

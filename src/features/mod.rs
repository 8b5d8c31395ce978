//! # Features Layer
//!
//! - `profiles`: profile ids, targets and the upstream API
//! - `removal`: scheduled removal of applied profiles
//! - `actions`: operator-facing orchestration

pub mod actions;
pub mod profiles;
pub mod removal;

pub use actions::{ActionOutcome, ActionRequest, ActionService};
pub use profiles::{ActionType, DryRunApi, ProfileApi, ProfileSet, SimpleMdmClient, Target};
pub use removal::{Clock, RemovalScheduler, RemovalTask, SystemClock, TaskId, TaskState};

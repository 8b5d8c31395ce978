//! # Feature: Actions
//!
//! Operator-facing orchestration: apply a profile, optionally schedule its
//! removal, remove it on demand, and manage pending removals.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Manual removal cancels the pending scheduled removal
//! - 1.0.0: Initial release with trigger_action

pub mod service;

pub use service::{ActionOutcome, ActionRequest, ActionService};

//! # Core Module
//!
//! Configuration, error types and delay formatting shared by the daemon and the ctl client.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: Initial creation with config, error and delay modules

pub mod config;
pub mod delay;
pub mod error;

// Re-export commonly used items
pub use config::Config;
pub use delay::{format_minutes, parse_delay_minutes, RemovalPreset, DEFAULT_PRESET, REMOVAL_PRESETS};
pub use error::{ApiError, TransitionError};

//! # Feature: Profiles
//!
//! The Safe/Emergency profile pair, the device they target, and the upstream
//! API used to apply and remove them.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Dry-run API for running without SimpleMDM credentials
//! - 1.0.0: Initial release with SimpleMDM client

pub mod dry_run;
pub mod simplemdm;

pub use dry_run::{ApiCall, ApiCallKind, DryRunApi};
pub use simplemdm::SimpleMdmClient;

use crate::core::{ApiError, Config};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Which of the two mutually exclusive profiles an action refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Safe,
    Emergency,
}

impl ActionType {
    /// Capitalised name used in operator-facing messages
    pub fn label(&self) -> &'static str {
        match self {
            ActionType::Safe => "Safe",
            ActionType::Emergency => "Emergency",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Safe => write!(f, "safe"),
            ActionType::Emergency => write!(f, "emergency"),
        }
    }
}

impl std::str::FromStr for ActionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "safe" => Ok(ActionType::Safe),
            "emergency" => Ok(ActionType::Emergency),
            _ => Err(anyhow::anyhow!("Invalid action type: {}", s)),
        }
    }
}

/// The (profile, device) pair an apply or removal acts upon
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub profile_id: String,
    pub device_id: String,
}

impl Target {
    pub fn new(profile_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            profile_id: profile_id.into(),
            device_id: device_id.into(),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "profile {} on device {}", self.profile_id, self.device_id)
    }
}

/// Profile ids for both actions plus the managed device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSet {
    pub safe_profile_id: String,
    pub emergency_profile_id: String,
    pub device_id: String,
}

impl ProfileSet {
    pub fn from_config(config: &Config) -> Self {
        Self {
            safe_profile_id: config.safe_profile_id.clone(),
            emergency_profile_id: config.emergency_profile_id.clone(),
            device_id: config.device_id.clone(),
        }
    }

    /// Resolve the target an action applies to
    pub fn target_for(&self, action: ActionType) -> Target {
        let profile_id = match action {
            ActionType::Safe => &self.safe_profile_id,
            ActionType::Emergency => &self.emergency_profile_id,
        };
        Target::new(profile_id.as_str(), self.device_id.as_str())
    }
}

/// Upstream device-management operations
///
/// Both calls are single attempts; callers decide whether a failure matters.
#[async_trait]
pub trait ProfileApi: Send + Sync {
    /// Install a profile on a device (POST semantics, re-apply is harmless)
    async fn apply_profile(&self, target: &Target) -> Result<serde_json::Value, ApiError>;

    /// Remove a profile from a device (DELETE semantics)
    async fn remove_profile(&self, target: &Target) -> Result<serde_json::Value, ApiError>;
}

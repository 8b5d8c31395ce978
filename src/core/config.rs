//! Daemon configuration loaded from environment variables.
//!
//! `.env` files are loaded by the binaries with dotenvy before this runs.

use anyhow::{anyhow, Result};

pub const DEFAULT_BASE_URL: &str = "https://a.simplemdm.com/api/v1";
pub const DEFAULT_DEVICE_ID: &str = "1845292";
pub const DEFAULT_SAFE_PROFILE_ID: &str = "173628";
pub const DEFAULT_EMERGENCY_PROFILE_ID: &str = "173535";
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/mdm-switch.sock";
pub const SOCKET_PATH_VAR: &str = "MDM_SWITCH_SOCKET";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    /// SimpleMDM API key (basic auth username); empty only in dry-run mode
    pub api_key: String,
    pub api_base_url: String,
    pub device_id: String,
    pub safe_profile_id: String,
    pub emergency_profile_id: String,
    pub request_timeout_secs: u64,
    /// Record calls instead of hitting SimpleMDM
    pub dry_run: bool,
    pub socket_path: String,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup (the process environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup_or(&lookup, key, default);

        let dry_run = match lookup("MDM_DRY_RUN") {
            Some(value) => parse_bool(&value)
                .ok_or_else(|| anyhow!("MDM_DRY_RUN must be true or false, got '{}'", value))?,
            None => false,
        };

        let api_key = get("SIMPLEMDM_API_KEY", "");
        if api_key.is_empty() && !dry_run {
            return Err(anyhow!(
                "SIMPLEMDM_API_KEY must be set (or enable MDM_DRY_RUN)"
            ));
        }

        let request_timeout_secs = match lookup("MDM_REQUEST_TIMEOUT_SECS") {
            Some(value) => value.trim().parse::<u64>().map_err(|e| {
                anyhow!("MDM_REQUEST_TIMEOUT_SECS must be a number of seconds: {}", e)
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let config = Config {
            api_key,
            api_base_url: get("SIMPLEMDM_BASE_URL", DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            device_id: get("MDM_DEVICE_ID", DEFAULT_DEVICE_ID),
            safe_profile_id: get("MDM_SAFE_PROFILE_ID", DEFAULT_SAFE_PROFILE_ID),
            emergency_profile_id: get("MDM_EMERGENCY_PROFILE_ID", DEFAULT_EMERGENCY_PROFILE_ID),
            request_timeout_secs,
            dry_run,
            socket_path: socket_path_from(&lookup),
            log_level: get("LOG_LEVEL", "info"),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("MDM_REQUEST_TIMEOUT_SECS must be greater than zero"));
        }

        // Safe and Emergency are mutually exclusive profiles
        if self.safe_profile_id == self.emergency_profile_id {
            return Err(anyhow!(
                "Safe and Emergency profiles must differ (both are {})",
                self.safe_profile_id
            ));
        }

        Ok(())
    }
}

/// Control socket path, shared by the daemon config and the ctl client
pub fn socket_path_from<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup_or(&lookup, SOCKET_PATH_VAR, DEFAULT_SOCKET_PATH)
}

/// Trimmed value for `key`, or `default` when unset or blank
fn lookup_or<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

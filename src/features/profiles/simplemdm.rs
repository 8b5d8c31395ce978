//! SimpleMDM REST client
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//!
//! Both operations hit `{base}/profiles/{profile_id}/devices/{device_id}`,
//! POST to apply and DELETE to remove, authenticating with the API key as
//! the basic-auth username and an empty password.

use super::{ProfileApi, Target};
use crate::core::{ApiError, Config};
use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;

const APPLY_FALLBACK: &str = "Failed to apply profile";
const REMOVE_FALLBACK: &str = "Failed to remove profile";

#[derive(Clone)]
pub struct SimpleMdmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout_secs: u64,
}

impl SimpleMdmClient {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("mdm-switch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout_secs,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.api_base_url,
            &config.api_key,
            config.request_timeout_secs,
        )
    }

    fn profile_url(&self, target: &Target) -> String {
        format!(
            "{}/profiles/{}/devices/{}",
            self.base_url, target.profile_id, target.device_id
        )
    }

    /// Send one request and map any non-2xx answer to [`ApiError::Rejected`]
    async fn send(&self, method: Method, target: &Target, fallback: &str) -> Result<Value, ApiError> {
        let url = self.profile_url(target);
        debug!("{method} {url}");

        let response = self
            .client
            .request(method, &url)
            .basic_auth(&self.api_key, Some(""))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;
        let payload = parse_body(&body);

        if status.is_success() {
            Ok(payload)
        } else {
            Err(ApiError::Rejected {
                status: status.as_u16(),
                message: upstream_error_message(&payload).unwrap_or_else(|| fallback.to_string()),
            })
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Transport(format!(
                "Request timed out after {} seconds",
                self.timeout_secs
            ))
        } else if e.is_connect() {
            ApiError::Transport("Could not connect to SimpleMDM".to_string())
        } else {
            ApiError::Transport(format!("HTTP request failed: {e}"))
        }
    }
}

#[async_trait]
impl ProfileApi for SimpleMdmClient {
    async fn apply_profile(&self, target: &Target) -> Result<Value, ApiError> {
        match self.send(Method::POST, target, APPLY_FALLBACK).await {
            Ok(data) => {
                info!("Successfully applied {target}");
                Ok(data)
            }
            Err(e) => {
                warn!("Error applying {target}: {e}");
                Err(e)
            }
        }
    }

    async fn remove_profile(&self, target: &Target) -> Result<Value, ApiError> {
        match self.send(Method::DELETE, target, REMOVE_FALLBACK).await {
            Ok(data) => {
                info!("Successfully removed {target}");
                Ok(data)
            }
            Err(ApiError::Rejected { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                info!("{target} was already absent");
                Ok(Value::Null)
            }
            Err(e) => {
                warn!("Error removing {target}: {e}");
                Err(e)
            }
        }
    }
}

fn parse_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

/// Join the upstream `errors` array into one message.
///
/// Entries are either plain strings or objects carrying `title`/`detail`.
fn upstream_error_message(payload: &Value) -> Option<String> {
    let errors = payload.get("errors")?.as_array()?;
    let parts: Vec<&str> = errors
        .iter()
        .filter_map(|entry| match entry {
            Value::String(s) => Some(s.as_str()),
            Value::Object(obj) => obj
                .get("title")
                .or_else(|| obj.get("detail"))
                .and_then(Value::as_str),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

//! Dry-run profile API
//!
//! Logs and records every call instead of talking to SimpleMDM. Useful for
//! rehearsing schedules without credentials, and as the collaborator in tests.

use super::{ProfileApi, Target};
use crate::core::ApiError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use serde_json::{json, Value};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiCallKind {
    Apply,
    Remove,
}

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCall {
    pub kind: ApiCallKind,
    pub target: Target,
    pub at: DateTime<Utc>,
}

#[derive(Default)]
pub struct DryRunApi {
    calls: Mutex<Vec<ApiCall>>,
    apply_failure: Option<ApiError>,
    remove_failure: Option<ApiError>,
}

impl DryRunApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every apply call with the given status and message
    pub fn with_apply_failure(mut self, status: u16, message: &str) -> Self {
        self.apply_failure = Some(ApiError::Rejected {
            status,
            message: message.to_string(),
        });
        self
    }

    /// Reject every remove call with the given status and message
    pub fn with_remove_failure(mut self, status: u16, message: &str) -> Self {
        self.remove_failure = Some(ApiError::Rejected {
            status,
            message: message.to_string(),
        });
        self
    }

    /// All calls seen so far, oldest first
    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().clone()
    }

    /// Number of calls of one kind for a target
    pub fn count(&self, kind: ApiCallKind, target: &Target) -> usize {
        self.lock()
            .iter()
            .filter(|call| call.kind == kind && &call.target == target)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ApiCall>> {
        // A panicking test thread must not hide the calls from the others
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, kind: ApiCallKind, target: &Target) {
        self.lock().push(ApiCall {
            kind,
            target: target.clone(),
            at: Utc::now(),
        });
    }
}

#[async_trait]
impl ProfileApi for DryRunApi {
    async fn apply_profile(&self, target: &Target) -> Result<Value, ApiError> {
        info!("[dry run] apply {target}");
        self.record(ApiCallKind::Apply, target);
        match &self.apply_failure {
            Some(e) => Err(e.clone()),
            None => Ok(json!({ "dry_run": true })),
        }
    }

    async fn remove_profile(&self, target: &Target) -> Result<Value, ApiError> {
        info!("[dry run] remove {target}");
        self.record(ApiCallKind::Remove, target);
        match &self.remove_failure {
            Some(e) => Err(e.clone()),
            None => Ok(json!({ "dry_run": true })),
        }
    }
}

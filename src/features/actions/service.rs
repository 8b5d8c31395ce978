//! Action service
//!
//! Upstream failures stop here and become `success: false` outcomes; nothing
//! in this module returns an error to its caller.

use crate::features::profiles::{ActionType, ProfileApi, ProfileSet};
use crate::features::removal::{RemovalScheduler, RemovalTask, TaskId};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An operator request to switch profiles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action: ActionType,
    /// Zero or less means no automatic removal
    pub scheduled_removal_minutes: i64,
}

/// Result shown to the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fire_at: Option<DateTime<Utc>>,
}

impl ActionOutcome {
    pub fn success(message: String) -> Self {
        Self {
            success: true,
            message,
            task_id: None,
            fire_at: None,
        }
    }

    pub fn failure(message: String) -> Self {
        Self {
            success: false,
            message,
            task_id: None,
            fire_at: None,
        }
    }
}

#[derive(Clone)]
pub struct ActionService {
    api: Arc<dyn ProfileApi>,
    scheduler: RemovalScheduler,
    profiles: ProfileSet,
}

impl ActionService {
    pub fn new(api: Arc<dyn ProfileApi>, scheduler: RemovalScheduler, profiles: ProfileSet) -> Self {
        Self {
            api,
            scheduler,
            profiles,
        }
    }

    pub fn profiles(&self) -> &ProfileSet {
        &self.profiles
    }

    /// Apply the action's profile, then schedule its removal if asked to
    pub async fn trigger_action(&self, request: ActionRequest) -> ActionOutcome {
        let label = request.action.label();
        let target = self.profiles.target_for(request.action);
        info!(
            "Triggering {} action: {} (removal in {} minutes)",
            request.action, target, request.scheduled_removal_minutes
        );

        // Reject bad delays before anything is applied
        let delay_minutes = if request.scheduled_removal_minutes > 0 {
            match u32::try_from(request.scheduled_removal_minutes) {
                Ok(minutes) => Some(minutes),
                Err(_) => {
                    return ActionOutcome::failure(format!(
                        "Removal delay of {} minutes is too large",
                        request.scheduled_removal_minutes
                    ))
                }
            }
        } else {
            None
        };

        if let Err(e) = self.api.apply_profile(&target).await {
            warn!("{label} action failed for {target}: {e}");
            return ActionOutcome::failure(format!("{label} action failed: {e}"));
        }

        let Some(minutes) = delay_minutes else {
            // A fresh apply must not be undone by an older schedule
            return match self.scheduler.cancel_for_target(&target) {
                Some(task) => ActionOutcome {
                    success: true,
                    message: format!(
                        "{label} action triggered successfully. No automatic removal scheduled. Previously scheduled removal {} cancelled.",
                        task.id
                    ),
                    task_id: Some(task.id),
                    fire_at: None,
                },
                None => ActionOutcome::success(format!(
                    "{label} action triggered successfully. No automatic removal scheduled."
                )),
            };
        };

        let task = self.scheduler.schedule(target, minutes);

        ActionOutcome {
            success: true,
            message: format!(
                "{label} action triggered successfully. Removal scheduled in {minutes} minutes."
            ),
            task_id: Some(task.id),
            fire_at: Some(task.fire_at),
        }
    }

    /// Remove the action's profile now and drop its scheduled removal
    pub async fn remove_now(&self, action: ActionType) -> ActionOutcome {
        let label = action.label();
        let target = self.profiles.target_for(action);
        info!("Manual removal of {target}");

        if let Err(e) = self.api.remove_profile(&target).await {
            warn!("Manual removal of {target} failed: {e}");
            return ActionOutcome::failure(format!("Failed to remove {label} profile: {e}"));
        }

        match self.scheduler.cancel_for_target(&target) {
            Some(task) => ActionOutcome {
                success: true,
                message: format!(
                    "{label} profile removed. Scheduled removal {} cancelled.",
                    task.id
                ),
                task_id: Some(task.id),
                fire_at: None,
            },
            None => ActionOutcome::success(format!("{label} profile removed.")),
        }
    }

    pub fn cancel_removal(&self, task_id: &TaskId) -> bool {
        self.scheduler.cancel(task_id)
    }

    pub fn pending_removals(&self) -> Vec<RemovalTask> {
        self.scheduler.pending()
    }

    /// Drop every pending removal; schedules do not survive a restart
    pub fn shutdown(&self) -> usize {
        self.scheduler.cancel_all()
    }
}

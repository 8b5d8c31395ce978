//! Removal task record and its state machine.
//!
//! `Pending --fire--> Fired`, `Pending --cancel--> Cancelled`; both terminal.

use crate::core::TransitionError;
use crate::features::profiles::Target;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one scheduled removal; never reused
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn generate() -> Self {
        TaskId(Uuid::new_v4())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Uuid::parse_str(s.trim())
            .map(TaskId)
            .map_err(|e| anyhow::anyhow!("Invalid task id '{}': {}", s, e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    Pending,
    Fired,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Pending)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Pending => write!(f, "pending"),
            TaskState::Fired => write!(f, "fired"),
            TaskState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One automatic removal owed to a target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalTask {
    pub id: TaskId,
    pub target: Target,
    pub created_at: DateTime<Utc>,
    pub delay_minutes: u32,
    /// `created_at + delay_minutes`
    pub fire_at: DateTime<Utc>,
    pub state: TaskState,
}

impl RemovalTask {
    pub fn new(target: Target, created_at: DateTime<Utc>, delay_minutes: u32) -> Self {
        Self {
            id: TaskId::generate(),
            target,
            created_at,
            delay_minutes,
            fire_at: created_at + Duration::minutes(i64::from(delay_minutes)),
            state: TaskState::Pending,
        }
    }

    /// Move a pending task into a terminal state.
    ///
    /// Pure bookkeeping: callers are responsible for the timer and the
    /// upstream call that go with the transition.
    pub fn resolve(&mut self, next: TaskState) -> Result<(), TransitionError> {
        if self.state.is_terminal() {
            return Err(TransitionError::AlreadyResolved(self.state));
        }
        if next == TaskState::Pending {
            return Err(TransitionError::BackToPending);
        }
        self.state = next;
        Ok(())
    }

    /// Time left until the removal fires, zero once overdue
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.fire_at - now).max(Duration::zero())
    }
}

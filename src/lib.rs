// Core layer - config, errors and delay helpers
pub mod core;

// Features layer - profiles, scheduled removal, actions
pub mod features;

// IPC layer - control socket between daemon and ctl
pub mod ipc;

pub use core::Config;

pub use features::{
    // Actions
    ActionOutcome, ActionRequest, ActionService,
    // Profiles
    ActionType, DryRunApi, ProfileApi, ProfileSet, SimpleMdmClient, Target,
    // Removal
    Clock, RemovalScheduler, RemovalTask, SystemClock, TaskId, TaskState,
};

pub use ipc::{ControlClient, ControlCommand, ControlReply, ControlServer};

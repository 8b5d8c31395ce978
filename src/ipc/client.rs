//! # Control Client
//!
//! Unix socket client used by `mdm-ctl` to talk to the daemon.

use crate::features::profiles::ActionType;
use crate::features::removal::TaskId;
use crate::ipc::protocol::{read_message, write_message, ControlCommand, ControlReply};
use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use std::path::Path;
use tokio::net::UnixStream;
use tokio::time::{timeout, Duration};

/// Connection timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for a reply; covers a full upstream request
const REPLY_TIMEOUT: Duration = Duration::from_secs(90);

pub struct ControlClient {
    stream: UnixStream,
}

impl ControlClient {
    /// Connect to the daemon's control socket
    pub async fn connect(socket_path: impl AsRef<Path>) -> Result<Self> {
        let socket_path = socket_path.as_ref();
        debug!("Connecting to control socket at {}", socket_path.display());

        let stream = timeout(CONNECT_TIMEOUT, UnixStream::connect(socket_path))
            .await
            .map_err(|_| anyhow!("Connection timeout"))?
            .map_err(|e| anyhow!("Failed to connect to {}: {}", socket_path.display(), e))?;

        info!("Connected to control socket");
        Ok(ControlClient { stream })
    }

    /// Send one command and wait for its reply
    pub async fn request(&mut self, cmd: ControlCommand) -> Result<ControlReply> {
        write_message(&mut self.stream, &cmd).await?;

        let reply = timeout(REPLY_TIMEOUT, read_message::<ControlReply, _>(&mut self.stream))
            .await
            .map_err(|_| anyhow!("Timed out waiting for the daemon to reply"))??;

        reply.ok_or_else(|| anyhow!("Daemon closed the connection"))
    }

    pub async fn trigger_action(
        &mut self,
        action: ActionType,
        scheduled_removal_minutes: i64,
    ) -> Result<ControlReply> {
        self.request(ControlCommand::TriggerAction {
            request_id: new_request_id(),
            action,
            scheduled_removal_minutes,
        })
        .await
    }

    pub async fn remove_profile(&mut self, action: ActionType) -> Result<ControlReply> {
        self.request(ControlCommand::RemoveProfile {
            request_id: new_request_id(),
            action,
        })
        .await
    }

    pub async fn cancel_removal(&mut self, task_id: TaskId) -> Result<ControlReply> {
        self.request(ControlCommand::CancelRemoval {
            request_id: new_request_id(),
            task_id,
        })
        .await
    }

    pub async fn list_pending(&mut self) -> Result<ControlReply> {
        self.request(ControlCommand::ListPending {
            request_id: new_request_id(),
        })
        .await
    }

    pub async fn status(&mut self) -> Result<ControlReply> {
        self.request(ControlCommand::GetStatus).await
    }

    pub async fn ping(&mut self) -> Result<ControlReply> {
        self.request(ControlCommand::Ping {
            timestamp: chrono::Utc::now().timestamp(),
        })
        .await
    }
}

fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Try to connect with retries
pub async fn connect_with_retry(
    socket_path: impl AsRef<Path>,
    max_attempts: u32,
    delay: Duration,
) -> Result<ControlClient> {
    let socket_path = socket_path.as_ref();
    let mut attempt = 1;
    loop {
        match ControlClient::connect(socket_path).await {
            Ok(client) => return Ok(client),
            Err(e) if attempt < max_attempts => {
                warn!(
                    "Connection attempt {} failed: {}. Retrying in {:?}...",
                    attempt, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(anyhow!(
                    "Failed to connect after {} attempts: {}",
                    max_attempts,
                    e
                ));
            }
        }
    }
}

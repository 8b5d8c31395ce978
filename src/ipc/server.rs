//! # Control Server
//!
//! Unix socket server through which the ctl client drives the daemon.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0
//! - **Toggleable**: false

use crate::features::actions::{ActionRequest, ActionService};
use crate::ipc::protocol::{read_message, write_message, ControlCommand, ControlReply};
use anyhow::Result;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Maximum number of connected ctl clients
const MAX_CLIENTS: usize = 16;

pub struct ControlServer {
    service: ActionService,
    dry_run: bool,
    /// Connected client count
    client_count: Arc<RwLock<usize>>,
    /// Server start time for uptime calculation
    start_time: Instant,
}

impl ControlServer {
    pub fn new(service: ActionService, dry_run: bool) -> Self {
        ControlServer {
            service,
            dry_run,
            client_count: Arc::new(RwLock::new(0)),
            start_time: Instant::now(),
        }
    }

    /// Bind the socket and run the accept loop in a background task
    pub async fn start(self: Arc<Self>, socket_path: impl AsRef<Path>) -> Result<JoinHandle<()>> {
        let socket_path: PathBuf = socket_path.as_ref().to_path_buf();

        // Remove a socket left behind by a previous run
        if socket_path.exists() {
            std::fs::remove_file(&socket_path)?;
        }

        let listener = UnixListener::bind(&socket_path)?;
        info!("Control socket listening on {}", socket_path.display());

        let server = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _addr)) => {
                        let Some(total) = server.try_acquire_client().await else {
                            warn!("Maximum control clients reached ({MAX_CLIENTS}), rejecting connection");
                            continue;
                        };
                        debug!("ctl client connected (total: {total})");

                        let server_clone = server.clone();
                        tokio::spawn(async move {
                            if let Err(e) = server_clone.handle_client(stream).await {
                                debug!("Client handler ended: {e}");
                            }
                            server_clone.release_client().await;
                            debug!("ctl client disconnected");
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept control connection: {e}");
                    }
                }
            }
        });

        Ok(handle)
    }

    /// Answer commands from one client until it hangs up
    async fn handle_client(&self, stream: UnixStream) -> Result<()> {
        let (mut reader, mut writer) = stream.into_split();

        loop {
            let reply = match read_message::<ControlCommand, _>(&mut reader).await {
                Ok(Some(cmd)) => {
                    debug!("Processing control command: {cmd:?}");
                    self.process_command(cmd).await
                }
                Ok(None) => break,
                Err(e) => {
                    // Framing is intact after a bad JSON body, so keep the connection
                    if e.downcast_ref::<serde_json::Error>().is_some() {
                        warn!("Failed to parse command from client: {e}");
                        ControlReply::Error {
                            message: format!("Invalid command: {e}"),
                        }
                    } else {
                        return Err(e);
                    }
                }
            };

            write_message(&mut writer, &reply).await?;
        }

        Ok(())
    }

    /// Process a single command and produce its reply
    pub async fn process_command(&self, cmd: ControlCommand) -> ControlReply {
        match cmd {
            ControlCommand::TriggerAction {
                request_id,
                action,
                scheduled_removal_minutes,
            } => {
                let outcome = self
                    .service
                    .trigger_action(ActionRequest {
                        action,
                        scheduled_removal_minutes,
                    })
                    .await;
                ControlReply::ActionResult {
                    request_id,
                    outcome,
                }
            }
            ControlCommand::RemoveProfile { request_id, action } => {
                let outcome = self.service.remove_now(action).await;
                ControlReply::ActionResult {
                    request_id,
                    outcome,
                }
            }
            ControlCommand::CancelRemoval {
                request_id,
                task_id,
            } => {
                let cancelled = self.service.cancel_removal(&task_id);
                ControlReply::RemovalCancelled {
                    request_id,
                    task_id,
                    cancelled,
                }
            }
            ControlCommand::ListPending { request_id } => ControlReply::PendingRemovals {
                request_id,
                removals: self.service.pending_removals(),
            },
            ControlCommand::GetStatus => ControlReply::Status {
                uptime_seconds: self.uptime_seconds(),
                pending_removals: self.service.pending_removals().len(),
                connected_clients: self.client_count().await,
                device_id: self.service.profiles().device_id.clone(),
                dry_run: self.dry_run,
            },
            ControlCommand::Ping { timestamp } => ControlReply::Pong { timestamp },
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Get connected client count
    pub async fn client_count(&self) -> usize {
        *self.client_count.read().await
    }

    /// Claim a client slot, returning the new total, or `None` when full.
    /// Check and increment happen under one write guard.
    async fn try_acquire_client(&self) -> Option<usize> {
        let mut count = self.client_count.write().await;
        if *count >= MAX_CLIENTS {
            return None;
        }
        *count += 1;
        Some(*count)
    }

    async fn release_client(&self) {
        let mut count = self.client_count.write().await;
        *count = count.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::profiles::{ActionType, DryRunApi, ProfileSet};
    use crate::features::removal::{RemovalScheduler, TaskId};

    fn server() -> ControlServer {
        let api = Arc::new(DryRunApi::new());
        let scheduler = RemovalScheduler::new(api.clone());
        let profiles = ProfileSet {
            safe_profile_id: "173628".to_string(),
            emergency_profile_id: "173535".to_string(),
            device_id: "1845292".to_string(),
        };
        ControlServer::new(ActionService::new(api, scheduler, profiles), true)
    }

    #[tokio::test]
    async fn test_trigger_then_list_and_cancel() {
        let server = server();

        let reply = server
            .process_command(ControlCommand::TriggerAction {
                request_id: "r1".to_string(),
                action: ActionType::Emergency,
                scheduled_removal_minutes: 15,
            })
            .await;
        let task_id = match reply {
            ControlReply::ActionResult { request_id, outcome } => {
                assert_eq!(request_id, "r1");
                assert!(outcome.success);
                outcome.task_id.unwrap()
            }
            other => panic!("Unexpected reply: {other:?}"),
        };

        match server
            .process_command(ControlCommand::ListPending {
                request_id: "r2".to_string(),
            })
            .await
        {
            ControlReply::PendingRemovals { removals, .. } => {
                assert_eq!(removals.len(), 1);
                assert_eq!(removals[0].id, task_id);
            }
            other => panic!("Unexpected reply: {other:?}"),
        }

        let reply = server
            .process_command(ControlCommand::CancelRemoval {
                request_id: "r3".to_string(),
                task_id: task_id.clone(),
            })
            .await;
        assert_eq!(
            reply,
            ControlReply::RemovalCancelled {
                request_id: "r3".to_string(),
                task_id,
                cancelled: true,
            }
        );
    }

    #[tokio::test]
    async fn test_cancel_unknown_task() {
        let server = server();
        let task_id = TaskId::generate();

        let reply = server
            .process_command(ControlCommand::CancelRemoval {
                request_id: "r1".to_string(),
                task_id: task_id.clone(),
            })
            .await;

        assert_eq!(
            reply,
            ControlReply::RemovalCancelled {
                request_id: "r1".to_string(),
                task_id,
                cancelled: false,
            }
        );
    }

    #[tokio::test]
    async fn test_status_and_ping() {
        let server = server();

        match server.process_command(ControlCommand::GetStatus).await {
            ControlReply::Status {
                pending_removals,
                connected_clients,
                device_id,
                dry_run,
                ..
            } => {
                assert_eq!(pending_removals, 0);
                assert_eq!(connected_clients, 0);
                assert_eq!(device_id, "1845292");
                assert!(dry_run);
            }
            other => panic!("Unexpected reply: {other:?}"),
        }

        assert_eq!(
            server
                .process_command(ControlCommand::Ping { timestamp: 7 })
                .await,
            ControlReply::Pong { timestamp: 7 }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_client_slots_never_exceed_limit() {
        let server = Arc::new(server());

        let attempts: Vec<_> = (0..MAX_CLIENTS * 4)
            .map(|_| {
                let server = server.clone();
                tokio::spawn(async move { server.try_acquire_client().await })
            })
            .collect();

        let mut granted = 0;
        for attempt in attempts {
            if attempt.await.unwrap().is_some() {
                granted += 1;
            }
        }

        assert_eq!(granted, MAX_CLIENTS);
        assert_eq!(server.client_count().await, MAX_CLIENTS);

        server.release_client().await;
        assert_eq!(server.client_count().await, MAX_CLIENTS - 1);
        assert_eq!(server.try_acquire_client().await, Some(MAX_CLIENTS));
        assert_eq!(server.try_acquire_client().await, None);
    }
}

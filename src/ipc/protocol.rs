//! # Control Protocol
//!
//! Message types for ctl <-> daemon communication over a Unix socket.
//!
//! Uses length-prefixed JSON framing:
//! - 4 bytes: message length (big-endian u32)
//! - N bytes: JSON payload
//!
//! Every command frame is answered by exactly one reply frame.

use crate::features::actions::ActionOutcome;
use crate::features::profiles::ActionType;
use crate::features::removal::{RemovalTask, TaskId};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest frame either side will accept
pub const MAX_FRAME_LEN: usize = 10 * 1024 * 1024;

// ============================================================================
// ctl -> daemon
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlCommand {
    /// Apply a profile and optionally schedule its removal
    TriggerAction {
        request_id: String,
        action: ActionType,
        scheduled_removal_minutes: i64,
    },
    /// Remove a profile right away
    RemoveProfile {
        request_id: String,
        action: ActionType,
    },
    CancelRemoval {
        request_id: String,
        task_id: TaskId,
    },
    ListPending {
        request_id: String,
    },
    GetStatus,
    Ping {
        timestamp: i64,
    },
}

// ============================================================================
// daemon -> ctl
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlReply {
    /// Result of TriggerAction or RemoveProfile
    ActionResult {
        request_id: String,
        outcome: ActionOutcome,
    },
    RemovalCancelled {
        request_id: String,
        task_id: TaskId,
        cancelled: bool,
    },
    PendingRemovals {
        request_id: String,
        removals: Vec<RemovalTask>,
    },
    Status {
        uptime_seconds: u64,
        pending_removals: usize,
        connected_clients: usize,
        device_id: String,
        dry_run: bool,
    },
    Pong {
        timestamp: i64,
    },
    /// The command could not be processed at all
    Error {
        message: String,
    },
}

// ============================================================================
// Framing - Length-prefixed JSON messages
// ============================================================================

/// Encode a message with length prefix
pub fn encode_message<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(msg)?;
    if json.len() > MAX_FRAME_LEN {
        return Err(anyhow!("Message too large: {} bytes", json.len()));
    }
    let len = json.len() as u32;
    let mut buf = Vec::with_capacity(4 + json.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(&json);
    Ok(buf)
}

/// Read one frame body.
///
/// Returns `Ok(None)` when the peer closed the connection cleanly between
/// frames.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(anyhow!("Message too large: {} bytes", len));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(Some(buf))
}

/// Read and decode one framed message
pub async fn read_message<T, R>(reader: &mut R) -> Result<Option<T>>
where
    T: for<'de> Deserialize<'de>,
    R: AsyncRead + Unpin,
{
    match read_frame(reader).await? {
        Some(buf) => Ok(Some(serde_json::from_slice(&buf)?)),
        None => Ok(None),
    }
}

/// Write a framed message to a writer
pub async fn write_message<T, W>(writer: &mut W, msg: &T) -> Result<()>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let encoded = encode_message(msg)?;
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_over_duplex() {
        let (mut a, mut b) = tokio::io::duplex(1024);

        let cmd = ControlCommand::TriggerAction {
            request_id: "req-1".to_string(),
            action: ActionType::Safe,
            scheduled_removal_minutes: 30,
        };
        write_message(&mut a, &cmd).await.unwrap();
        write_message(&mut a, &ControlCommand::GetStatus).await.unwrap();
        drop(a);

        let first: Option<ControlCommand> = read_message(&mut b).await.unwrap();
        assert_eq!(first, Some(cmd));
        let second: Option<ControlCommand> = read_message(&mut b).await.unwrap();
        assert_eq!(second, Some(ControlCommand::GetStatus));
        let end: Option<ControlCommand> = read_message(&mut b).await.unwrap();
        assert_eq!(end, None);
    }

    #[tokio::test]
    async fn test_rejects_oversized_frame() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let len = (MAX_FRAME_LEN as u32 + 1).to_be_bytes();
        a.write_all(&len).await.unwrap();

        assert!(read_frame(&mut b).await.is_err());
    }

    #[test]
    fn test_command_wire_format() {
        let cmd = ControlCommand::TriggerAction {
            request_id: "test-123".to_string(),
            action: ActionType::Emergency,
            scheduled_removal_minutes: 15,
        };

        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["type"], "TriggerAction");
        assert_eq!(json["action"], "emergency");
        assert_eq!(json["scheduled_removal_minutes"], 15);
    }

    #[test]
    fn test_reply_wire_format() {
        let reply = ControlReply::ActionResult {
            request_id: "test-123".to_string(),
            outcome: ActionOutcome::success("done".to_string()),
        };

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["type"], "ActionResult");
        assert_eq!(json["outcome"]["success"], true);
        assert!(json["outcome"].get("task_id").is_none());
    }
}

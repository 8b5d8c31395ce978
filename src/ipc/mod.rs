//! # IPC Module
//!
//! Control socket between the daemon and the ctl client.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: Initial control protocol over a Unix socket

pub mod client;
pub mod protocol;
pub mod server;

pub use client::{connect_with_retry, ControlClient};
pub use protocol::{ControlCommand, ControlReply};
pub use server::ControlServer;

pub use crate::core::config::DEFAULT_SOCKET_PATH;

/// Get the socket path from environment or use default
pub fn get_socket_path() -> String {
    crate::core::config::socket_path_from(|key| std::env::var(key).ok())
}

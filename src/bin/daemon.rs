//! # mdm-switchd
//!
//! Serves the control socket, applies profiles and runs scheduled removals.
//!
//! Usage: `cargo run --bin mdm-switchd`

use anyhow::Result;
use dotenvy::dotenv;
use log::{error, info, warn};
use std::sync::Arc;

use mdm_switch::core::Config;
use mdm_switch::features::actions::ActionService;
use mdm_switch::features::profiles::{DryRunApi, ProfileApi, ProfileSet, SimpleMdmClient};
use mdm_switch::features::removal::RemovalScheduler;
use mdm_switch::ipc::ControlServer;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_level.as_str()))
        .init();

    info!("Starting mdm-switch daemon...");

    let api: Arc<dyn ProfileApi> = if config.dry_run {
        warn!("🧪 Dry run enabled - SimpleMDM will not be contacted");
        Arc::new(DryRunApi::new())
    } else {
        info!("Using SimpleMDM at {}", config.api_base_url);
        Arc::new(SimpleMdmClient::from_config(&config)?)
    };

    let profiles = ProfileSet::from_config(&config);
    info!(
        "Device {}: Safe profile {}, Emergency profile {}",
        profiles.device_id, profiles.safe_profile_id, profiles.emergency_profile_id
    );

    let scheduler = RemovalScheduler::new(api.clone());
    let service = ActionService::new(api, scheduler, profiles);

    let server = Arc::new(ControlServer::new(service.clone(), config.dry_run));
    let accept_loop = server.start(&config.socket_path).await.map_err(|e| {
        error!("Failed to start control socket at {}: {e}", config.socket_path);
        e
    })?;
    info!("📡 Ready for commands on {}", config.socket_path);

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    accept_loop.abort();

    let dropped = service.shutdown();
    if dropped > 0 {
        warn!("{dropped} pending removal(s) dropped; re-schedule them after restart");
    }

    if let Err(e) = std::fs::remove_file(&config.socket_path) {
        warn!("Failed to remove control socket {}: {e}", config.socket_path);
    }

    Ok(())
}

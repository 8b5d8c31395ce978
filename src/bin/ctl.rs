//! # mdm-ctl
//!
//! Operator client for the mdm-switch daemon.
//!
//! Usage:
//! - `mdm-ctl safe [delay]` / `mdm-ctl emergency [delay]`
//! - `mdm-ctl remove <safe|emergency>`
//! - `mdm-ctl cancel <task-id>`
//! - `mdm-ctl pending | status | ping`
//!
//! With `--features interactive` and no arguments, prompts for everything.

use anyhow::{anyhow, Result};
use chrono::Utc;
use dotenvy::dotenv;

use mdm_switch::core::{format_minutes, parse_delay_minutes, REMOVAL_PRESETS, DEFAULT_PRESET};
use mdm_switch::features::profiles::ActionType;
use mdm_switch::features::removal::TaskId;
use mdm_switch::ipc::{connect_with_retry, get_socket_path, ControlReply};
use std::time::Duration;

const USAGE: &str = "\
Usage: mdm-ctl <command>

Commands:
  safe [delay]          Apply the Safe profile, remove it after [delay]
  emergency [delay]     Apply the Emergency profile, remove it after [delay]
  remove <action>       Remove the safe or emergency profile now
  cancel <task-id>      Cancel a scheduled removal
  pending               List scheduled removals
  status                Show daemon status
  ping                  Check the daemon is alive

Delays are minutes (30) or durations (45m, 2h, 1h30m, 1d).
Use 0 or none for no automatic removal. Default: 30 minutes.";

enum Command {
    Trigger(ActionType, i64),
    Remove(ActionType),
    Cancel(TaskId),
    Pending,
    Status,
    Ping,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let command = if args.is_empty() {
        match interactive_command()? {
            Some(command) => command,
            None => {
                println!("Nothing to do.");
                return Ok(());
            }
        }
    } else if matches!(args[0].as_str(), "help" | "-h" | "--help") {
        println!("{USAGE}");
        return Ok(());
    } else {
        match parse_command(&args) {
            Ok(command) => command,
            Err(e) => {
                eprintln!("Error: {e}\n\n{USAGE}");
                std::process::exit(2);
            }
        }
    };

    let socket_path = get_socket_path();
    // The daemon may still be binding its socket right after startup
    let mut client = connect_with_retry(&socket_path, 3, Duration::from_millis(500)).await?;

    let reply = match command {
        Command::Trigger(action, minutes) => client.trigger_action(action, minutes).await?,
        Command::Remove(action) => client.remove_profile(action).await?,
        Command::Cancel(task_id) => client.cancel_removal(task_id).await?,
        Command::Pending => client.list_pending().await?,
        Command::Status => client.status().await?,
        Command::Ping => client.ping().await?,
    };

    if !print_reply(reply) {
        std::process::exit(1);
    }

    Ok(())
}

fn parse_command(args: &[String]) -> Result<Command> {
    let arg = |i: usize, what: &str| {
        args.get(i)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("Missing {what}"))
    };

    match args[0].as_str() {
        "safe" | "emergency" => {
            let action: ActionType = args[0].parse()?;
            let minutes = match args.get(1) {
                Some(delay) => parse_delay_minutes(delay)
                    .ok_or_else(|| anyhow!("Invalid delay '{delay}'"))?,
                None => i64::from(REMOVAL_PRESETS[DEFAULT_PRESET].minutes),
            };
            Ok(Command::Trigger(action, minutes))
        }
        "remove" => Ok(Command::Remove(arg(1, "action (safe or emergency)")?.parse()?)),
        "cancel" => Ok(Command::Cancel(arg(1, "task id")?.parse()?)),
        "pending" => Ok(Command::Pending),
        "status" => Ok(Command::Status),
        "ping" => Ok(Command::Ping),
        other => Err(anyhow!("Unknown command '{other}'")),
    }
}

/// Print a reply for the operator; false means the command failed
fn print_reply(reply: ControlReply) -> bool {
    match reply {
        ControlReply::ActionResult { outcome, .. } => {
            if outcome.success {
                println!("✅ {}", outcome.message);
                if let (Some(task_id), Some(fire_at)) = (&outcome.task_id, outcome.fire_at) {
                    println!(
                        "   Removal {} at {}",
                        task_id,
                        fire_at.format("%Y-%m-%d %H:%M:%S UTC")
                    );
                }
            } else {
                eprintln!("❌ {}", outcome.message);
            }
            outcome.success
        }
        ControlReply::RemovalCancelled {
            task_id, cancelled, ..
        } => {
            if cancelled {
                println!("✅ Cancelled removal {task_id}.");
            } else {
                eprintln!("❌ Removal {task_id} not found or already resolved.");
            }
            cancelled
        }
        ControlReply::PendingRemovals { removals, .. } => {
            if removals.is_empty() {
                println!("📋 No pending removals.");
            } else {
                println!("📋 Pending removals:\n");
                let now = Utc::now();
                for task in &removals {
                    let remaining = task.remaining(now).num_minutes();
                    let when = if remaining > 0 {
                        format!("in {}", format_minutes(remaining))
                    } else {
                        "any moment now".to_string()
                    };
                    println!(
                        "{}  {} - {} ({})",
                        task.id,
                        task.target,
                        when,
                        task.fire_at.format("%Y-%m-%d %H:%M:%S UTC")
                    );
                }
                println!("\nUse `mdm-ctl cancel <task-id>` to cancel a removal.");
            }
            true
        }
        ControlReply::Status {
            uptime_seconds,
            pending_removals,
            connected_clients,
            device_id,
            dry_run,
        } => {
            println!("Device:           {device_id}");
            println!("Pending removals: {pending_removals}");
            println!("ctl clients:      {connected_clients}");
            println!("Uptime:           {}", format_minutes((uptime_seconds / 60) as i64));
            if dry_run {
                println!("Mode:             dry run (SimpleMDM is not contacted)");
            }
            true
        }
        ControlReply::Pong { timestamp } => {
            println!("pong ({timestamp})");
            true
        }
        ControlReply::Error { message } => {
            eprintln!("❌ {message}");
            false
        }
    }
}

#[cfg(feature = "interactive")]
fn interactive_command() -> Result<Option<Command>> {
    use dialoguer::{Confirm, Input, Select};

    let actions = [ActionType::Safe, ActionType::Emergency];
    let labels: Vec<&str> = actions.iter().map(|a| a.label()).collect();

    let index = Select::new()
        .with_prompt("Select an action")
        .items(&labels)
        .default(0)
        .interact()?;
    let action = actions[index];

    let confirmed = Confirm::new()
        .with_prompt(format!("Apply the {} profile to the device?", action.label()))
        .default(false)
        .interact()?;
    if !confirmed {
        return Ok(None);
    }

    let mut options: Vec<String> = REMOVAL_PRESETS.iter().map(|p| p.label()).collect();
    options.push("Custom".to_string());
    options.push("No automatic removal".to_string());

    let choice = Select::new()
        .with_prompt(format!("Schedule {} action removal", action.label()))
        .items(&options)
        .default(DEFAULT_PRESET)
        .interact()?;

    let minutes = if let Some(preset) = REMOVAL_PRESETS.get(choice) {
        i64::from(preset.minutes)
    } else if choice == REMOVAL_PRESETS.len() {
        let input: String = Input::new()
            .with_prompt("Remove after (minutes or e.g. 1h30m)")
            .validate_with(|input: &String| -> Result<(), String> {
                match parse_delay_minutes(input) {
                    Some(minutes) if minutes > 0 => Ok(()),
                    _ => Err("Enter a positive delay like 45, 90m or 1h30m".to_string()),
                }
            })
            .interact_text()?;
        parse_delay_minutes(&input).unwrap_or(0)
    } else {
        0
    };

    Ok(Some(Command::Trigger(action, minutes)))
}

#[cfg(not(feature = "interactive"))]
fn interactive_command() -> Result<Option<Command>> {
    Err(anyhow!(
        "No command given (interactive mode needs --features interactive)\n\n{USAGE}"
    ))
}

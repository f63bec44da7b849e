//! XEffect - build one habit in 21 days, one UTC check-in at a time.

mod cli;
mod config;
mod db;
mod logging;
mod milestone;
mod models;
mod service;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Command};
use config::{Config, MilestoneConfig};
use db::Database;
use milestone::{Messenger, MilestoneMessenger};
use models::HabitState;
use serde::Serialize;
use service::{HabitService, ServiceError};
use std::collections::HashSet;
use streak_engine::{compute_engine_state, CalendarDate, DateSource, EngineInput, FixedClock};
use tracing::warn;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = run(cli).await {
        if json {
            println!("{}", serde_json::to_string_pretty(&error_body(&err))?);
        } else {
            eprintln!("Error: {:#}", err);
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::load(),
    }
    .with_env();
    logging::init(&config.logging);

    // One date for the whole command, even across midnight.
    let today = cli.today.unwrap_or_else(CalendarDate::today_utc);

    if let Command::Engine { checkins, all_done } = &cli.command {
        let checkin_set: HashSet<_> = checkins.iter().copied().collect();
        let result = compute_engine_state(&EngineInput {
            today_utc: today,
            yesterday_utc: today.yesterday(),
            checkin_set: &checkin_set,
            all_done: *all_done,
        });
        return print_output(&result, cli.json, cli::render_engine);
    }

    let db_path = cli.db.clone().unwrap_or_else(|| config.database_path());
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let db = Database::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;
    let user = cli.user.clone().unwrap_or_else(|| config.user.id.clone());

    let service = HabitService::new(&db, FixedClock(today));
    let result = execute(&cli.command, &service, &user, &config.milestones).await;
    if let Err(err) = db.close() {
        warn!(error = %err, "failed to close database");
    }

    print_output(&result?, cli.json, cli::render_state)
}

/// Run a store-backed command for `user`.
async fn execute<C: DateSource>(
    command: &Command,
    service: &HabitService<'_, C>,
    user: &str,
    milestones: &MilestoneConfig,
) -> anyhow::Result<HabitState> {
    let state = match command {
        Command::Status => service.state_for_user(user)?,
        Command::Create { name } => service.create_habit(user, name)?,
        Command::Rename { name } => {
            service.rename_habit(user, service.current_habit_id(user)?, name)?
        }
        Command::Save => save(service, user, milestones).await?,
        Command::Publish { slug } => {
            service.set_public(user, service.current_habit_id(user)?, Some(slug))?
        }
        Command::Unpublish => service.set_public(user, service.current_habit_id(user)?, None)?,
        Command::Public { slug } => service.public_state(slug)?,
        Command::Engine { .. } => anyhow::bail!("the engine command does not use the database"),
    };
    Ok(state)
}

/// Save today's check-in, then ask for a milestone message if one was reached.
///
/// The check-in is already stored when the message is requested, so a failed
/// request only costs the message.
async fn save<C: DateSource>(
    service: &HabitService<'_, C>,
    user: &str,
    milestones: &MilestoneConfig,
) -> anyhow::Result<HabitState> {
    let habit_id = service.current_habit_id(user)?;
    let outcome = service.save_today(user, habit_id)?;
    let mut state = outcome.state;

    if let (Some(milestone), Some(habit)) = (outcome.milestone, &state.habit) {
        let reply = match Messenger::from_config(milestones) {
            Ok(messenger) => messenger.congratulate(&habit.name, milestone).await,
            Err(err) => Err(err),
        };
        match reply {
            Ok(message) => state.ai = message,
            Err(err) => warn!(error = %err, day = milestone.day(), "milestone message unavailable"),
        }
    }

    Ok(state)
}

fn print_output<T: Serialize>(value: &T, json: bool, render: fn(&T) -> String) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", render(value));
    }
    Ok(())
}

/// `{code, message}` body for a failed command.
fn error_body(err: &anyhow::Error) -> serde_json::Value {
    let code = err
        .downcast_ref::<ServiceError>()
        .map_or("SERVER_ERROR", ServiceError::code);
    serde_json::json!({ "code": code, "message": err.to_string() })
}

mod cli;
mod config;
mod db;
mod models;
mod reminders;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use rusqlite::Connection;

use cli::args::{Cli, Commands};
use cli::handlers;
use config::settings::NotificationBackend;
use config::AppConfig;
use db::migrations::run_migrations;
use models::PrayerFilter;
use reminders::{LocalPlatform, NotificationGateway, NotificationPlatform, NullPlatform, ReminderManager};

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config_path = AppConfig::config_path()?;
    let mut config = AppConfig::load_from(&config_path).context("Loading config")?;

    // Ensure data directory exists and open DB
    AppConfig::ensure_data_dir()?;
    let db_path = AppConfig::db_path()?;
    let conn = Connection::open(&db_path)
        .with_context(|| format!("Opening database at {:?}", db_path))?;

    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    run_migrations(&conn)?;

    let platform: Box<dyn NotificationPlatform + '_> = match config.notifications.backend {
        NotificationBackend::Local => {
            Box::new(LocalPlatform::new(&conn, config.notifications.enabled))
        }
        NotificationBackend::None => Box::new(NullPlatform),
    };
    let mut gateway = NotificationGateway::new(platform, config.notifications.sound.clone());
    gateway.initialize();
    let mut reminders = ReminderManager::new(gateway);

    match cli.command {
        Some(Commands::Add { title, description }) => {
            handlers::handle_add(&conn, &mut reminders, &config, &title, &description)?;
        }
        Some(Commands::List { answered, active }) => {
            let filter = if answered {
                PrayerFilter::Answered
            } else if active {
                PrayerFilter::Active
            } else {
                PrayerFilter::All
            };
            handlers::handle_list(&conn, filter)?;
        }
        Some(Commands::Show { id }) => {
            handlers::handle_show(&conn, &id)?;
        }
        Some(Commands::Edit { id, title, description }) => {
            handlers::handle_edit(
                &conn,
                &mut reminders,
                &config,
                &id,
                title.as_deref(),
                description.as_deref(),
            )?;
        }
        Some(Commands::Pray { id }) => {
            handlers::handle_pray(&conn, &id)?;
        }
        Some(Commands::Answer { id, reflection }) => {
            handlers::handle_answer(&conn, &mut reminders, &config, &id, reflection)?;
        }
        Some(Commands::Reopen { id }) => {
            handlers::handle_reopen(&conn, &mut reminders, &config, &id)?;
        }
        Some(Commands::Reflect { id, text }) => {
            handlers::handle_reflect(&conn, &id, &text)?;
        }
        Some(Commands::Delete { id }) => {
            handlers::handle_delete(&conn, &mut reminders, &config, &id)?;
        }
        Some(Commands::Remind { id, when }) => {
            handlers::handle_remind(&conn, &mut reminders, &id, &when)?;
        }
        Some(Commands::Forget { id }) => {
            handlers::handle_forget(&conn, &mut reminders, &id)?;
        }
        Some(Commands::Frequency { selector, hours }) => {
            handlers::handle_frequency(
                &conn,
                &mut reminders,
                &mut config,
                &config_path,
                selector.as_deref(),
                hours,
            )?;
        }
        Some(Commands::Reschedule) => {
            handlers::handle_reschedule(&conn, &mut reminders, &config)?;
        }
        Some(Commands::Pending) => {
            handlers::handle_pending(&conn, &config)?;
        }
        Some(Commands::Due) => {
            handlers::handle_due(&conn, &mut reminders, &config)?;
        }
        Some(Commands::Notifications { action }) => {
            handlers::handle_notifications(&conn, &mut reminders, &mut config, &config_path, &action)?;
        }
        Some(Commands::Export) => {
            handlers::handle_export(&conn)?;
        }

        // No subcommand → show the journal
        None => {
            handlers::handle_list(&conn, PrayerFilter::All)?;
        }
    }

    Ok(())
}

use anyhow::{anyhow, Result};
use chrono::{Local, Utc};
use log::{error, warn};
use rusqlite::Connection;
use std::path::Path;

use crate::cli::args::NotificationCommands;
use crate::config::settings::NotificationBackend;
use crate::config::AppConfig;
use crate::db::repository::{NotificationRepo, PrayerRepo};
use crate::models::{PrayerFilter, PrayerRequest};
use crate::reminders::frequency::{MAX_INTERVAL_HOURS, MIN_INTERVAL_HOURS};
use crate::reminders::{
    BatchOutcome, Frequency, Interval, LocalPlatform, NotificationPlatform, PermissionState,
    ReminderError, ReminderManager,
};
use crate::utils::format::{format_duration_secs, format_hours, format_local, pad_width, truncate_width};
use crate::utils::time::parse_when;

pub type Reminders<'c> = ReminderManager<Box<dyn NotificationPlatform + 'c>>;

// ─── ANSI helpers ────────────────────────────────────────────────────────────

macro_rules! println_colored {
    ($color:expr, $($arg:tt)*) => {{
        print!("{}", $color);
        print!($($arg)*);
        println!("\x1b[0m");
    }};
}

const GREEN: &str = "\x1b[32m";
const AMBER: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const INDIGO: &str = "\x1b[38;2;99;102;241m";

const TITLE_WIDTH: usize = 40;

// ─── Reminder feedback ───────────────────────────────────────────────────────

/// Rebuild the batch from the current prayer list. Failures are reported, not returned.
fn refresh_batch(conn: &Connection, reminders: &mut Reminders<'_>, config: &AppConfig) {
    let prayers = match PrayerRepo::all(conn) {
        Ok(p) => p,
        Err(e) => {
            error!("loading prayers for reminders failed: {:#}", e);
            println_colored!(RED, "  ✗ Could not load prayers to schedule reminders");
            return;
        }
    };
    let result = reminders.reschedule(
        &prayers,
        config.reminders.interval(),
        Utc::now(),
        &mut rand::thread_rng(),
    );
    report_batch(result);
}

fn report_batch(result: Result<BatchOutcome, ReminderError>) {
    match result {
        Ok(BatchOutcome::Scheduled { count, first_at, last_at }) => {
            println_colored!(
                DIM,
                "  ↻ {} reminders scheduled, next {} (through {})",
                count,
                format_local(&first_at),
                format_local(&last_at)
            );
        }
        Ok(BatchOutcome::Empty) => {
            println_colored!(DIM, "  ↻ No active prayers; reminders cleared");
        }
        Err(e) => report_reminder_error(&e, "schedule reminders"),
    }
}

fn report_reminder_error(e: &ReminderError, action: &str) {
    match e {
        ReminderError::PermissionDenied => {
            println_colored!(
                AMBER,
                "  ! Permission required: run `prompted notifications enable` to {}",
                action
            );
        }
        ReminderError::InvalidSchedule { at, .. } => {
            println_colored!(RED, "  ✗ {} is not in the future", format_local(at));
        }
        ReminderError::GatewayFailure(inner) => {
            warn!("failed to {}: {}", action, inner);
            println_colored!(RED, "  ✗ Failed to {}", action);
        }
    }
}

fn cancel_manual_quietly(reminders: &mut Reminders<'_>, prayer_id: &str) {
    if let Err(e) = reminders.cancel_manual(prayer_id) {
        report_reminder_error(&e, "cancel the reminder");
    }
}

// ─── Prayers ─────────────────────────────────────────────────────────────────

pub fn handle_add(
    conn: &Connection,
    reminders: &mut Reminders<'_>,
    config: &AppConfig,
    title: &str,
    description: &str,
) -> Result<()> {
    let prayer = PrayerRequest::new(title, description)?;
    PrayerRepo::insert(conn, &prayer)?;
    println_colored!(GREEN, "  ✓ Added \"{}\" ({})", prayer.title, prayer.short_id());
    refresh_batch(conn, reminders, config);
    Ok(())
}

pub fn handle_list(conn: &Connection, filter: PrayerFilter) -> Result<()> {
    let prayers: Vec<PrayerRequest> = PrayerRepo::all(conn)?
        .into_iter()
        .filter(|p| filter.matches(p))
        .collect();

    println!();
    if prayers.is_empty() {
        match filter {
            PrayerFilter::Answered => println_colored!(DIM, "  No answered prayers yet"),
            _ => {
                println_colored!(INDIGO, "  No prayers yet");
                println_colored!(DIM, "  Start with: prompted add \"<title>\"");
            }
        }
        println!();
        return Ok(());
    }

    println_colored!(INDIGO, "  Your prayer requests");
    println!();
    for p in &prayers {
        let title = pad_width(&truncate_width(&p.title, TITLE_WIDTH), TITLE_WIDTH);
        if p.is_answered {
            println_colored!(
                DIM,
                "  ✓ {}  {}  answered {}",
                p.short_id(),
                title,
                p.answered_date
                    .as_ref()
                    .map(format_local)
                    .unwrap_or_default()
            );
        } else {
            println!("  ○ {}  {}  prayed {}×", p.short_id(), title, p.notification_count);
        }
    }
    println!();
    Ok(())
}

pub fn handle_show(conn: &Connection, id: &str) -> Result<()> {
    let p = PrayerRepo::find(conn, id)?;
    println!();
    println_colored!(BOLD, "  {}", p.title);
    if !p.description.is_empty() {
        println!("  {}", p.description);
    }
    println!();
    println_colored!(DIM, "  id        {}", p.id);
    println_colored!(DIM, "  added     {}", format_local(&p.created_at));
    println_colored!(DIM, "  prayed    {} times", p.notification_count);
    if let Some(last) = &p.last_notification_date {
        println_colored!(DIM, "  last      {}", format_local(last));
    }
    if p.is_answered {
        if let Some(at) = &p.answered_date {
            println_colored!(GREEN, "  answered  {}", format_local(at));
        }
        if let Some(r) = &p.reflection {
            println!();
            println_colored!(INDIGO, "  Reflection");
            println!("  {}", r);
        }
    }
    println!();
    Ok(())
}

pub fn handle_edit(
    conn: &Connection,
    reminders: &mut Reminders<'_>,
    config: &AppConfig,
    id: &str,
    title: Option<&str>,
    description: Option<&str>,
) -> Result<()> {
    if title.is_none() && description.is_none() {
        return Err(anyhow!("Nothing to change; pass --title and/or --description"));
    }
    let mut p = PrayerRepo::find(conn, id)?;
    if let Some(t) = title {
        let t = t.trim();
        if t.is_empty() {
            return Err(anyhow!("A prayer request needs a title"));
        }
        p.title = t.to_string();
    }
    if let Some(d) = description {
        p.description = d.trim().to_string();
    }
    PrayerRepo::update(conn, &p)?;
    println_colored!(GREEN, "  ✓ Updated \"{}\"", p.title);
    // reminder text is copied at schedule time
    if p.is_active() {
        refresh_batch(conn, reminders, config);
    }
    Ok(())
}

pub fn handle_pray(conn: &Connection, id: &str) -> Result<()> {
    let mut p = PrayerRepo::find(conn, id)?;
    p.record_prayer(Utc::now());
    PrayerRepo::update(conn, &p)?;
    println_colored!(
        GREEN,
        "  🙏 Prayed for \"{}\" ({} times)",
        p.title,
        p.notification_count
    );
    Ok(())
}

pub fn handle_answer(
    conn: &Connection,
    reminders: &mut Reminders<'_>,
    config: &AppConfig,
    id: &str,
    reflection: Option<String>,
) -> Result<()> {
    let mut p = PrayerRepo::find(conn, id)?;
    if !p.mark_answered(Utc::now(), reflection) {
        println_colored!(DIM, "  \"{}\" is already answered", p.title);
        return Ok(());
    }
    PrayerRepo::update(conn, &p)?;
    println_colored!(GREEN, "  ✓ \"{}\" marked as answered", p.title);

    let prayers = PrayerRepo::all(conn)?;
    let result = reminders.prayer_answered(
        &p.id,
        &prayers,
        config.reminders.interval(),
        Utc::now(),
        &mut rand::thread_rng(),
    );
    report_batch(result);
    Ok(())
}

pub fn handle_reopen(
    conn: &Connection,
    reminders: &mut Reminders<'_>,
    config: &AppConfig,
    id: &str,
) -> Result<()> {
    let mut p = PrayerRepo::find(conn, id)?;
    if !p.reopen() {
        println_colored!(DIM, "  \"{}\" is still active", p.title);
        return Ok(());
    }
    PrayerRepo::update(conn, &p)?;
    println_colored!(AMBER, "  ○ \"{}\" is active again", p.title);
    refresh_batch(conn, reminders, config);
    Ok(())
}

pub fn handle_reflect(conn: &Connection, id: &str, text: &str) -> Result<()> {
    let mut p = PrayerRepo::find(conn, id)?;
    if !p.is_answered {
        return Err(anyhow!(
            "\"{}\" is not answered yet; reflections belong to answered prayers",
            p.title
        ));
    }
    let text = text.trim();
    p.reflection = (!text.is_empty()).then(|| text.to_string());
    PrayerRepo::update(conn, &p)?;
    println_colored!(GREEN, "  ✓ Reflection saved for \"{}\"", p.title);
    Ok(())
}

pub fn handle_delete(
    conn: &Connection,
    reminders: &mut Reminders<'_>,
    config: &AppConfig,
    id: &str,
) -> Result<()> {
    let p = PrayerRepo::find(conn, id)?;
    PrayerRepo::delete(conn, &p.id)?;
    println_colored!(RED, "  ✗ Deleted \"{}\"", p.title);
    cancel_manual_quietly(reminders, &p.id);
    if p.is_active() {
        refresh_batch(conn, reminders, config);
    }
    Ok(())
}

// ─── Reminders ───────────────────────────────────────────────────────────────

pub fn handle_remind(
    conn: &Connection,
    reminders: &mut Reminders<'_>,
    id: &str,
    when: &str,
) -> Result<()> {
    let p = PrayerRepo::find(conn, id)?;
    if p.is_answered {
        return Err(anyhow!("\"{}\" is already answered", p.title));
    }
    let now = Local::now();
    let at = parse_when(when, &now)?;

    match reminders.schedule_manual(&p.id, &p.title, &p.description, at, now.with_timezone(&Utc)) {
        Ok(spec) => {
            let secs = (spec.fire_at - Utc::now()).num_seconds();
            println_colored!(
                GREEN,
                "  ✓ Reminder set: you'll be reminded to pray for \"{}\" {} (in {})",
                p.title,
                format_local(&spec.fire_at),
                format_duration_secs(secs)
            );
        }
        Err(e) => report_reminder_error(&e, "schedule the reminder"),
    }
    Ok(())
}

pub fn handle_forget(conn: &Connection, reminders: &mut Reminders<'_>, id: &str) -> Result<()> {
    let p = PrayerRepo::find(conn, id)?;
    match reminders.cancel_manual(&p.id) {
        Ok(_) => println_colored!(GREEN, "  ✓ Reminder for \"{}\" cancelled", p.title),
        Err(e) => report_reminder_error(&e, "cancel the reminder"),
    }
    Ok(())
}

pub fn handle_frequency(
    conn: &Connection,
    reminders: &mut Reminders<'_>,
    config: &mut AppConfig,
    config_path: &Path,
    selector: Option<&str>,
    hours: Option<f64>,
) -> Result<()> {
    let Some(selector) = selector else {
        println!();
        println_colored!(INDIGO, "  Reminder frequency");
        println!();
        for f in Frequency::all() {
            let marker = if f == config.reminders.frequency { "●" } else { "○" };
            let detail = match f {
                Frequency::Custom => config
                    .reminders
                    .custom_hours
                    .map(format_hours)
                    .unwrap_or_else(|| "--hours N".to_string()),
                _ => format_hours(f.interval(None).hours()),
            };
            println!("  {} {:<8}  {:<18}  {}", marker, f.as_str(), f.display_name(), detail);
        }
        println!();
        return Ok(());
    };

    let frequency: Frequency = selector.parse()?;
    if frequency == Frequency::Custom {
        let h = hours
            .or(config.reminders.custom_hours)
            .ok_or_else(|| anyhow!("The custom frequency needs --hours"))?;
        let interval = Interval::from_hours(h).ok_or_else(|| {
            anyhow!(
                "--hours must be between {} and {}",
                format_hours(MIN_INTERVAL_HOURS),
                format_hours(MAX_INTERVAL_HOURS)
            )
        })?;
        config.reminders.custom_hours = Some(interval.hours());
    } else if hours.is_some() {
        return Err(anyhow!("--hours only applies to the custom frequency"));
    }
    config.reminders.frequency = frequency;
    config.save_to(config_path)?;

    println_colored!(
        GREEN,
        "  ✓ Reminders every {}",
        format_hours(config.reminders.interval().hours())
    );
    refresh_batch(conn, reminders, config);
    Ok(())
}

pub fn handle_reschedule(
    conn: &Connection,
    reminders: &mut Reminders<'_>,
    config: &AppConfig,
) -> Result<()> {
    refresh_batch(conn, reminders, config);
    Ok(())
}

pub fn handle_pending(conn: &Connection, config: &AppConfig) -> Result<()> {
    println!();
    if config.notifications.backend == NotificationBackend::None {
        println_colored!(DIM, "  Notifications are not available with the 'none' backend");
        println!();
        return Ok(());
    }
    let pending = NotificationRepo::pending(conn)?;
    if pending.is_empty() {
        println_colored!(DIM, "  No reminders pending");
        println!();
        return Ok(());
    }
    println_colored!(INDIGO, "  Pending reminders ({})", pending.len());
    println!();
    let now = Utc::now();
    for n in &pending {
        let kind = if n.extra.is_scheduled_reminder { "random" } else { "set" };
        println!(
            "  {}  {:<8}  {:<6}  {}",
            format_local(&n.schedule.at),
            format_duration_secs((n.schedule.at - now).num_seconds()),
            kind,
            truncate_width(&n.title, 50)
        );
    }
    println!();
    Ok(())
}

pub fn handle_due(
    conn: &Connection,
    reminders: &mut Reminders<'_>,
    config: &AppConfig,
) -> Result<()> {
    if config.notifications.backend == NotificationBackend::None {
        println_colored!(DIM, "  Notifications are not available with the 'none' backend");
        return Ok(());
    }
    let due = NotificationRepo::take_due(conn, &Utc::now())?;
    if due.is_empty() {
        println_colored!(DIM, "  Nothing due");
    }
    for n in &due {
        println_colored!(BOLD, "  🔔 {}", n.title);
        println!("     {}", n.body);
        let short: String = n.extra.prayer_id.chars().take(8).collect();
        println_colored!(DIM, "     prompted pray {}", short);
    }

    // top the batch back up once every random reminder has fired
    let any_batch_left = NotificationRepo::pending(conn)?
        .iter()
        .any(|n| n.id.is_batch());
    if !any_batch_left && PrayerRepo::count_active(conn)? > 0 {
        refresh_batch(conn, reminders, config);
    }
    Ok(())
}

pub fn handle_notifications(
    conn: &Connection,
    reminders: &mut Reminders<'_>,
    config: &mut AppConfig,
    config_path: &Path,
    action: &NotificationCommands,
) -> Result<()> {
    match action {
        NotificationCommands::Enable => {
            config.notifications.enabled = true;
            config.save_to(config_path)?;
            if config.notifications.backend == NotificationBackend::Local {
                LocalPlatform::store_permission(conn, PermissionState::Granted)?;
            }
            reminders.gateway_mut().refresh_permission();
            println_colored!(GREEN, "  ✓ Notifications enabled");
            refresh_batch(conn, reminders, config);
        }
        NotificationCommands::Disable => {
            match reminders.clear_batch() {
                Ok(()) => println_colored!(DIM, "  ↻ Random reminders cleared"),
                Err(e) => report_reminder_error(&e, "clear reminders"),
            }
            config.notifications.enabled = false;
            config.save_to(config_path)?;
            if config.notifications.backend == NotificationBackend::Local {
                LocalPlatform::store_permission(conn, PermissionState::Denied)?;
            }
            reminders.gateway_mut().refresh_permission();
            println_colored!(AMBER, "  Notifications disabled");
        }
        NotificationCommands::Status => {
            let permission = reminders.gateway_mut().refresh_permission();
            println!();
            match permission {
                PermissionState::Granted => println_colored!(GREEN, "  Permission  granted"),
                PermissionState::Denied => println_colored!(AMBER, "  Permission  denied"),
            }
            let backend = match config.notifications.backend {
                NotificationBackend::Local => "local",
                NotificationBackend::None => "none",
            };
            println!("  Backend     {}", backend);
            println!(
                "  Frequency   {} ({})",
                config.reminders.frequency.display_name(),
                format_hours(config.reminders.interval().hours())
            );
            if reminders.gateway().is_native() {
                println!("  Pending     {}", NotificationRepo::pending(conn)?.len());
            }
            println!();
        }
    }
    Ok(())
}

// ─── Export ──────────────────────────────────────────────────────────────────

pub fn handle_export(conn: &Connection) -> Result<()> {
    let prayers = PrayerRepo::all(conn)?;
    println!("{}", serde_json::to_string_pretty(&prayers)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use crate::models::ReminderId;
    use crate::reminders::gateway::LocalNotification;
    use crate::reminders::NotificationGateway;
    use chrono::Duration;
    use tempfile::TempDir;

    fn db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn reminders(conn: &Connection, enabled: bool) -> Reminders<'_> {
        let platform: Box<dyn NotificationPlatform + '_> =
            Box::new(LocalPlatform::new(conn, enabled));
        let mut gateway = NotificationGateway::new(platform, None);
        gateway.initialize();
        ReminderManager::new(gateway)
    }

    fn batch_rows(conn: &Connection) -> Vec<LocalNotification> {
        NotificationRepo::pending(conn)
            .unwrap()
            .into_iter()
            .filter(|n| n.id.is_batch())
            .collect()
    }

    fn prayer_id(conn: &Connection, title: &str) -> String {
        PrayerRepo::all(conn)
            .unwrap()
            .into_iter()
            .find(|p| p.title == title)
            .map(|p| p.id)
            .unwrap()
    }

    #[test]
    fn adding_a_prayer_schedules_a_batch() {
        let conn = db();
        let mut r = reminders(&conn, true);
        let config = AppConfig::default();

        handle_add(&conn, &mut r, &config, "family", "").unwrap();
        let family = prayer_id(&conn, "family");
        let rows = batch_rows(&conn);
        assert_eq!(rows.len(), 20);
        assert!(rows.iter().all(|n| n.extra.prayer_id == family));

        handle_add(&conn, &mut r, &config, "work", "").unwrap();
        assert_eq!(batch_rows(&conn).len(), 20);
    }

    #[test]
    fn answering_drops_its_manual_reminder_and_replans() {
        let conn = db();
        let mut r = reminders(&conn, true);
        let config = AppConfig::default();
        handle_add(&conn, &mut r, &config, "family", "").unwrap();
        handle_add(&conn, &mut r, &config, "work", "").unwrap();
        let (family, work) = (prayer_id(&conn, "family"), prayer_id(&conn, "work"));
        handle_remind(&conn, &mut r, &family, "+2h").unwrap();
        handle_remind(&conn, &mut r, &work, "+3h").unwrap();

        handle_answer(&conn, &mut r, &config, &family, None).unwrap();

        let pending = NotificationRepo::pending(&conn).unwrap();
        assert!(pending.iter().all(|n| n.id != ReminderId::for_prayer(&family)));
        assert!(pending.iter().any(|n| n.id == ReminderId::for_prayer(&work)));
        let rows = batch_rows(&conn);
        assert_eq!(rows.len(), 20);
        assert!(rows.iter().all(|n| n.extra.prayer_id == work));
    }

    #[test]
    fn reopening_brings_the_prayer_back_into_the_batch() {
        let conn = db();
        let mut r = reminders(&conn, true);
        let config = AppConfig::default();
        handle_add(&conn, &mut r, &config, "health", "").unwrap();
        let health = prayer_id(&conn, "health");

        handle_answer(&conn, &mut r, &config, &health, Some("Recovered".into())).unwrap();
        assert!(NotificationRepo::pending(&conn).unwrap().is_empty());

        handle_reopen(&conn, &mut r, &config, &health).unwrap();
        let rows = batch_rows(&conn);
        assert_eq!(rows.len(), 20);
        assert!(rows.iter().all(|n| n.extra.prayer_id == health));
    }

    #[test]
    fn deleting_the_last_prayer_clears_everything() {
        let conn = db();
        let mut r = reminders(&conn, true);
        let config = AppConfig::default();
        handle_add(&conn, &mut r, &config, "exams", "").unwrap();
        let exams = prayer_id(&conn, "exams");
        handle_remind(&conn, &mut r, &exams, "+1d").unwrap();

        handle_delete(&conn, &mut r, &config, &exams).unwrap();
        assert!(NotificationRepo::pending(&conn).unwrap().is_empty());
    }

    #[test]
    fn frequency_change_respaces_the_batch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let conn = db();
        let mut r = reminders(&conn, true);
        let mut config = AppConfig::default();
        handle_add(&conn, &mut r, &config, "family", "").unwrap();

        handle_frequency(&conn, &mut r, &mut config, &path, Some("15-mins"), None).unwrap();

        let rows = batch_rows(&conn);
        assert_eq!(rows.len(), 20);
        for pair in rows.windows(2) {
            assert_eq!(pair[1].schedule.at - pair[0].schedule.at, Duration::minutes(15));
        }
        let saved = AppConfig::load_from(&path).unwrap();
        assert_eq!(saved.reminders.frequency, Frequency::FifteenMins);
    }

    #[test]
    fn out_of_range_custom_hours_are_refused() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let conn = db();
        let mut r = reminders(&conn, true);
        let mut config = AppConfig::default();

        assert!(handle_frequency(&conn, &mut r, &mut config, &path, Some("custom"), Some(1e9)).is_err());
        assert!(handle_frequency(&conn, &mut r, &mut config, &path, Some("custom"), Some(1e-9)).is_err());
        assert_eq!(config.reminders.frequency, Frequency::OneHour);
        assert!(config.reminders.custom_hours.is_none());
        assert!(!path.exists());
    }

    #[test]
    fn due_tops_up_an_exhausted_batch() {
        let conn = db();
        let mut r = reminders(&conn, true);
        let config = AppConfig::default();
        handle_add(&conn, &mut r, &config, "family", "").unwrap();
        r.clear_batch().unwrap();
        assert!(batch_rows(&conn).is_empty());

        handle_due(&conn, &mut r, &config).unwrap();
        assert_eq!(batch_rows(&conn).len(), 20);
    }

    #[test]
    fn enabling_notifications_schedules_what_was_refused() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let conn = db();
        let mut r = reminders(&conn, false);
        let mut config = AppConfig::default();
        config.notifications.enabled = false;

        handle_add(&conn, &mut r, &config, "family", "").unwrap();
        assert!(NotificationRepo::pending(&conn).unwrap().is_empty());

        handle_notifications(&conn, &mut r, &mut config, &path, &NotificationCommands::Enable)
            .unwrap();
        assert_eq!(batch_rows(&conn).len(), 20);

        handle_notifications(&conn, &mut r, &mut config, &path, &NotificationCommands::Disable)
            .unwrap();
        assert!(batch_rows(&conn).is_empty());
        assert_eq!(r.gateway().check_permission(), PermissionState::Denied);
    }
}

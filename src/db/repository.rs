use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::{PrayerRequest, ReminderId};
use crate::reminders::PlatformError;
use crate::reminders::gateway::{LocalNotification, NotificationExtra, NotificationSchedule};

/// Fixed-width UTC timestamps so that text order is time order.
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| anyhow!("Bad timestamp '{}': {}", s, e))
}

fn parse_opt_ts(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_ts).transpose()
}

// ─── Prayer repo ─────────────────────────────────────────────────────────────

type PrayerRow = (
    String,
    String,
    String,
    i32,
    Option<String>,
    Option<String>,
    u32,
    Option<String>,
    String,
);

const PRAYER_COLUMNS: &str = "id, title, description, is_answered, answered_date, reflection,
     notification_count, last_notification_date, created_at";

fn read_prayer_row(row: &Row<'_>) -> rusqlite::Result<PrayerRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn prayer_from_row(raw: PrayerRow) -> Result<PrayerRequest> {
    let (
        id,
        title,
        description,
        is_answered,
        answered_date,
        reflection,
        notification_count,
        last_notification_date,
        created_at,
    ) = raw;
    Ok(PrayerRequest {
        id,
        title,
        description,
        is_answered: is_answered != 0,
        answered_date: parse_opt_ts(answered_date)?,
        reflection,
        notification_count,
        last_notification_date: parse_opt_ts(last_notification_date)?,
        created_at: parse_ts(&created_at)?,
    })
}

pub struct PrayerRepo;

impl PrayerRepo {
    /// All prayers, active first, newest first within each group.
    pub fn all(conn: &Connection) -> Result<Vec<PrayerRequest>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM prayer_requests ORDER BY is_answered, created_at DESC",
            PRAYER_COLUMNS
        ))?;
        let rows = stmt.query_map([], read_prayer_row)?;

        let mut result = Vec::new();
        for r in rows {
            result.push(prayer_from_row(r?)?);
        }
        Ok(result)
    }

    pub fn get(conn: &Connection, id: &str) -> Result<Option<PrayerRequest>> {
        let row = conn
            .query_row(
                &format!("SELECT {} FROM prayer_requests WHERE id = ?1", PRAYER_COLUMNS),
                params![id],
                read_prayer_row,
            )
            .optional()?;
        row.map(prayer_from_row).transpose()
    }

    /// Resolve a full id or a unique prefix of one.
    pub fn find(conn: &Connection, id_or_prefix: &str) -> Result<PrayerRequest> {
        let needle = id_or_prefix.trim();
        if needle.is_empty() {
            return Err(anyhow!("No prayer id given"));
        }
        if let Some(p) = Self::get(conn, needle)? {
            return Ok(p);
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM prayer_requests WHERE substr(id, 1, ?2) = ?1 LIMIT 2",
            PRAYER_COLUMNS
        ))?;
        let mut rows = stmt
            .query_map(params![needle, needle.len() as i64], read_prayer_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        if rows.len() > 1 {
            return Err(anyhow!("'{}' matches more than one prayer; use more characters", needle));
        }
        rows.pop()
            .map(prayer_from_row)
            .unwrap_or_else(|| Err(anyhow!("No prayer matches '{}'", needle)))
    }

    pub fn insert(conn: &Connection, prayer: &PrayerRequest) -> Result<()> {
        conn.execute(
            "INSERT INTO prayer_requests
                (id, title, description, is_answered, answered_date, reflection,
                 notification_count, last_notification_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                prayer.id,
                prayer.title,
                prayer.description,
                prayer.is_answered as i32,
                prayer.answered_date.as_ref().map(format_ts),
                prayer.reflection,
                prayer.notification_count,
                prayer.last_notification_date.as_ref().map(format_ts),
                format_ts(&prayer.created_at),
            ],
        )
        .with_context(|| format!("Saving prayer '{}'", prayer.title))?;
        Ok(())
    }

    /// Write back every mutable field. `created_at` never changes.
    pub fn update(conn: &Connection, prayer: &PrayerRequest) -> Result<()> {
        let changed = conn.execute(
            "UPDATE prayer_requests SET
                title = ?2, description = ?3, is_answered = ?4, answered_date = ?5,
                reflection = ?6, notification_count = ?7, last_notification_date = ?8
             WHERE id = ?1",
            params![
                prayer.id,
                prayer.title,
                prayer.description,
                prayer.is_answered as i32,
                prayer.answered_date.as_ref().map(format_ts),
                prayer.reflection,
                prayer.notification_count,
                prayer.last_notification_date.as_ref().map(format_ts),
            ],
        )?;
        if changed == 0 {
            return Err(anyhow!("Prayer {} no longer exists", prayer.id));
        }
        Ok(())
    }

    pub fn delete(conn: &Connection, id: &str) -> Result<bool> {
        let changed = conn.execute("DELETE FROM prayer_requests WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    pub fn count_active(conn: &Connection) -> Result<i64> {
        conn.query_row(
            "SELECT COUNT(*) FROM prayer_requests WHERE is_answered = 0",
            [],
            |row| row.get(0),
        )
        .map_err(anyhow::Error::from)
    }
}

// ─── Scheduled notifications ─────────────────────────────────────────────────

type NotificationRow = (i32, String, String, String, Option<String>, String);

fn read_notification_row(row: &Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn notification_from_row(raw: NotificationRow) -> Result<LocalNotification> {
    let (id, title, body, fire_at, sound, extra) = raw;
    let extra: NotificationExtra =
        serde_json::from_str(&extra).with_context(|| format!("Decoding extra of notification {}", id))?;
    Ok(LocalNotification {
        id: ReminderId(id),
        title,
        body,
        schedule: NotificationSchedule {
            at: parse_ts(&fire_at)?,
        },
        sound,
        extra,
    })
}

/// Pending set of the local notification scheduler.
pub struct NotificationRepo;

impl NotificationRepo {
    /// Insert or replace by id, mirroring how platform schedulers treat a reused id.
    pub fn upsert(conn: &Connection, notification: &LocalNotification) -> Result<(), PlatformError> {
        let extra = serde_json::to_string(&notification.extra)?;
        conn.execute(
            "INSERT INTO scheduled_notifications (id, title, body, fire_at, sound, extra)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                title = ?2, body = ?3, fire_at = ?4, sound = ?5, extra = ?6",
            params![
                notification.id.0,
                notification.title,
                notification.body,
                format_ts(&notification.schedule.at),
                notification.sound,
                extra,
            ],
        )?;
        Ok(())
    }

    pub fn delete(conn: &Connection, id: ReminderId) -> rusqlite::Result<usize> {
        conn.execute("DELETE FROM scheduled_notifications WHERE id = ?1", params![id.0])
    }

    pub fn pending(conn: &Connection) -> Result<Vec<LocalNotification>> {
        let mut stmt = conn.prepare(
            "SELECT id, title, body, fire_at, sound, extra
             FROM scheduled_notifications ORDER BY fire_at, id",
        )?;
        let rows = stmt.query_map([], read_notification_row)?;

        let mut result = Vec::new();
        for r in rows {
            result.push(notification_from_row(r?)?);
        }
        Ok(result)
    }

    /// Remove and return every notification due at or before `now`.
    pub fn take_due(conn: &Connection, now: &DateTime<Utc>) -> Result<Vec<LocalNotification>> {
        let tx = conn.unchecked_transaction()?;
        let cutoff = format_ts(now);
        let due = {
            let mut stmt = tx.prepare(
                "SELECT id, title, body, fire_at, sound, extra
                 FROM scheduled_notifications WHERE fire_at <= ?1 ORDER BY fire_at, id",
            )?;
            let rows = stmt
                .query_map(params![cutoff], read_notification_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter()
                .map(notification_from_row)
                .collect::<Result<Vec<_>>>()?
        };
        tx.execute(
            "DELETE FROM scheduled_notifications WHERE fire_at <= ?1",
            params![cutoff],
        )?;
        tx.commit()?;
        Ok(due)
    }
}

// ─── App meta ────────────────────────────────────────────────────────────────

pub struct MetaRepo;

impl MetaRepo {
    pub fn get(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
        conn.query_row(
            "SELECT value FROM app_meta WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
    }

    pub fn set(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO app_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }
}

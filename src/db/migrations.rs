use anyhow::Result;
use rusqlite::Connection;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch("
        CREATE TABLE IF NOT EXISTS prayer_requests (
            id                      TEXT PRIMARY KEY,
            title                   TEXT NOT NULL CHECK(length(trim(title)) > 0),
            description             TEXT NOT NULL DEFAULT '',
            is_answered             INTEGER NOT NULL DEFAULT 0,
            answered_date           TEXT,
            reflection              TEXT,
            notification_count      INTEGER NOT NULL DEFAULT 0,
            last_notification_date  TEXT,
            created_at              TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS scheduled_notifications (
            id       INTEGER PRIMARY KEY,
            title    TEXT NOT NULL,
            body     TEXT NOT NULL,
            fire_at  TEXT NOT NULL,
            sound    TEXT,
            extra    TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_scheduled_fire_at
            ON scheduled_notifications(fire_at);

        CREATE TABLE IF NOT EXISTS app_meta (
            key   TEXT PRIMARY KEY,
            value TEXT
        );
    ")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('prayer_requests', 'scheduled_notifications', 'app_meta')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }
}

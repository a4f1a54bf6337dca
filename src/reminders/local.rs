use log::debug;
use rusqlite::Connection;

use crate::db::repository::{MetaRepo, NotificationRepo};
use crate::reminders::error::PlatformError;
use crate::reminders::gateway::{CancelOptions, NotificationPlatform, PermissionState, ScheduleOptions};

const PERMISSION_KEY: &str = "notification_permission";

/// Notification scheduler backed by the app database.
///
/// Pending notifications live in `scheduled_notifications` until `prompted due`
/// delivers them. Permission is the user's `notifications.enabled` choice,
/// recorded in `app_meta` when requested.
pub struct LocalPlatform<'c> {
    conn: &'c Connection,
    enabled: bool,
}

impl<'c> LocalPlatform<'c> {
    pub fn new(conn: &'c Connection, enabled: bool) -> Self {
        Self { conn, enabled }
    }

    /// Record a permission decision made outside the request flow.
    pub fn store_permission(conn: &Connection, state: PermissionState) -> Result<(), PlatformError> {
        MetaRepo::set(conn, PERMISSION_KEY, state.as_str())?;
        Ok(())
    }
}

impl NotificationPlatform for LocalPlatform<'_> {
    fn request_permission(&mut self) -> Result<PermissionState, PlatformError> {
        let state = if self.enabled {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        };
        Self::store_permission(self.conn, state)?;
        Ok(state)
    }

    fn check_permission(&self) -> Result<PermissionState, PlatformError> {
        let stored = MetaRepo::get(self.conn, PERMISSION_KEY)?;
        Ok(match stored.as_deref() {
            Some("granted") => PermissionState::Granted,
            _ => PermissionState::Denied,
        })
    }

    fn schedule(&mut self, options: &ScheduleOptions) -> Result<(), PlatformError> {
        let tx = self.conn.unchecked_transaction()?;
        for n in &options.notifications {
            NotificationRepo::upsert(&tx, n)?;
        }
        tx.commit()?;
        debug!("stored {} pending notifications", options.notifications.len());
        Ok(())
    }

    fn cancel(&mut self, options: &CancelOptions) -> Result<(), PlatformError> {
        let tx = self.conn.unchecked_transaction()?;
        let mut removed = 0;
        for n in &options.notifications {
            removed += NotificationRepo::delete(&tx, n.id)?;
        }
        tx.commit()?;
        debug!("removed {} of {} pending notifications", removed, options.notifications.len());
        Ok(())
    }
}

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{ReminderId, ReminderSpec};
use crate::reminders::error::PlatformError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
}

impl PermissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionState::Granted => "granted",
            PermissionState::Denied => "denied",
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionState::Granted)
    }
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ─── Platform wire format ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleOptions {
    pub notifications: Vec<LocalNotification>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalNotification {
    pub id: ReminderId,
    pub title: String,
    pub body: String,
    pub schedule: NotificationSchedule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    pub extra: NotificationExtra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationSchedule {
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationExtra {
    pub prayer_id: String,
    pub is_scheduled_reminder: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelOptions {
    pub notifications: Vec<NotificationRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NotificationRef {
    pub id: ReminderId,
}

impl LocalNotification {
    fn from_spec(spec: &ReminderSpec, sound: Option<&str>) -> Self {
        Self {
            id: spec.id,
            title: spec.title.clone(),
            body: spec.body.clone(),
            schedule: NotificationSchedule { at: spec.fire_at },
            sound: sound.map(str::to_string),
            extra: NotificationExtra {
                prayer_id: spec.payload.prayer_id.clone(),
                is_scheduled_reminder: spec.payload.is_batch_reminder,
            },
        }
    }
}

// ─── Platform seam ──────────────────────────────────────────────────────────

/// The system facility that actually holds and fires notifications.
pub trait NotificationPlatform {
    /// False on runtimes with no notification facility at all.
    fn is_native(&self) -> bool {
        true
    }
    fn request_permission(&mut self) -> Result<PermissionState, PlatformError>;
    fn check_permission(&self) -> Result<PermissionState, PlatformError>;
    fn schedule(&mut self, options: &ScheduleOptions) -> Result<(), PlatformError>;
    fn cancel(&mut self, options: &CancelOptions) -> Result<(), PlatformError>;
}

impl<P: NotificationPlatform + ?Sized> NotificationPlatform for Box<P> {
    fn is_native(&self) -> bool {
        (**self).is_native()
    }
    fn request_permission(&mut self) -> Result<PermissionState, PlatformError> {
        (**self).request_permission()
    }
    fn check_permission(&self) -> Result<PermissionState, PlatformError> {
        (**self).check_permission()
    }
    fn schedule(&mut self, options: &ScheduleOptions) -> Result<(), PlatformError> {
        (**self).schedule(options)
    }
    fn cancel(&mut self, options: &CancelOptions) -> Result<(), PlatformError> {
        (**self).cancel(options)
    }
}

/// Runtime without notifications. Never reached by the gateway's write path.
pub struct NullPlatform;

impl NotificationPlatform for NullPlatform {
    fn is_native(&self) -> bool {
        false
    }
    fn request_permission(&mut self) -> Result<PermissionState, PlatformError> {
        Ok(PermissionState::Granted)
    }
    fn check_permission(&self) -> Result<PermissionState, PlatformError> {
        Ok(PermissionState::Granted)
    }
    fn schedule(&mut self, _options: &ScheduleOptions) -> Result<(), PlatformError> {
        Ok(())
    }
    fn cancel(&mut self, _options: &CancelOptions) -> Result<(), PlatformError> {
        Ok(())
    }
}

// ─── Gateway ────────────────────────────────────────────────────────────────

/// Adapter between reminder specs and a [`NotificationPlatform`].
///
/// Built once per process and passed to whoever needs it. On a non-native
/// platform every call succeeds without doing anything.
pub struct NotificationGateway<P> {
    platform: P,
    sound: Option<String>,
    initialized: bool,
    permission: Option<PermissionState>,
}

impl<P: NotificationPlatform> NotificationGateway<P> {
    pub fn new(platform: P, sound: Option<String>) -> Self {
        Self {
            platform,
            sound,
            initialized: false,
            permission: None,
        }
    }

    /// Ask for permission once and remember the answer. Failures are logged
    /// and leave the gateway uninitialized so a later call can try again.
    pub fn initialize(&mut self) {
        if self.initialized || !self.platform.is_native() {
            return;
        }
        match self.platform.request_permission() {
            Ok(state) => {
                info!("notification permission: {}", state);
                self.permission = Some(state);
                self.initialized = true;
            }
            Err(e) => error!("requesting notification permission failed: {}", e),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_native(&self) -> bool {
        self.platform.is_native()
    }

    /// Permission as of the last request or refresh, asking the platform
    /// only when nothing is known yet.
    pub fn check_permission(&self) -> PermissionState {
        if !self.platform.is_native() {
            return PermissionState::Granted;
        }
        self.permission.unwrap_or_else(|| self.query_permission())
    }

    /// Re-read permission from the platform, e.g. after the user changed it.
    pub fn refresh_permission(&mut self) -> PermissionState {
        if !self.platform.is_native() {
            return PermissionState::Granted;
        }
        let state = self.query_permission();
        self.permission = Some(state);
        state
    }

    fn query_permission(&self) -> PermissionState {
        self.platform.check_permission().unwrap_or_else(|e| {
            warn!("checking notification permission failed: {}", e);
            PermissionState::Denied
        })
    }

    pub fn schedule_many(&mut self, specs: &[ReminderSpec]) -> Result<(), PlatformError> {
        if !self.platform.is_native() {
            debug!("no notification platform, skipping {} reminders", specs.len());
            return Ok(());
        }
        if specs.is_empty() {
            return Ok(());
        }
        let options = ScheduleOptions {
            notifications: specs
                .iter()
                .map(|s| LocalNotification::from_spec(s, self.sound.as_deref()))
                .collect(),
        };
        self.platform.schedule(&options)?;
        debug!("scheduled {} notifications", specs.len());
        Ok(())
    }

    pub fn cancel_many(&mut self, ids: &[ReminderId]) -> Result<(), PlatformError> {
        if !self.platform.is_native() || ids.is_empty() {
            return Ok(());
        }
        let options = CancelOptions {
            notifications: ids.iter().map(|&id| NotificationRef { id }).collect(),
        };
        self.platform.cancel(&options)?;
        debug!("cancelled {} notification ids", ids.len());
        Ok(())
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    #[cfg(test)]
    pub(crate) fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }
}

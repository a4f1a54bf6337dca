use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failures raised by a notification platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("notification store error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("could not encode notification payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("notification platform unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ReminderError {
    #[error("notifications are not permitted; enable them and try again")]
    PermissionDenied,
    #[error("reminder time {at} is not after {now}")]
    InvalidSchedule {
        at: DateTime<Utc>,
        now: DateTime<Utc>,
    },
    #[error("notification platform call failed: {0}")]
    GatewayFailure(#[from] PlatformError),
}

//! Reminder scheduling: frequency table, batch planner, lifecycle manager and
//! the gateway to the notification platform.

pub mod error;
pub mod frequency;
pub mod gateway;
pub mod local;
pub mod manager;
pub mod planner;

pub use error::{PlatformError, ReminderError};
pub use frequency::{Frequency, Interval};
pub use gateway::{NotificationGateway, NotificationPlatform, NullPlatform, PermissionState};
pub use local::LocalPlatform;
pub use manager::{BatchOutcome, ReminderManager};

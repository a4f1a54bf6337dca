pub mod prayer;
pub mod reminder;

pub use prayer::{PrayerFilter, PrayerRequest};
pub use reminder::{ReminderId, ReminderPayload, ReminderSpec};

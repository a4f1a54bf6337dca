use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of reminders in one planned batch.
pub const BATCH_SIZE: usize = 20;

/// Batch ids occupy `BATCH_ID_BASE + 1 ..= BATCH_ID_BASE + BATCH_SIZE`.
pub const BATCH_ID_BASE: i32 = 1000;

/// Manual ids are folded into `MANUAL_ID_MIN ..= i32::MAX`, well clear of the batch range.
pub const MANUAL_ID_MIN: i32 = 100_000;

/// Platform notification id. The platform only accepts 32-bit signed ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReminderId(pub i32);

impl ReminderId {
    /// Id for batch slot `slot` (1-based).
    pub fn batch_slot(slot: usize) -> Self {
        ReminderId(BATCH_ID_BASE + slot as i32)
    }

    /// Every id the batch may occupy, whether or not it is currently scheduled.
    pub fn batch_range() -> Vec<ReminderId> {
        (1..=BATCH_SIZE).map(ReminderId::batch_slot).collect()
    }

    /// Stable id for the manual reminder of a prayer.
    ///
    /// FNV-1a over the prayer id, folded into the manual range. Two prayers can
    /// still share an id, but only with ~1 in 2^31 odds rather than whenever
    /// their leading digits agree.
    pub fn for_prayer(prayer_id: &str) -> Self {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in prayer_id.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        let span = (i32::MAX - MANUAL_ID_MIN) as u64 + 1;
        ReminderId(MANUAL_ID_MIN + (hash % span) as i32)
    }

    pub fn is_batch(&self) -> bool {
        self.0 > BATCH_ID_BASE && self.0 <= BATCH_ID_BASE + BATCH_SIZE as i32
    }
}

impl fmt::Display for ReminderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderPayload {
    pub prayer_id: String,
    pub is_batch_reminder: bool,
}

/// One reminder ready to hand to the notification gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderSpec {
    pub id: ReminderId,
    pub title: String,
    pub body: String,
    pub fire_at: DateTime<Utc>,
    pub payload: ReminderPayload,
}

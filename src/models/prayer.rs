use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrayerRequest {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub is_answered: bool,
    pub answered_date: Option<DateTime<Utc>>,
    pub reflection: Option<String>,
    pub notification_count: u32,
    pub last_notification_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PrayerRequest {
    pub fn new(title: &str, description: &str) -> anyhow::Result<Self> {
        let title = title.trim();
        if title.is_empty() {
            return Err(anyhow::anyhow!("A prayer request needs a title"));
        }
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: description.trim().to_string(),
            is_answered: false,
            answered_date: None,
            reflection: None,
            notification_count: 0,
            last_notification_date: None,
            created_at: Utc::now(),
        })
    }

    pub fn is_active(&self) -> bool {
        !self.is_answered
    }

    /// Record one act of prayer.
    pub fn record_prayer(&mut self, at: DateTime<Utc>) {
        self.notification_count = self.notification_count.saturating_add(1);
        self.last_notification_date = Some(at);
    }

    /// Returns false if the prayer was already answered.
    pub fn mark_answered(&mut self, at: DateTime<Utc>, reflection: Option<String>) -> bool {
        if self.is_answered {
            return false;
        }
        self.is_answered = true;
        self.answered_date = Some(at);
        self.reflection = reflection.filter(|r| !r.trim().is_empty());
        true
    }

    /// Returns false if the prayer was still active.
    pub fn reopen(&mut self) -> bool {
        if !self.is_answered {
            return false;
        }
        self.is_answered = false;
        self.answered_date = None;
        self.reflection = None;
        true
    }

    pub fn short_id(&self) -> &str {
        self.id.get(..8).unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrayerFilter {
    #[default]
    All,
    Active,
    Answered,
}

impl PrayerFilter {
    pub fn matches(&self, prayer: &PrayerRequest) -> bool {
        match self {
            PrayerFilter::All => true,
            PrayerFilter::Active => !prayer.is_answered,
            PrayerFilter::Answered => prayer.is_answered,
        }
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Interval used whenever a selector or custom value cannot be trusted.
pub const DEFAULT_INTERVAL_HOURS: f64 = 1.0;
/// One minute. Shorter spacings would collapse slots onto the same millisecond.
pub const MIN_INTERVAL_HOURS: f64 = 1.0 / 60.0;
/// One week, which keeps a whole batch well inside the representable time range.
pub const MAX_INTERVAL_HOURS: f64 = 24.0 * 7.0;

/// How often batch reminders fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum Frequency {
    #[serde(rename = "15-mins")]
    FifteenMins,
    #[serde(rename = "30-mins")]
    ThirtyMins,
    #[default]
    #[serde(rename = "1-hour")]
    OneHour,
    #[serde(rename = "3-hours")]
    ThreeHours,
    #[serde(rename = "6-hours")]
    SixHours,
    /// Uses `custom_hours` from the reminder settings.
    #[serde(rename = "custom")]
    Custom,
}

impl Frequency {
    pub fn all() -> Vec<Frequency> {
        vec![
            Frequency::FifteenMins,
            Frequency::ThirtyMins,
            Frequency::OneHour,
            Frequency::ThreeHours,
            Frequency::SixHours,
            Frequency::Custom,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::FifteenMins => "15-mins",
            Frequency::ThirtyMins => "30-mins",
            Frequency::OneHour => "1-hour",
            Frequency::ThreeHours => "3-hours",
            Frequency::SixHours => "6-hours",
            Frequency::Custom => "custom",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Frequency::FifteenMins => "Every 15 minutes",
            Frequency::ThirtyMins => "Every 30 minutes",
            Frequency::OneHour => "Every hour",
            Frequency::ThreeHours => "Every 3 hours",
            Frequency::SixHours => "Every 6 hours",
            Frequency::Custom => "Custom interval",
        }
    }

    /// Resolve to a usable interval. `custom_hours` is only consulted for
    /// [`Frequency::Custom`] and falls back to one hour when missing or out of range.
    pub fn interval(&self, custom_hours: Option<f64>) -> Interval {
        let hours = match self {
            Frequency::FifteenMins => 0.25,
            Frequency::ThirtyMins => 0.5,
            Frequency::OneHour => 1.0,
            Frequency::ThreeHours => 3.0,
            Frequency::SixHours => 6.0,
            Frequency::Custom => custom_hours.unwrap_or(DEFAULT_INTERVAL_HOURS),
        };
        Interval::from_hours(hours).unwrap_or_default()
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "15-mins" | "15m" => Ok(Frequency::FifteenMins),
            "30-mins" | "30m" => Ok(Frequency::ThirtyMins),
            "1-hour" | "1h" => Ok(Frequency::OneHour),
            "3-hours" | "3h" => Ok(Frequency::ThreeHours),
            "6-hours" | "6h" => Ok(Frequency::SixHours),
            "custom" => Ok(Frequency::Custom),
            _ => Err(anyhow::anyhow!("Unknown frequency: {}", s)),
        }
    }
}

/// Config files written by hand may carry a selector we do not know; those
/// fall back to the default rather than refusing to load.
impl From<String> for Frequency {
    fn from(s: String) -> Self {
        s.parse().unwrap_or_else(|_| {
            log::warn!("unknown reminder frequency '{}', using {}", s, Frequency::default());
            Frequency::default()
        })
    }
}

/// Hours for a raw selector string. Total: unknown selectors map to one hour.
pub fn interval_hours(selector: &str) -> f64 {
    selector
        .parse::<Frequency>()
        .map(|f| f.interval(None).hours())
        .unwrap_or(DEFAULT_INTERVAL_HOURS)
}

/// Hours between batch reminders, between one minute and one week inclusive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Interval(f64);

impl Interval {
    pub fn from_hours(hours: f64) -> Option<Self> {
        (MIN_INTERVAL_HOURS..=MAX_INTERVAL_HOURS)
            .contains(&hours)
            .then_some(Interval(hours))
    }

    pub fn hours(&self) -> f64 {
        self.0
    }

    /// Offset of slot `n`, rounded to the millisecond.
    pub fn times(&self, n: usize) -> chrono::Duration {
        chrono::Duration::milliseconds((self.0 * 3_600_000.0 * n as f64).round() as i64)
    }
}

impl Default for Interval {
    fn default() -> Self {
        Interval(DEFAULT_INTERVAL_HOURS)
    }
}

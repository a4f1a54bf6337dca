use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// Parse a reminder time relative to `now`.
///
/// Accepts `+90m`, `+2h`, `+1d`, RFC 3339, `YYYY-MM-DD HH:MM` and `HH:MM`
/// (today, in `now`'s zone). Past times are returned as-is; rejecting them is
/// the scheduler's job.
pub fn parse_when<Tz: TimeZone>(input: &str, now: &DateTime<Tz>) -> Result<DateTime<Utc>> {
    let s = input.trim();

    if let Some(rel) = s.strip_prefix('+') {
        return now
            .with_timezone(&Utc)
            .checked_add_signed(parse_relative(rel)?)
            .ok_or_else(|| anyhow!("'{}' is too far in the future", s));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M") {
        dt
    } else if let Ok(t) = NaiveTime::parse_from_str(s, "%H:%M") {
        now.date_naive().and_time(t)
    } else if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Err(anyhow!("'{}' has no time of day; try '{} 09:00'", s, d));
    } else {
        return Err(anyhow!(
            "Could not read '{}'. Use +30m, +2h, +1d, HH:MM or YYYY-MM-DD HH:MM",
            s
        ));
    };

    now.timezone()
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("'{}' does not exist in the local timezone", s))
}

fn parse_relative(s: &str) -> Result<Duration> {
    let unit = s
        .chars()
        .last()
        .ok_or_else(|| anyhow!("Missing amount after '+'"))?;
    let amount: i64 = s[..s.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| anyhow!("Bad relative time '+{}'", s))?;
    if amount <= 0 {
        return Err(anyhow!("Relative time must be positive: '+{}'", s));
    }
    let delta = match unit {
        'm' => Duration::try_minutes(amount),
        'h' => Duration::try_hours(amount),
        'd' => Duration::try_days(amount),
        _ => return Err(anyhow!("Unknown unit '{}' in '+{}'; use m, h or d", unit, s)),
    };
    delta.ok_or_else(|| anyhow!("'+{}' is too far in the future", s))
}

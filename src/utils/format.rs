use chrono::{DateTime, Local, Utc};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Format a duration in seconds to "Xd Yh", "Xh Ym" or "Ym"
pub fn format_duration_secs(secs: i64) -> String {
    if secs <= 0 {
        return "now".to_string();
    }
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// Local wall-clock rendering, e.g. "Mon 19 Oct 14:05"
pub fn format_local(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%a %d %b %H:%M").to_string()
}

/// Hours as "15m", "1h", "2.5h"
pub fn format_hours(hours: f64) -> String {
    if hours < 1.0 {
        format!("{}m", (hours * 60.0).round() as i64)
    } else if hours == hours.floor() {
        format!("{}h", hours as i64)
    } else {
        format!("{:.1}h", hours)
    }
}

/// Cut `s` to at most `width` terminal columns, marking the cut with "…".
pub fn truncate_width(s: &str, width: usize) -> String {
    if s.width() <= width {
        return s.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in s.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

/// Pad `s` with spaces to `width` columns.
pub fn pad_width(s: &str, width: usize) -> String {
    let w = s.width();
    if w >= width {
        s.to_string()
    } else {
        format!("{}{}", s, " ".repeat(width - w))
    }
}

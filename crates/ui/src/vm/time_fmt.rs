use chrono::{DateTime, Duration, Utc};

#[must_use]
pub fn format_datetime(value: DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M").to_string()
}

/// `mm:ss`, minutes unbounded. Negative input shows as `00:00`.
#[must_use]
pub fn format_countdown(remaining: Duration) -> String {
    let total = remaining.num_seconds().max(0);
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Wording for the rate-limit banner.
#[must_use]
pub fn format_cooldown(seconds: u64) -> String {
    match seconds {
        0 => "now".to_owned(),
        1 => "1 second".to_owned(),
        s if s < 60 => format!("{s} seconds"),
        s => format_countdown(Duration::seconds(i64::try_from(s).unwrap_or(i64::MAX))),
    }
}

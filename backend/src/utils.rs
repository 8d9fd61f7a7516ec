use chrono::{DateTime, Duration, SecondsFormat, Utc};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DURATION_RE: Regex =
        Regex::new(r"(?i)^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").expect("duration pattern is valid");
}

/// Parse a compact duration string (PT1H2M3S) to total seconds.
///
/// Anything outside the `PT[nH][nM][nS]` grammar, days included, yields 0.
pub fn parse_iso8601_duration_to_seconds(duration_str: &str) -> u64 {
    let Some(captures) = DURATION_RE.captures(duration_str) else {
        return 0;
    };

    let component = |index: usize| -> u64 {
        captures
            .get(index)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };

    component(1)
        .saturating_mul(3600)
        .saturating_add(component(2).saturating_mul(60))
        .saturating_add(component(3))
}

/// Parse an ISO8601 instant. `None` when the string is not a valid timestamp.
pub fn parse_iso8601_instant(date_str: &str) -> Option<DateTime<Utc>> {
    if date_str.is_empty() {
        return None;
    }
    date_str.parse::<DateTime<Utc>>().ok()
}

/// Fixed-width UTC rendering; lexical order matches chronological order.
pub fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Lower bound for a `publishedAfter` query: `now - days`, rendered with a literal `Z`.
pub fn build_published_after(days: Option<u32>) -> Option<String> {
    build_published_after_at(days, Utc::now())
}

fn build_published_after_at(days: Option<u32>, now: DateTime<Utc>) -> Option<String> {
    match days {
        None | Some(0) => None,
        Some(days) => {
            let target = now - Duration::days(i64::from(days));
            Some(target.to_rfc3339_opts(SecondsFormat::Secs, true))
        }
    }
}

/// Whether `published_at` falls inside the last `days` days.
/// Unparseable timestamps are let through.
pub fn within_days(published_at: &str, days: Option<u32>) -> bool {
    within_days_at(published_at, days, Utc::now())
}

pub fn within_days_at(published_at: &str, days: Option<u32>, now: DateTime<Utc>) -> bool {
    let days = match days {
        None | Some(0) => return true,
        Some(days) => days,
    };
    match parse_iso8601_instant(published_at) {
        Some(published) => published >= now - Duration::days(i64::from(days)),
        None => true,
    }
}

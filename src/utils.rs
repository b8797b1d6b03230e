use chrono::{NaiveTime, Timelike};

use crate::network::{Duration, Timestamp};

// Seconds since midnight of the service day, so times after midnight (e.g. "25:10:00") are valid.
fn parse_time_impl(h: &str, m: &str, s: &str) -> Option<Timestamp> {
    let hours: Timestamp = h.parse().ok()?;
    let minutes: Timestamp = m.parse().ok()?;
    let seconds: Timestamp = s.parse().ok()?;
    if hours < 0 || !(0..60).contains(&minutes) || !(0..60).contains(&seconds) {
        return None;
    }
    Some(hours * 3600 + minutes * 60 + seconds)
}

/// Parses `H:MM`, `HH:MM` or `HH:MM:SS` into seconds since midnight.
pub fn parse_time(s: &str) -> Option<Timestamp> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    match parts.as_slice() {
        [hour, min] if min.len() == 2 => parse_time_impl(hour, min, "0"),
        [hour, min, sec] if min.len() == 2 && sec.len() == 2 => parse_time_impl(hour, min, sec),
        _ => None,
    }
}

/// Converts a wall clock time into seconds since midnight.
pub fn time_of(time: NaiveTime) -> Timestamp {
    time.num_seconds_from_midnight() as Timestamp
}

/// The inverse of [`time_of`], `None` for times outside a single day.
pub fn naive_time(time: Timestamp) -> Option<NaiveTime> {
    u32::try_from(time)
        .ok()
        .and_then(|secs| NaiveTime::from_num_seconds_from_midnight_opt(secs, 0))
}

pub fn get_time_str(time: Timestamp) -> String {
    let sign = if time < 0 { "-" } else { "" };
    let time = time.abs();
    let hours = time / 3600;
    let minutes = (time % 3600) / 60;
    let seconds = time % 60;
    if seconds == 0 {
        format!("{sign}{hours}:{minutes:02}")
    } else {
        format!("{sign}{hours}:{minutes:02}:{seconds:02}")
    }
}

pub fn get_duration_str(duration: Duration) -> String {
    let sign = if duration < 0 { "-" } else { "" };
    let duration = duration.abs();
    let hours = duration / 3600;
    let minutes = (duration % 3600) / 60;
    let seconds = duration % 60;
    let mut text = String::from(sign);
    if hours > 0 {
        text += &format!("{hours}h");
    }
    if minutes > 0 {
        text += &format!("{minutes}m");
    }
    if seconds > 0 || (hours == 0 && minutes == 0) {
        text += &format!("{seconds}s");
    }
    text
}

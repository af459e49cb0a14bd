//! Timestamp formatting for timeline rendering.
//!
//! Message timestamps are server-assigned; a freshly sent message may not
//! have one yet, so every formatter accepts `None` and produces an empty
//! string instead of failing.

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Utc};

/// Month names used by the long day label, pt-BR.
const MONTHS: [&str; 12] = [
    "janeiro",
    "fevereiro",
    "março",
    "abril",
    "maio",
    "junho",
    "julho",
    "agosto",
    "setembro",
    "outubro",
    "novembro",
    "dezembro",
];

/// `HH:mm` in the device's local time zone. `None` formats to `""`.
pub fn format_clock(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => {
            let local = ts.with_timezone(&Local);
            format!("{:02}:{:02}", local.hour(), local.minute())
        }
        None => String::new(),
    }
}

/// Long-form local-calendar day label, e.g. `07 de agosto de 2026`.
/// `None` formats to `""` and must never introduce a day separator.
pub fn format_day_label(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => {
            let local = ts.with_timezone(&Local);
            format!(
                "{:02} de {} de {}",
                local.day(),
                MONTHS[local.month0() as usize],
                local.year()
            )
        }
        None => String::new(),
    }
}

/// Millisecond epoch timestamps are the document wire format; out-of-range
/// values parse to `None` rather than failing the whole document.
pub fn datetime_from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

/// Date layouts accepted for item publish times, tried in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    /// `Mon, 02 Jan 2006 15:04:05 -0700`
    Rfc1123Offset,
    /// `Mon, 02 Jan 2006 15:04:05 MST`
    Rfc1123Zone,
    /// `2006-01-02T15:04:05Z07:00`
    Rfc3339,
    /// Anything else RFC 2822 allows (no weekday, single-digit day, obsolete zones)
    Rfc2822,
}

pub const ACCEPTED_FORMATS: &[TimestampFormat] = &[
    TimestampFormat::Rfc1123Offset,
    TimestampFormat::Rfc1123Zone,
    TimestampFormat::Rfc3339,
    TimestampFormat::Rfc2822,
];

const RFC1123_BODY: &str = "%d %b %Y %H:%M:%S";

impl TimestampFormat {
    pub fn parse(self, raw: &str) -> Option<DateTime<FixedOffset>> {
        match self {
            TimestampFormat::Rfc1123Offset => {
                let body = strip_weekday(raw);
                DateTime::parse_from_str(body, &format!("{} %z", RFC1123_BODY)).ok()
            }
            TimestampFormat::Rfc1123Zone => {
                let (body, zone) = strip_weekday(raw).rsplit_once(' ')?;
                let offset = FixedOffset::east_opt(zone_offset_secs(zone)?)?;
                let naive = NaiveDateTime::parse_from_str(body, RFC1123_BODY).ok()?;
                offset.from_local_datetime(&naive).single()
            }
            TimestampFormat::Rfc3339 => DateTime::parse_from_rfc3339(raw).ok(),
            TimestampFormat::Rfc2822 => DateTime::parse_from_rfc2822(raw).ok(),
        }
    }
}

/// Normalise a free-form publish date. `None` means "published time unknown".
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    ACCEPTED_FORMATS
        .iter()
        .find_map(|format| format.parse(raw))
        .map(|dt| dt.with_timezone(&Utc))
}

/// The weekday is checked for shape only, never against the date itself
fn strip_weekday(raw: &str) -> &str {
    match raw.split_once(',') {
        Some((day, rest)) if !day.is_empty() && day.chars().all(|c| c.is_ascii_alphabetic()) => {
            rest.trim_start()
        }
        _ => raw,
    }
}

fn zone_offset_secs(zone: &str) -> Option<i32> {
    const HOUR: i32 = 3600;

    if zone.is_empty() || !zone.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let offset = match zone.to_ascii_uppercase().as_str() {
        "EST" => -5 * HOUR,
        "EDT" => -4 * HOUR,
        "CST" => -6 * HOUR,
        "CDT" => -5 * HOUR,
        "MST" => -7 * HOUR,
        "MDT" => -6 * HOUR,
        "PST" => -8 * HOUR,
        "PDT" => -7 * HOUR,
        // GMT, UT, UTC, Z and any abbreviation we cannot place
        _ => 0,
    };
    Some(offset)
}

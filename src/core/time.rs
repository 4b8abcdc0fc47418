use time::{
    format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
    PrimitiveDateTime,
};

pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

pub fn format_offset(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_else(|_| value.to_string())
}

/// Parses the backend's timestamps, which arrive either as full Rfc3339 or
/// as a naive datetime without an offset (treated as UTC).
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Some(value);
    }

    let naive = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    if let Ok(value) = PrimitiveDateTime::parse(trimmed, &naive) {
        return Some(value.assume_utc());
    }

    let naive_fraction =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");
    if let Ok(value) = PrimitiveDateTime::parse(trimmed, &naive_fraction) {
        return Some(value.assume_utc());
    }

    None
}

pub fn is_elapsed(deadline: OffsetDateTime, now: OffsetDateTime) -> bool {
    now.unix_timestamp() >= deadline.unix_timestamp()
}

pub fn countdown_seconds(duration_minutes: u32) -> u64 {
    u64::from(duration_minutes) * 60
}

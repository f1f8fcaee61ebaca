use chrono::NaiveDate;

/// Wire format for every calendar date in the system.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Why a date string was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateError {
    /// Not `YYYY-MM-DD` with zero padding.
    Malformed(String),
    /// Well formed but not a real calendar day (e.g. `2025-02-30`).
    NoSuchDay(String),
}

impl std::fmt::Display for DateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(raw) => write!(f, "date '{raw}' is not in YYYY-MM-DD format"),
            Self::NoSuchDay(raw) => write!(f, "date '{raw}' does not exist"),
        }
    }
}

impl std::error::Error for DateError {}

/// Parse a strict, zero-padded `YYYY-MM-DD` date.
///
/// chrono alone accepts unpadded fields, which would break the lexicographic
/// ordering the store relies on, so the shape is checked first.
pub fn parse_date(raw: &str) -> Result<NaiveDate, DateError> {
    let bytes = raw.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shaped {
        return Err(DateError::Malformed(raw.to_string()));
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| DateError::NoSuchDay(raw.to_string()))
}

/// Parse a delivery date and require it to be strictly after `today`.
pub fn parse_future_date(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    parse_date(raw).ok().filter(|date| *date > today)
}

/// Render a date the way it is stored.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_padded_dates() {
        assert_eq!(parse_date("2026-01-05"), Ok(day(2026, 1, 5)));
        assert_eq!(format_date(day(2026, 1, 5)), "2026-01-05");
    }

    #[test]
    fn rejects_unpadded_and_garbage() {
        assert!(matches!(parse_date("2026-1-5"), Err(DateError::Malformed(_))));
        assert!(matches!(parse_date("05/01/2026"), Err(DateError::Malformed(_))));
        assert!(matches!(parse_date(""), Err(DateError::Malformed(_))));
        assert!(matches!(parse_date("2026-01-05T00:00"), Err(DateError::Malformed(_))));
    }

    #[test]
    fn rejects_impossible_days() {
        assert!(matches!(parse_date("2025-02-30"), Err(DateError::NoSuchDay(_))));
        assert!(matches!(parse_date("2025-13-01"), Err(DateError::NoSuchDay(_))));
    }

    #[test]
    fn future_date_must_be_strictly_after_today() {
        let today = day(2026, 3, 10);
        assert_eq!(parse_future_date("2026-03-11", today), Some(day(2026, 3, 11)));
        assert_eq!(parse_future_date("2026-03-10", today), None);
        assert_eq!(parse_future_date("2026-03-09", today), None);
        assert_eq!(parse_future_date("tomorrow", today), None);
    }
}

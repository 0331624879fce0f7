//! Timestamp normalization for legs that only carry wall-clock departure times.

use chrono::{FixedOffset, NaiveDateTime, TimeZone};

use super::raw::RawValue;

/// Epoch milliseconds at or beyond this magnitude (around year 5138) are
/// rejected everywhere, which keeps differences of two timestamps in range.
pub const MAX_EPOCH_MS: i64 = 100_000_000_000_000;

/// Converts a loosely formatted timestamp to epoch milliseconds.
///
/// Digit strings of 12 or 14 characters starting with `19`/`20` are read as
/// `YYYYMMDDHHMM[SS]` local time in `offset`. Otherwise the value is taken as
/// epoch seconds (`1e9..1e11`) or epoch milliseconds (`1e12..1e14`).
pub fn to_epoch_ms(value: &RawValue, offset: &FixedOffset) -> Option<i64> {
    if let RawValue::Text(s) = value {
        let digits: String = s.chars().filter(char::is_ascii_digit).collect();
        if matches!(digits.len(), 12 | 14) && (digits.starts_with("19") || digits.starts_with("20"))
        {
            return parse_compact_local(&digits, offset);
        }
    }

    let n = match value {
        RawValue::Int(n) => *n,
        RawValue::Float(f) if f.is_finite() => f.trunc() as i64,
        RawValue::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite())? as i64,
        _ => return None,
    };

    match n {
        1_000_000_000..100_000_000_000 => Some(n * 1000),
        1_000_000_000_000..MAX_EPOCH_MS => Some(n),
        _ => None,
    }
}

fn parse_compact_local(digits: &str, offset: &FixedOffset) -> Option<i64> {
    let fmt = if digits.len() == 14 {
        "%Y%m%d%H%M%S"
    } else {
        "%Y%m%d%H%M"
    };
    let naive = NaiveDateTime::parse_from_str(digits, fmt).ok()?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    #[test]
    fn test_compact_minutes_in_local_time() {
        // 2025-07-29 09:30 KST == 00:30 UTC
        let ms = to_epoch_ms(&RawValue::Text("202507290930".into()), &kst()).unwrap();
        assert_eq!(ms, 1_753_749_000_000);
    }

    #[test]
    fn test_compact_with_seconds_and_separators() {
        let ms = to_epoch_ms(&RawValue::Text("2025-07-29 09:30:15".into()), &kst()).unwrap();
        assert_eq!(ms, 1_753_749_015_000);
    }

    #[test]
    fn test_epoch_seconds_and_millis() {
        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(
            to_epoch_ms(&RawValue::Int(1_753_749_000), &utc),
            Some(1_753_749_000_000)
        );
        assert_eq!(
            to_epoch_ms(&RawValue::Text("1753749000000".into()), &utc),
            Some(1_753_749_000_000)
        );
    }

    #[test]
    fn test_out_of_range_numbers_rejected() {
        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(to_epoch_ms(&RawValue::Int(12345), &utc), None);
        assert_eq!(to_epoch_ms(&RawValue::Text("".into()), &utc), None);
        assert_eq!(to_epoch_ms(&RawValue::Bool(true), &utc), None);
    }
}

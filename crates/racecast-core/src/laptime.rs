//! Lap time grammar, formatting, and signed deltas.
//!
//! Accepted forms, all yielding integer milliseconds:
//!
//! | Input | Milliseconds |
//! |-------|--------------|
//! | `1:32.456` | 92 456 |
//! | `1:32` | 92 000 |
//! | `58.3` | 58 300 |
//! | `1:02:03.5` | 3 723 500 |
//!
//! Empty strings, `-`, zero times, and anything mentioning "lap" (gap
//! columns such as `1 Lap`) are not times. Status words like `PIT` fail the
//! digit checks. Fractions beyond three digits are truncated.

/// Parse a lap time into milliseconds, or `None` when the text is not a time.
pub fn parse_lap_time(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() || text == "-" || text.to_ascii_lowercase().contains("lap") {
        return None;
    }

    let mut parts = text.rsplit(':');
    let seconds_part = parts.next()?;
    let minutes_part = parts.next();
    let hours_part = parts.next();
    if parts.next().is_some() {
        return None;
    }

    let (whole_seconds, fraction_ms) = parse_seconds(seconds_part)?;
    let mut total_ms = whole_seconds.checked_mul(1_000)?.checked_add(fraction_ms)?;

    if let Some(minutes) = minutes_part {
        // With a minute field the seconds field is a clock component.
        if whole_seconds >= 60 {
            return None;
        }
        let minutes = parse_digits(minutes)?;
        if hours_part.is_some() && minutes >= 60 {
            return None;
        }
        total_ms = total_ms.checked_add(minutes.checked_mul(60_000)?)?;
    }

    if let Some(hours) = hours_part {
        let hours = parse_digits(hours)?;
        total_ms = total_ms.checked_add(hours.checked_mul(3_600_000)?)?;
    }

    (total_ms > 0).then_some(total_ms)
}

/// Parse `SS` or `SS.fff` into whole seconds and fractional milliseconds.
fn parse_seconds(text: &str) -> Option<(u64, u64)> {
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (text, None),
    };
    let whole = parse_digits(whole)?;

    let fraction_ms = match fraction {
        None => 0,
        Some(digits) => {
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            digits
                .bytes()
                .chain(std::iter::repeat(b'0'))
                .take(3)
                .try_fold(0_u64, |acc, b| {
                    acc.checked_mul(10)?.checked_add(u64::from(b.checked_sub(b'0')?))
                })?
        }
    };

    Some((whole, fraction_ms))
}

/// Parse a non-empty run of ASCII digits.
fn parse_digits(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Format milliseconds as `M:SS.mmm`, or `SS.mmm` below one minute.
pub fn format_lap_time(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1_000;
    let millis = ms % 1_000;
    if minutes == 0 {
        format!("{seconds}.{millis:03}")
    } else {
        format!("{minutes}:{seconds:02}.{millis:03}")
    }
}

/// Format a signed delta as `+S.mmm` / `-S.mmm`.
pub fn format_delta(delta_ms: i64) -> String {
    let sign = if delta_ms < 0 { '-' } else { '+' };
    let magnitude = delta_ms.unsigned_abs();
    format!("{sign}{}.{:03}", magnitude / 1_000, magnitude % 1_000)
}

/// `a - b` as a signed millisecond delta, saturating at the `i64` range.
pub fn signed_delta(a: u64, b: u64) -> i64 {
    if a >= b {
        i64::try_from(a.saturating_sub(b)).unwrap_or(i64::MAX)
    } else {
        i64::try_from(b.saturating_sub(a)).map_or(i64::MIN, |d| d.saturating_neg())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn parses_minutes_seconds_millis() {
        assert_eq!(parse_lap_time("1:32.456"), Some(92_456));
        assert_eq!(parse_lap_time(" 1:32.456 "), Some(92_456));
        assert_eq!(parse_lap_time("1:32"), Some(92_000));
    }

    #[test]
    fn seconds_value_matches_decimal_form() {
        let ms = parse_lap_time("1:32.456").unwrap_or_default();
        let seconds = Duration::from_millis(ms).as_secs_f64();
        assert!((seconds - 92.456).abs() < 1e-9);
    }

    #[test]
    fn parses_bare_seconds() {
        assert_eq!(parse_lap_time("58.3"), Some(58_300));
        assert_eq!(parse_lap_time("58"), Some(58_000));
        assert_eq!(parse_lap_time("75.25"), Some(75_250));
    }

    #[test]
    fn parses_hours() {
        assert_eq!(parse_lap_time("1:02:03.5"), Some(3_723_500));
    }

    #[test]
    fn truncates_long_fractions() {
        assert_eq!(parse_lap_time("1:00.12345"), Some(60_123));
    }

    #[test]
    fn rejects_non_times() {
        assert_eq!(parse_lap_time("-"), None);
        assert_eq!(parse_lap_time(""), None);
        assert_eq!(parse_lap_time("PIT"), None);
        assert_eq!(parse_lap_time("1 Lap"), None);
        assert_eq!(parse_lap_time("2 laps"), None);
        assert_eq!(parse_lap_time("1:75.000"), None);
        assert_eq!(parse_lap_time("1:32."), None);
        assert_eq!(parse_lap_time("1::32"), None);
        assert_eq!(parse_lap_time("1:2:3:4"), None);
        assert_eq!(parse_lap_time("0:00.000"), None);
        assert_eq!(parse_lap_time("-1:32.000"), None);
    }

    #[test]
    fn formats_lap_times() {
        assert_eq!(format_lap_time(92_456), "1:32.456");
        assert_eq!(format_lap_time(65_000), "1:05.000");
        assert_eq!(format_lap_time(58_300), "58.300");
    }

    #[test]
    fn formats_deltas() {
        assert_eq!(format_delta(512), "+0.512");
        assert_eq!(format_delta(-1_204), "-1.204");
        assert_eq!(format_delta(0), "+0.000");
    }

    #[test]
    fn signed_delta_handles_both_directions() {
        assert_eq!(signed_delta(92_000, 91_500), 500);
        assert_eq!(signed_delta(91_500, 92_000), -500);
    }
}

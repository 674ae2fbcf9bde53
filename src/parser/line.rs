//! Splitting a raw line into its timestamp and data portion

use chrono::Utc;

/// A raw line split into its timestamp and data portion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineParts<'a> {
    /// Timestamp from the line, or the wall clock when the line had none
    pub timestamp: u64,
    /// Whether `timestamp` came from the line itself
    pub from_source: bool,
    /// Everything from the first non-digit character on
    pub data: &'a str,
}

/// Current wall-clock time in Unix milliseconds
pub fn wall_clock_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Parse the leading run of decimal digits as a timestamp
///
/// Returns `None` if the line does not start with a digit or the digits do
/// not fit a `u64`.
pub fn extract_timestamp(line: &str) -> Option<u64> {
    let digits = leading_digits(line);
    if digits == 0 {
        return None;
    }
    line[..digits].parse().ok()
}

/// The part of the line after the leading timestamp digits
pub fn data_portion(line: &str) -> &str {
    &line[leading_digits(line)..]
}

/// Split a raw line, falling back to the wall clock for the timestamp
pub fn split_line(line: &str) -> LineParts<'_> {
    let (timestamp, from_source) = match extract_timestamp(line) {
        Some(ts) => (ts, true),
        None => (wall_clock_millis(), false),
    };
    LineParts {
        timestamp,
        from_source,
        data: data_portion(line),
    }
}

fn leading_digits(line: &str) -> usize {
    line.bytes().take_while(u8::is_ascii_digit).count()
}

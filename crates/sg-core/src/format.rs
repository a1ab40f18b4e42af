//! Human-readable duration formatting.

use std::fmt::Write;

use chrono::Duration;

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;

/// Formats a duration as `"1d 2h 3m 4s"`.
///
/// Zero-valued units are omitted and sub-second remainders are truncated.
/// Zero and negative durations render as `"0s"`.
pub fn format_duration(duration: Duration) -> String {
    let mut remaining = duration.num_seconds().max(0);
    let mut out = String::new();

    for (size, suffix) in [
        (SECONDS_PER_DAY, 'd'),
        (SECONDS_PER_HOUR, 'h'),
        (SECONDS_PER_MINUTE, 'm'),
        (1, 's'),
    ] {
        let count = remaining / size;
        remaining %= size;
        if count > 0 {
            if !out.is_empty() {
                out.push(' ');
            }
            // Writing to a String cannot fail.
            let _ = write!(out, "{count}{suffix}");
        }
    }

    if out.is_empty() {
        out.push_str("0s");
    }
    out
}

//! Formatting helpers for console output.
//!
//! Remaining times use "HH:MM:SS"; negative values are shown as zero.
//!
//! ```rust
//! use pennerbot::libs::formatter::format_remaining;
//!
//! assert_eq!(format_remaining(3725), "01:02:05");
//! ```

use chrono::{DateTime, Local, Utc};

pub fn format_remaining(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{:02}:{:02}:{:02}", seconds / 3600, (seconds % 3600) / 60, seconds % 60)
}

/// Local wall-clock time of `at`, or "-" when unknown.
pub fn format_time(at: Option<DateTime<Utc>>) -> String {
    match at {
        Some(at) => at.with_timezone(&Local).format("%H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}

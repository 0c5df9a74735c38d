#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone, Utc};
    use pennerbot::libs::formatter::{format_remaining, format_time};

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(0), "00:00:00");
        assert_eq!(format_remaining(59), "00:00:59");
        assert_eq!(format_remaining(3600), "01:00:00");
        assert_eq!(format_remaining(12 * 3600 + 5 * 60 + 7), "12:05:07");
    }

    #[test]
    fn test_format_remaining_negative_is_zero() {
        assert_eq!(format_remaining(-30), "00:00:00");
    }

    #[test]
    fn test_format_remaining_beyond_a_day() {
        assert_eq!(format_remaining(25 * 3600), "25:00:00");
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(None), "-");

        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 15).unwrap();
        let expected = at.with_timezone(&Local).format("%H:%M:%S").to_string();
        assert_eq!(format_time(Some(at)), expected);
    }
}

//! Utility functions for common operations

use chrono::{DateTime, Utc};

/// Render an instant the way the provider expects its `start_timestamp` and
/// `end_timestamp` parameters: ISO 8601 UTC with a literal `Z`, second
/// precision.
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Compact instant form used in companion-file names (no `:` so the names
/// stay portable across filesystems)
pub fn file_stamp(instant: DateTime<Utc>) -> String {
    instant.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Join field names into the comma-separated `fields` parameter value
pub fn join_fields(fields: &[&str]) -> String {
    fields.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_timestamp() {
        let instant = Utc.with_ymd_and_hms(2022, 6, 15, 0, 0, 0).unwrap();
        assert_eq!(format_timestamp(instant), "2022-06-15T00:00:00Z");

        let instant = Utc.with_ymd_and_hms(2022, 6, 1, 13, 45, 9).unwrap();
        assert_eq!(format_timestamp(instant), "2022-06-01T13:45:09Z");
    }

    #[test]
    fn test_file_stamp_has_no_separators() {
        let instant = Utc.with_ymd_and_hms(2022, 6, 15, 13, 45, 9).unwrap();
        let stamp = file_stamp(instant);
        assert_eq!(stamp, "20220615T134509Z");
        assert!(!stamp.contains(':'));
    }

    #[test]
    fn test_join_fields() {
        assert_eq!(join_fields(&["a", "b", "c"]), "a,b,c");
        assert_eq!(join_fields(&["sensor_index"]), "sensor_index");
    }
}

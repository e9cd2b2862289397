//! Object key construction and selection shared by both pipeline stages.

use chrono::{DateTime, Utc};

use crate::store::ObjectInfo;

/// Tabular suffix recognized on input and summary objects.
pub const CSV_SUFFIX: &str = ".csv";

/// Suffix carried by generated report objects.
pub const REPORT_SUFFIX: &str = ".txt";

/// Formats a run timestamp as `YYYYMMDDThhmmssZ`.
///
/// Lexicographic order over these strings equals chronological order, which
/// the report stage relies on when selecting the newest summary object.
pub fn run_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Rewrites a group key into an object-name-safe token.
///
/// Whitespace and anything outside `[A-Za-z0-9._-]` becomes an underscore.
pub fn sanitize_key(raw: &str) -> String {
    raw.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

/// Key of the summary object written by one transform run.
pub fn summary_object_key(output_prefix: &str, timestamp: &str) -> String {
    format!(
        "{}/processed_summary_{}{}",
        output_prefix.trim_end_matches('/'),
        timestamp,
        CSV_SUFFIX
    )
}

/// Key of the report object written for one group row.
pub fn report_object_key(output_prefix: &str, group_key: &str, timestamp: &str) -> String {
    format!(
        "{}/{}_report_{}{}",
        output_prefix.trim_end_matches('/'),
        sanitize_key(group_key),
        timestamp,
        REPORT_SUFFIX
    )
}

/// True when the key ends with the tabular suffix, ignoring case.
pub fn has_csv_suffix(key: &str) -> bool {
    key.to_ascii_lowercase().ends_with(CSV_SUFFIX)
}

/// Picks the lexicographically greatest CSV key, i.e. the newest run's summary.
pub fn latest_csv_key(objects: &[ObjectInfo]) -> Option<String> {
    objects
        .iter()
        .map(|object| object.key.as_str())
        .filter(|key| has_csv_suffix(key))
        .max()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn info(key: &str) -> ObjectInfo {
        ObjectInfo {
            key: key.to_string(),
            size: 0,
        }
    }

    #[test]
    fn timestamps_sort_chronologically() {
        let earlier = Utc.with_ymd_and_hms(2023, 11, 3, 9, 30, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2023, 11, 3, 14, 5, 59).unwrap();
        let t1 = run_timestamp(earlier);
        let t2 = run_timestamp(later);
        assert_eq!(t1, "20231103T093000Z");
        assert_eq!(t2, "20231103T140559Z");
        assert!(t1 < t2);
    }

    #[test]
    fn sanitize_replaces_whitespace_and_punctuation() {
        assert_eq!(sanitize_key("Land Rover"), "Land_Rover");
        assert_eq!(sanitize_key("Mercedes-Benz"), "Mercedes-Benz");
        assert_eq!(sanitize_key("weird/key\tname"), "weird_key_name");
        assert_eq!(sanitize_key(""), "");
    }

    #[test]
    fn object_keys_follow_the_naming_convention() {
        assert_eq!(
            summary_object_key("processed", "20231103T093000Z"),
            "processed/processed_summary_20231103T093000Z.csv"
        );
        assert_eq!(
            report_object_key("report/", "Alfa Romeo", "20231103T093000Z"),
            "report/Alfa_Romeo_report_20231103T093000Z.txt"
        );
    }

    #[test]
    fn suffix_filter_ignores_case() {
        assert!(has_csv_suffix("raw/cars.CSV"));
        assert!(has_csv_suffix("raw/cars.csv"));
        assert!(!has_csv_suffix("raw/cars.csv.bak"));
        assert!(!has_csv_suffix("raw/notes.txt"));
    }

    #[test]
    fn latest_key_is_lexicographically_greatest() {
        let objects = vec![
            info("processed/processed_summary_20231103T093000Z.csv"),
            info("processed/processed_summary_20231104T010000Z.csv"),
            info("processed/readme.txt"),
        ];
        assert_eq!(
            latest_csv_key(&objects).as_deref(),
            Some("processed/processed_summary_20231104T010000Z.csv")
        );
        assert_eq!(latest_csv_key(&[info("processed/readme.txt")]), None);
        assert_eq!(latest_csv_key(&[]), None);
    }
}

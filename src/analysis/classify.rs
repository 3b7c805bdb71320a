//! Record classification: month bucket, success flag and owner key.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::models::{CreatedAt, DealRecord, MonthKey, StatusVocabulary};

/// Timestamp layouts carrying a UTC offset (PostgreSQL `timestamptz` text).
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];

/// Timestamp layouts without an offset.
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// What the aggregators need to know about one record.
///
/// `month` and `owner` are `None` when the record is unclassifiable on
/// that axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification<'a> {
    pub month: Option<MonthKey>,
    pub success: bool,
    pub owner: Option<&'a str>,
}

/// Classifies a single record.
pub fn classify<'a>(record: &'a DealRecord, vocabulary: &StatusVocabulary) -> Classification<'a> {
    Classification {
        month: record_date(record).map(MonthKey::from_date),
        success: record
            .status
            .as_deref()
            .is_some_and(|status| vocabulary.is_won(status)),
        owner: record.owner.as_deref().filter(|owner| !owner.is_empty()),
    }
}

/// Calendar date the record was created on, if it can be determined.
pub fn record_date(record: &DealRecord) -> Option<NaiveDate> {
    match record.created_at.as_ref()? {
        CreatedAt::Date(date) => Some(*date),
        CreatedAt::Text(raw) => parse_created_at(raw),
    }
}

/// Parses a creation timestamp into a calendar date.
///
/// Timestamps with an offset are bucketed by their date in that offset.
pub fn parse_created_at(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.date_naive());
    }

    for format in OFFSET_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(raw, format) {
            return Some(ts.date_naive());
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts.date());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_parse_created_at_formats() {
        assert_eq!(parse_created_at("2024-03-05"), ymd(2024, 3, 5));
        assert_eq!(parse_created_at("2024-03-05T10:00:00Z"), ymd(2024, 3, 5));
        assert_eq!(parse_created_at("2024-03-05T10:00:00.123Z"), ymd(2024, 3, 5));
        assert_eq!(parse_created_at("2024-03-05T23:30:00+09:00"), ymd(2024, 3, 5));
        assert_eq!(parse_created_at("2024-03-05 10:00:00+00"), ymd(2024, 3, 5));
        assert_eq!(
            parse_created_at("2024-03-05 10:00:00.654321+00"),
            ymd(2024, 3, 5)
        );
        assert_eq!(parse_created_at("2024-03-05T10:00:00"), ymd(2024, 3, 5));
        assert_eq!(parse_created_at("2024-03-05 10:00:00"), ymd(2024, 3, 5));
        assert_eq!(parse_created_at("  2024-03-05  "), ymd(2024, 3, 5));
    }

    #[test]
    fn test_parse_created_at_rejects_garbage() {
        assert_eq!(parse_created_at(""), None);
        assert_eq!(parse_created_at("yesterday"), None);
        assert_eq!(parse_created_at("2024-13-01"), None);
        assert_eq!(parse_created_at("05/03/2024"), None);
    }

    #[test]
    fn test_classify_success_is_exact_match() {
        let vocab = StatusVocabulary::default();
        let won = DealRecord::new("2024-03-05", "성사됨", "김대표");
        let spaced = DealRecord::new("2024-03-05", "성사됨 ", "김대표");
        let english = DealRecord::new("2024-03-05", "won", "김대표");

        assert!(classify(&won, &vocab).success);
        assert!(!classify(&spaced, &vocab).success);
        assert!(!classify(&english, &vocab).success);
    }

    #[test]
    fn test_classify_unclassifiable_fields() {
        let vocab = StatusVocabulary::default();
        let record = DealRecord {
            owner: Some(String::new()),
            created_at: Some(CreatedAt::Text("not a date".to_string())),
            ..DealRecord::default()
        };

        let class = classify(&record, &vocab);
        assert_eq!(class.month, None);
        assert_eq!(class.owner, None);
        assert!(!class.success);

        let missing = DealRecord::default();
        assert_eq!(classify(&missing, &vocab).month, None);
    }

    #[test]
    fn test_classify_parsed_date() {
        let vocab = StatusVocabulary::default();
        let record = DealRecord {
            owner: Some("이사원".to_string()),
            status: Some("진행중".to_string()),
            created_at: Some(CreatedAt::Date(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap())),
            ..DealRecord::default()
        };

        let class = classify(&record, &vocab);
        assert_eq!(class.month, MonthKey::new(2023, 12));
        assert_eq!(class.owner, Some("이사원"));
        assert!(!class.success);
    }
}

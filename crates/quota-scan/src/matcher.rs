use crate::parser::normalize_localized_date;
use crate::scan_types::{AvailabilityRecord, Target};

/// Whether a record is the date the caller asked for
pub fn matches(record: &AvailabilityRecord, target: &Target) -> bool {
    match target {
        Target::Day(day) => {
            let suffix = format!("-{:02}", day);
            record
                .date_iso()
                .is_some_and(|iso| iso.ends_with(&suffix))
        }
        Target::Iso(iso) => record.date_iso().as_deref() == Some(iso.trim()),
        Target::Localized(text) => {
            let text = text.trim();
            match normalize_localized_date(text) {
                Some(date) => record.date == Some(date),
                // Free text: look for it in the raw label
                None => record
                    .date_text
                    .to_lowercase()
                    .contains(&text.to_lowercase()),
            }
        }
    }
}

/// First record in document order matching the target.
///
/// `None` just means the date is not listed yet.
pub fn find_target<'a>(
    records: &'a [AvailabilityRecord],
    target: &Target,
) -> Option<&'a AvailabilityRecord> {
    records.iter().find(|record| matches(record, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(date_text: &str, date: Option<NaiveDate>) -> AvailabilityRecord {
        AvailabilityRecord {
            date_text: date_text.to_string(),
            date,
            status_text: "Tersedia".to_string(),
            remaining: None,
            is_full: false,
            is_available: true,
        }
    }

    #[test]
    fn test_all_target_forms_agree() {
        let r = record("Sabtu, 18 Oktober 2025", NaiveDate::from_ymd_opt(2025, 10, 18));

        assert!(matches(&r, &Target::Day(18)));
        assert!(matches(&r, &Target::Iso("2025-10-18".to_string())));
        assert!(matches(&r, &Target::Localized("18 Oktober 2025".to_string())));

        assert!(!matches(&r, &Target::Day(8)));
        assert!(!matches(&r, &Target::Iso("2025-10-19".to_string())));
        assert!(!matches(&r, &Target::Localized("19 oktober 2025".to_string())));
    }

    #[test]
    fn test_day_needs_a_parsed_date() {
        let r = record("18 Okt 2025", None);
        assert!(!matches(&r, &Target::Day(18)));
        assert!(!matches(&r, &Target::Iso("2025-10-18".to_string())));
    }

    #[test]
    fn test_free_text_falls_back_to_label() {
        let r = record("Sabtu, 18 Okt 2025", None);
        assert!(matches(&r, &Target::Localized("sabtu, 18 okt".to_string())));
        assert!(!matches(&r, &Target::Localized("Minggu".to_string())));
    }

    #[test]
    fn test_find_target_takes_first_match() {
        let records = vec![
            record("first", NaiveDate::from_ymd_opt(2025, 10, 17)),
            record("second", NaiveDate::from_ymd_opt(2025, 10, 18)),
            record("third", NaiveDate::from_ymd_opt(2025, 11, 18)),
        ];

        let found = find_target(&records, &Target::Day(18));
        assert_eq!(found.map(|r| r.date_text.as_str()), Some("second"));
        assert!(find_target(&records, &Target::Day(30)).is_none());
        assert!(find_target(&[], &Target::Day(18)).is_none());
    }
}

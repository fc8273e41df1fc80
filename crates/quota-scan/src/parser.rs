//! Turns the quota table markup into [`AvailabilityRecord`]s.
//!
//! The site is inconsistent about how it signals a full date: sometimes the
//! status text says so, sometimes the exact count is hidden, sometimes the
//! count is simply zero. All three signals are honoured.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::scan_types::AvailabilityRecord;

/// Indonesian month names, lower-cased
const MONTHS_ID: [&str; 12] = [
    "januari",
    "februari",
    "maret",
    "april",
    "mei",
    "juni",
    "juli",
    "agustus",
    "september",
    "oktober",
    "november",
    "desember",
];

/// Status fragments that mean the date can be booked
const AVAILABLE_MARKERS: [&str; 3] = ["tersedia", "available", "tersisa"];

static LOCALIZED_DATE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"([0-9]{1,2})\s+([A-Za-z]+)\s+([0-9]{4})").ok());

/// Normalize a label such as "Rabu, 1 Oktober 2025" into a date.
///
/// Returns `None` when no `<day> <month> <year>` group is present, the month
/// name is not Indonesian, or the day does not exist in that month.
pub fn normalize_localized_date(text: &str) -> Option<NaiveDate> {
    let collapsed = collapse_whitespace(text);
    if collapsed.is_empty() {
        return None;
    }

    let caps = LOCALIZED_DATE.as_ref()?.captures(&collapsed)?;
    let day: u32 = caps[1].parse().ok()?;
    let month_name = caps[2].to_lowercase();
    let year: i32 = caps[3].parse().ok()?;

    let month = MONTHS_ID.iter().position(|m| *m == month_name)? as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parse every `tbody tr` into a record, in document order.
///
/// Never fails. Rows with fewer than two cells are skipped, any other row
/// yields a record even when some fields cannot be read.
pub fn parse_rows(html: &str) -> Vec<AvailabilityRecord> {
    let Some(selectors) = RowSelectors::new() else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let mut records = Vec::new();

    for row in document.select(&selectors.row) {
        let cells: Vec<ElementRef> = row.select(&selectors.cell).collect();
        if cells.len() < 2 {
            debug!("Skipping row with {} cells", cells.len());
            continue;
        }

        records.push(parse_row(&selectors, cells[0], cells[1]));
    }

    records
}

struct RowSelectors {
    row: Selector,
    cell: Selector,
    status: Selector,
    hidden: Selector,
}

impl RowSelectors {
    fn new() -> Option<Self> {
        Some(Self {
            row: Selector::parse("tbody tr").ok()?,
            cell: Selector::parse("td").ok()?,
            status: Selector::parse(".text-red, .text-green, .text-blue").ok()?,
            hidden: Selector::parse(".hide").ok()?,
        })
    }
}

fn parse_row(
    selectors: &RowSelectors,
    date_cell: ElementRef,
    status_cell: ElementRef,
) -> AvailabilityRecord {
    let date_text = spaced_text(date_cell);

    let status_text = match status_cell.select(&selectors.status).next() {
        Some(el) => spaced_text(el),
        None => spaced_text(status_cell),
    };

    let hidden = status_cell.select(&selectors.hidden).next().map(tight_text);
    let remaining = hidden.as_deref().and_then(parse_quota);

    let date = normalize_localized_date(&date_text);
    let (is_full, is_available) = classify(&status_text, hidden.is_some(), remaining);

    AvailabilityRecord {
        date_text,
        date,
        status_text,
        remaining,
        is_full,
        is_available,
    }
}

/// Decide `(is_full, is_available)` from the status label and the hidden quota element.
pub fn classify(status_text: &str, has_hidden: bool, remaining: Option<u32>) -> (bool, bool) {
    let st = status_text.to_lowercase();

    let full_by_text = st.contains("penuh");
    // Never observed to differ from `full_by_text`; kept until live responses say otherwise.
    let full_by_hidden = st.contains("kuota penuh") && has_hidden && remaining.is_none();
    let full_by_zero = remaining == Some(0);

    let is_full = full_by_text || full_by_hidden || full_by_zero;
    let is_available = !is_full
        && (AVAILABLE_MARKERS.iter().any(|m| st.contains(m)) || remaining.is_some_and(|n| n > 0));

    (is_full, is_available)
}

/// Quota counts are only trusted when the hidden text is nothing but digits.
fn parse_quota(raw: &str) -> Option<u32> {
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// Text fragments joined by single spaces, whitespace collapsed
fn spaced_text(el: ElementRef) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text fragments trimmed and concatenated
fn tight_text(el: ElementRef) -> String {
    el.text().map(str::trim).collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

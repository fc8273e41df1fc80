use quota_scan::AvailabilityRecord;

/// Multi-line, plain-language summary of one record
pub fn human_summary(record: &AvailabilityRecord) -> String {
    let remaining = match record.remaining {
        Some(n) => format!("{} quota", n),
        None => "unknown".to_string(),
    };

    let verdict = if record.is_available {
        "AVAILABLE ✅"
    } else if record.is_full {
        "FULL ❌"
    } else {
        "NOT YET AVAILABLE ❌"
    };

    let date_text = if record.date_text.is_empty() {
        "-"
    } else {
        record.date_text.as_str()
    };
    let status = if record.status_text.is_empty() {
        "-"
    } else {
        record.status_text.as_str()
    };

    [
        format!(
            "Date      : {} (ISO: {})",
            date_text,
            record.date_iso().unwrap_or_else(|| "-".to_string())
        ),
        format!("Status    : {}", status),
        format!("Remaining : {}", remaining),
        format!("Info      : {}", verdict),
    ]
    .join("\n")
}

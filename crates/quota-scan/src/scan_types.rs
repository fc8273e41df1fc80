use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;

use crate::parser::normalize_localized_date;

/// Availability status of one calendar date, as listed by the quota table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilityRecord {
    /// Raw localized label, e.g. "Rabu, 1 Oktober 2025"
    pub date_text: String,
    /// Normalized date, absent when the label could not be understood
    pub date: Option<NaiveDate>,
    /// Human-readable status label from the markup
    pub status_text: String,
    /// Remaining quota, absent when the site hides the exact count
    pub remaining: Option<u32>,
    /// Whether the date is fully booked
    pub is_full: bool,
    /// Whether the date can still be booked
    pub is_available: bool,
}

impl AvailabilityRecord {
    /// The normalized date as a `YYYY-MM-DD` string
    pub fn date_iso(&self) -> Option<String> {
        self.date.map(|d| d.format("%Y-%m-%d").to_string())
    }
}

/// The date a caller is looking for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Bare day of month; needs an explicit year-month
    Day(u32),
    /// `YYYY-MM-DD`
    Iso(String),
    /// Localized label such as "18 Oktober 2025", or any free text
    Localized(String),
}

impl Target {
    /// Derive the `YYYY-MM` this target belongs to, when it carries one.
    ///
    /// A bare day never does.
    pub fn year_month(&self) -> Option<String> {
        match self {
            Target::Day(_) => None,
            Target::Iso(iso) => iso.get(..7).map(str::to_string),
            Target::Localized(text) => {
                normalize_localized_date(text).map(|d| d.format("%Y-%m").to_string())
            }
        }
    }
}

/// Whether a string has the `YYYY-MM-DD` shape (separators only, digits are not checked)
pub(crate) fn looks_like_iso(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() == 10 && bytes[4] == b'-' && bytes[7] == b'-'
}

impl FromStr for Target {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::InvalidTarget("target date is empty".to_string()));
        }

        if trimmed.chars().all(|c| c.is_ascii_digit()) {
            let day = trimmed
                .parse::<u32>()
                .map_err(|e| ConfigError::InvalidTarget(format!("{}: {}", trimmed, e)))?;
            return Ok(Target::Day(day));
        }

        if looks_like_iso(trimmed) {
            return Ok(Target::Iso(trimmed.to_string()));
        }

        Ok(Target::Localized(trimmed.to_string()))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Day(day) => write!(f, "{}", day),
            Target::Iso(text) | Target::Localized(text) => f.write_str(text),
        }
    }
}

/// Check that a year-month string is a real `YYYY-MM` month
pub fn validate_year_month(year_month: &str) -> Result<(), ConfigError> {
    let shaped = year_month.len() == 7 && year_month.as_bytes()[4] == b'-';
    let parses = NaiveDate::parse_from_str(&format!("{}-01", year_month), "%Y-%m-%d").is_ok();

    if shaped && parses {
        Ok(())
    } else {
        Err(ConfigError::InvalidYearMonth(year_month.to_string()))
    }
}

/// Failures of the HTTP layer. Recoverable inside polling loops.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    /// The HTTP client could not be built
    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    /// Could not establish a connection
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The request or a read timed out
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The connection broke while sending or reading
    #[error("Read failed: {0}")]
    Read(String),

    /// The endpoint answered with a non-success status
    #[error("HTTP {status}")]
    Status {
        /// Final status code
        status: u16,
    },

    /// The retry budget ran out
    #[error("Retries exhausted after {attempts} attempts: {message}")]
    RetriesExhausted {
        /// Requests issued, including the first
        attempts: u32,
        /// Last failure seen
        message: String,
    },
}

/// Invalid or insufficient caller input. Always fatal, surfaced before any request.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Bare day targets cannot tell which month they belong to
    #[error("--year-month is required when the target is only a day number (e.g. --year-month 2025-10)")]
    MissingYearMonth,

    /// Year-month not shaped as `YYYY-MM`
    #[error("Invalid year-month '{0}', expected YYYY-MM")]
    InvalidYearMonth(String),

    /// Target could not be interpreted
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Another configuration value is out of range
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Errors surfaced to callers of the scan engine
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Configuration failure
    #[error(transparent)]
    Config(#[from] ConfigError),
}

use std::fmt;
use std::time::Duration;

use tracing::{info, warn};

use crate::scan_types::AvailabilityRecord;

/// Why the transport was rebuilt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    /// Every N successful requests
    Periodic,
    /// Too many consecutive failures
    ErrorStreak,
}

/// Why a polling loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The stop condition held
    Satisfied,
    /// The attempt budget ran out
    AttemptsExhausted,
    /// The caller cancelled the run
    Cancelled,
}

/// State transitions of the polling engine
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// The target date is listed
    Found {
        /// Cycle number, starting at 1
        attempt: u64,
        /// The matched record
        record: AvailabilityRecord,
    },
    /// The target date is not on the calendar yet
    NotFound {
        /// Cycle number, starting at 1
        attempt: u64,
        /// Target as given by the caller
        target: String,
        /// Month that was searched
        year_month: String,
    },
    /// Sleeping before the next regular cycle
    Waiting {
        /// Cycle that just finished
        attempt: u64,
        /// Sleep length
        delay: Duration,
    },
    /// Sleeping longer after a failed cycle
    BackingOff {
        /// Cycle that failed
        attempt: u64,
        /// Failures in a row, including this one
        consecutive_errors: u32,
        /// Sleep length
        delay: Duration,
        /// What went wrong
        error: String,
    },
    /// The transport was discarded and rebuilt
    SessionRefreshed {
        /// Trigger of the refresh
        reason: RefreshReason,
    },
    /// The loop ended
    Stopped {
        /// Why it ended
        reason: StopReason,
    },
}

/// Receives every [`PollEvent`] as it happens
pub trait PollObserver: Send + Sync {
    /// Handle one event
    fn on_event(&self, event: &PollEvent);
}

/// Writes one log line per event
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl PollObserver for LogObserver {
    fn on_event(&self, event: &PollEvent) {
        match event {
            PollEvent::Found { attempt, record } => info!(
                attempt,
                date = %record.date_text,
                status = %record.status_text,
                available = record.is_available,
                "[Found] target date is listed"
            ),
            PollEvent::NotFound {
                attempt,
                target,
                year_month,
            } => info!(attempt, "[Info] date {} not found in {}", target, year_month),
            PollEvent::Waiting { attempt, delay } => {
                info!(attempt, "[Waiting] next check in {}s", delay.as_secs())
            }
            PollEvent::BackingOff {
                attempt,
                consecutive_errors,
                delay,
                error,
            } => warn!(
                attempt,
                consecutive_errors,
                "[Backoff] attempt failed: {}; sleeping {}s",
                error,
                delay.as_secs()
            ),
            PollEvent::SessionRefreshed { reason } => info!("[Session] refreshed ({})", reason),
            PollEvent::Stopped { reason } => info!("[Stop] {}", reason),
        }
    }
}

impl fmt::Display for RefreshReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshReason::Periodic => f.write_str("periodic"),
            RefreshReason::ErrorStreak => f.write_str("error streak"),
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Satisfied => f.write_str("stop condition met"),
            StopReason::AttemptsExhausted => f.write_str("attempt limit reached"),
            StopReason::Cancelled => f.write_str("cancelled by user"),
        }
    }
}

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::matcher::find_target;
use crate::parser::parse_rows;
use crate::poll_events::{PollEvent, PollObserver, RefreshReason, StopReason};
use crate::scan_types::*;
use crate::transport::{Transport, TransportFactory};

/// Attempt cap of the bounded loops when the caller does not give one
pub const DEFAULT_MAX_ATTEMPTS: u64 = 9999;

/// Configuration of the polling engine
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Site whose quota is polled (8 = Semeru)
    pub site_id: u32,

    /// Month to search, `YYYY-MM`
    pub year_month: String,

    /// Pause between regular cycles (default: 20 seconds)
    pub interval: Duration,

    /// Cap on the extra delay added after failures (default: 60 seconds)
    pub max_backoff_penalty: Duration,

    /// Consecutive failures before the transport is rebuilt (default: 3)
    pub error_refresh_threshold: u32,

    /// Successful requests between periodic refreshes of the indefinite loop (default: 100)
    pub refresh_every: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            site_id: 8,
            year_month: String::new(),
            interval: Duration::from_secs(20),
            max_backoff_penalty: Duration::from_secs(60),
            error_refresh_threshold: 3,
            refresh_every: 100,
        }
    }
}

impl PollConfig {
    /// Delay after the `consecutive_errors`-th failure in a row:
    /// the interval plus `2^n` seconds, the extra part capped.
    pub fn error_backoff(&self, consecutive_errors: u32) -> Duration {
        let extra = Duration::from_secs(2u64.saturating_pow(consecutive_errors));
        self.interval + extra.min(self.max_backoff_penalty)
    }
}

/// Shape of one polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopPolicy {
    /// Stop after this many cycles; `None` runs until cancelled
    pub max_attempts: Option<u64>,

    /// Rebuild the transport every N successful requests
    pub refresh_every: Option<u64>,
}

/// Mutable state of one polling run
pub struct PollSession {
    transport: Option<Box<dyn Transport>>,
    consecutive_errors: u32,
    successful_requests: u64,
    last_record: Option<AvailabilityRecord>,
}

impl PollSession {
    /// Failed cycles since the last success
    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Successful cycles over the whole run
    pub fn successful_requests(&self) -> u64 {
        self.successful_requests
    }

    /// Record matched by the latest successful cycle
    pub fn last_record(&self) -> Option<&AvailabilityRecord> {
        self.last_record.as_ref()
    }
}

/// Runs fetch, parse and match cycles under one of three policies.
///
/// Owns the only transport; cycles never overlap.
pub struct QuotaPoller {
    factory: Arc<dyn TransportFactory>,
    observer: Arc<dyn PollObserver>,
    config: PollConfig,
    session: PollSession,
}

impl QuotaPoller {
    /// Create a poller and its first transport
    pub fn new(
        factory: Arc<dyn TransportFactory>,
        observer: Arc<dyn PollObserver>,
        config: PollConfig,
    ) -> Result<Self, ScanError> {
        validate_year_month(&config.year_month)?;
        let transport = factory.build()?;

        Ok(Self {
            factory,
            observer,
            config,
            session: PollSession {
                transport: Some(transport),
                consecutive_errors: 0,
                successful_requests: 0,
                last_record: None,
            },
        })
    }

    /// Current session state
    pub fn session(&self) -> &PollSession {
        &self.session
    }

    /// Poller configuration
    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Run a single cycle. Transport failures are returned to the caller.
    pub async fn check_once(
        &mut self,
        target: &Target,
    ) -> Result<Option<AvailabilityRecord>, ScanError> {
        let record = self.run_cycle(target, 1).await?;
        self.session.successful_requests += 1;
        self.session.last_record = record.clone();
        Ok(record)
    }

    /// Single cycle that gives up as soon as `cancel` fires, returning `None`.
    ///
    /// An interrupted fetch leaves the transport slot empty; the next cycle builds a fresh one.
    pub async fn check_cancellable(
        &mut self,
        target: &Target,
        cancel: &CancellationToken,
    ) -> Result<Option<AvailabilityRecord>, ScanError> {
        let outcome = tokio::select! {
            biased;

            _ = cancel.cancelled() => None,
            result = self.check_once(target) => Some(result),
        };

        match outcome {
            Some(result) => result,
            None => {
                self.emit(PollEvent::Stopped {
                    reason: StopReason::Cancelled,
                });
                Ok(None)
            }
        }
    }

    /// Poll until the target date appears on the calendar, whatever its status
    pub async fn wait_until_listed(
        &mut self,
        target: &Target,
        max_attempts: u64,
        cancel: &CancellationToken,
    ) -> Option<AvailabilityRecord> {
        let policy = LoopPolicy {
            max_attempts: Some(max_attempts),
            refresh_every: None,
        };
        self.poll_until(target, policy, cancel, |record| record.is_some())
            .await
    }

    /// Poll until the target date is listed and bookable
    pub async fn wait_until_available(
        &mut self,
        target: &Target,
        max_attempts: u64,
        cancel: &CancellationToken,
    ) -> Option<AvailabilityRecord> {
        let policy = LoopPolicy {
            max_attempts: Some(max_attempts),
            refresh_every: None,
        };
        self.poll_until(target, policy, cancel, |record| {
            record.is_some_and(|r| r.is_available)
        })
        .await
    }

    /// Poll until cancelled, or until the date is bookable when `stop_when_available` is set.
    ///
    /// The transport is rebuilt every `refresh_every` successful requests.
    pub async fn watch(
        &mut self,
        target: &Target,
        stop_when_available: bool,
        cancel: &CancellationToken,
    ) -> Option<AvailabilityRecord> {
        let policy = LoopPolicy {
            max_attempts: None,
            refresh_every: Some(self.config.refresh_every),
        };
        self.poll_until(target, policy, cancel, |record| {
            stop_when_available && record.is_some_and(|r| r.is_available)
        })
        .await
    }

    /// Shared loop behind every repeating policy.
    ///
    /// Failed cycles are never returned: they are counted, backed off and
    /// retried. Returns the record once `stop` holds, `None` when attempts
    /// run out or the token is cancelled.
    pub async fn poll_until<P>(
        &mut self,
        target: &Target,
        policy: LoopPolicy,
        cancel: &CancellationToken,
        stop: P,
    ) -> Option<AvailabilityRecord>
    where
        P: Fn(Option<&AvailabilityRecord>) -> bool,
    {
        let mut attempt = 0u64;

        if policy.max_attempts == Some(0) {
            self.emit(PollEvent::Stopped {
                reason: StopReason::AttemptsExhausted,
            });
            return None;
        }

        loop {
            if cancel.is_cancelled() {
                self.emit(PollEvent::Stopped {
                    reason: StopReason::Cancelled,
                });
                return None;
            }

            attempt += 1;
            let last_attempt = policy.max_attempts.is_some_and(|max| attempt >= max);

            let (delay, failed) = match self.run_cycle(target, attempt).await {
                Ok(record) => {
                    self.session.successful_requests += 1;
                    self.session.consecutive_errors = 0;
                    self.session.last_record = record.clone();

                    if let Some(every) = policy.refresh_every {
                        if every > 0 && self.session.successful_requests % every == 0 {
                            self.refresh(RefreshReason::Periodic);
                        }
                    }

                    if stop(record.as_ref()) {
                        self.emit(PollEvent::Stopped {
                            reason: StopReason::Satisfied,
                        });
                        return record;
                    }

                    let delay = self.config.interval;
                    if !last_attempt {
                        self.emit(PollEvent::Waiting { attempt, delay });
                    }
                    (delay, false)
                }
                Err(e) => {
                    self.session.consecutive_errors += 1;
                    let delay = self.config.error_backoff(self.session.consecutive_errors);
                    if last_attempt {
                        warn!(attempt, "Last attempt failed: {}", e);
                    } else {
                        self.emit(PollEvent::BackingOff {
                            attempt,
                            consecutive_errors: self.session.consecutive_errors,
                            delay,
                            error: e.to_string(),
                        });
                    }
                    (delay, true)
                }
            };

            if last_attempt {
                self.emit(PollEvent::Stopped {
                    reason: StopReason::AttemptsExhausted,
                });
                return None;
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    self.emit(PollEvent::Stopped {
                        reason: StopReason::Cancelled,
                    });
                    return None;
                }
                _ = sleep(delay) => {}
            }

            if failed && self.session.consecutive_errors >= self.config.error_refresh_threshold {
                self.refresh(RefreshReason::ErrorStreak);
            }
        }
    }

    /// One fetch, parse and match
    async fn run_cycle(
        &mut self,
        target: &Target,
        attempt: u64,
    ) -> Result<Option<AvailabilityRecord>, ScanError> {
        let transport = match self.session.transport.take() {
            Some(transport) => transport,
            None => self.factory.build()?,
        };
        let fetched = transport
            .fetch(self.config.site_id, &self.config.year_month)
            .await;
        self.session.transport = Some(transport);
        let html = fetched?;

        let records = parse_rows(&html);
        debug!(rows = records.len(), attempt, "Parsed quota table");

        match find_target(&records, target) {
            Some(record) => {
                self.emit(PollEvent::Found {
                    attempt,
                    record: record.clone(),
                });
                Ok(Some(record.clone()))
            }
            None => {
                self.emit(PollEvent::NotFound {
                    attempt,
                    target: target.to_string(),
                    year_month: self.config.year_month.clone(),
                });
                Ok(None)
            }
        }
    }

    /// Drop the current transport, then build a new one
    fn refresh(&mut self, reason: RefreshReason) {
        drop(self.session.transport.take());

        match self.factory.build() {
            Ok(transport) => {
                self.session.transport = Some(transport);
                self.emit(PollEvent::SessionRefreshed { reason });
            }
            Err(e) => {
                // Next cycle retries the build
                warn!("Failed to rebuild transport: {}", e);
            }
        }
    }

    fn emit(&self, event: PollEvent) {
        self.observer.on_event(&event);
    }
}

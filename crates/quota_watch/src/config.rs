use std::time::Duration;

use quota_scan::{ConfigError, PollConfig, Target, TransportConfig, validate_year_month};
use validator::{Validate, ValidationError};

use crate::cli::{Cli, WaitUntil};

/// Which polling policy to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One check, then exit
    Single,
    /// Until the date is listed, at most this many attempts
    UntilListed(u64),
    /// Until the date is bookable, at most this many attempts
    UntilAvailable(u64),
    /// Until interrupted
    Watch {
        /// Also stop once the date is bookable
        stop_when_available: bool,
    },
}

/// Fully resolved run configuration
#[derive(Debug, Validate)]
pub struct WatchConfig {
    /// Site ID
    #[validate(range(min = 1, message = "Site ID must be positive"))]
    pub site_id: u32,

    /// Month to search
    #[validate(custom(function = "validate_year_month_field"))]
    pub year_month: String,

    /// Date being looked for
    pub target: Target,

    /// Polling policy
    pub mode: RunMode,

    /// Seconds between cycles
    #[validate(range(min = 1, message = "Interval must be at least one second"))]
    pub interval_secs: u64,

    /// Attempt limit of the bounded loops
    #[validate(range(min = 1, message = "Max attempts must be at least 1"))]
    pub max_attempts: u64,

    /// Connect timeout in seconds
    #[validate(range(min = 1, message = "Connect timeout must be at least one second"))]
    pub timeout_connect_secs: u64,

    /// Read timeout in seconds
    #[validate(range(min = 1, message = "Read timeout must be at least one second"))]
    pub timeout_read_secs: u64,

    /// Force IPv4 with TCP keepalive
    pub force_ipv4: bool,

    /// Site root URL
    #[validate(url(message = "Base URL must be an absolute URL"))]
    pub base_url: String,

    /// Print JSON instead of a summary
    pub json: bool,
}

impl WatchConfig {
    /// Combine parsed flags with the target text, deriving the month when needed
    pub fn resolve(cli: Cli, target_text: &str) -> Result<Self, ConfigError> {
        let target: Target = target_text.parse()?;

        let year_month = match cli.year_month {
            Some(ym) => ym.trim().to_string(),
            None => target.year_month().ok_or(ConfigError::MissingYearMonth)?,
        };

        let mode = match (cli.wait_until, cli.loop_forever) {
            (Some(WaitUntil::Listed), _) => RunMode::UntilListed(cli.max_attempts),
            (Some(WaitUntil::Available), _) => RunMode::UntilAvailable(cli.max_attempts),
            (None, true) => RunMode::Watch {
                stop_when_available: cli.stop_when_available,
            },
            (None, false) => RunMode::Single,
        };

        let config = Self {
            site_id: cli.site_id,
            year_month,
            target,
            mode,
            interval_secs: cli.interval,
            max_attempts: cli.max_attempts,
            timeout_connect_secs: cli.timeout_connect,
            timeout_read_secs: cli.timeout_read,
            force_ipv4: cli.ipv4,
            base_url: cli.base_url,
            json: cli.json,
        };

        config
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        Ok(config)
    }

    /// Settings for the HTTP transport
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            base_url: self.base_url.clone(),
            connect_timeout: Duration::from_secs(self.timeout_connect_secs),
            read_timeout: Duration::from_secs(self.timeout_read_secs),
            force_ipv4: self.force_ipv4,
            ..TransportConfig::default()
        }
    }

    /// Settings for the polling engine
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            site_id: self.site_id,
            year_month: self.year_month.clone(),
            interval: Duration::from_secs(self.interval_secs),
            ..PollConfig::default()
        }
    }
}

fn validate_year_month_field(year_month: &str) -> Result<(), ValidationError> {
    validate_year_month(year_month).map_err(|_| ValidationError::new("invalid_year_month"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["quota_watch"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_bare_day_requires_year_month() {
        let result = WatchConfig::resolve(cli(&[]), "18");
        assert_eq!(result.unwrap_err(), ConfigError::MissingYearMonth);
    }

    #[test]
    fn test_bare_day_with_year_month() {
        let config = WatchConfig::resolve(cli(&["--year-month", "2025-10"]), "18").unwrap();
        assert_eq!(config.target, Target::Day(18));
        assert_eq!(config.year_month, "2025-10");
        assert_eq!(config.mode, RunMode::Single);
    }

    #[test]
    fn test_year_month_derived_from_target() {
        let iso = WatchConfig::resolve(cli(&[]), "2025-10-18").unwrap();
        assert_eq!(iso.year_month, "2025-10");

        let localized = WatchConfig::resolve(cli(&[]), "Sabtu, 18 Oktober 2025").unwrap();
        assert_eq!(localized.year_month, "2025-10");
    }

    #[test]
    fn test_explicit_year_month_wins() {
        let config =
            WatchConfig::resolve(cli(&["--year-month", "2025-11"]), "2025-10-18").unwrap();
        assert_eq!(config.year_month, "2025-11");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_month = WatchConfig::resolve(cli(&["--year-month", "2025-13"]), "18");
        assert!(matches!(bad_month, Err(ConfigError::Validation(_))));

        let bad_interval = WatchConfig::resolve(cli(&["--interval", "0"]), "2025-10-18");
        assert!(matches!(bad_interval, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_malformed_base_url_rejected() {
        for base_url in ["", "bromotenggersemeru.id", "not a url"] {
            let result =
                WatchConfig::resolve(cli(&["--base-url", base_url]), "2025-10-18");
            assert!(
                matches!(result, Err(ConfigError::Validation(_))),
                "{base_url:?} should be rejected"
            );
        }

        let local = WatchConfig::resolve(cli(&["--base-url", "http://127.0.0.1:8080"]), "2025-10-18");
        assert!(local.is_ok());
    }

    #[test]
    fn test_run_modes() {
        let watch = WatchConfig::resolve(cli(&["--loop", "--stop-when-available"]), "2025-10-18")
            .unwrap();
        assert_eq!(
            watch.mode,
            RunMode::Watch {
                stop_when_available: true
            }
        );

        let listed = WatchConfig::resolve(
            cli(&["--wait-until", "listed", "--max-attempts", "7"]),
            "2025-10-18",
        )
        .unwrap();
        assert_eq!(listed.mode, RunMode::UntilListed(7));
    }

    #[test]
    fn test_derived_engine_configs() {
        let config = WatchConfig::resolve(
            cli(&["--interval", "3", "--timeout-read", "10", "--ipv4"]),
            "2025-10-18",
        )
        .unwrap();

        let transport = config.transport_config();
        assert_eq!(transport.read_timeout, Duration::from_secs(10));
        assert_eq!(transport.connect_timeout, Duration::from_secs(5));
        assert!(transport.force_ipv4);

        let poll = config.poll_config();
        assert_eq!(poll.site_id, 8);
        assert_eq!(poll.interval, Duration::from_secs(3));
        assert_eq!(poll.refresh_every, 100);
    }
}

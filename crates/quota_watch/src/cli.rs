//! Command-line interface.

use clap::{Parser, ValueEnum};
use quota_scan::DEFAULT_MAX_ATTEMPTS;

/// Poll the Semeru/Bromo climbing quota for a target date.
#[derive(Parser, Debug)]
#[command(name = "quota_watch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Site ID (8 = Semeru)
    #[arg(long, env = "KAPASITAS_SITE_ID", default_value_t = 8)]
    pub site_id: u32,

    /// Month to search, YYYY-MM (derived from the target when possible)
    #[arg(long, env = "KAPASITAS_YEAR_MONTH")]
    pub year_month: Option<String>,

    /// Target date: 2025-10-18 / '18 Oktober 2025' / 18
    #[arg(long, env = "KAPASITAS_TARGET")]
    pub target: Option<String>,

    /// Keep polling until interrupted
    #[arg(long = "loop")]
    pub loop_forever: bool,

    /// With --loop, stop as soon as the date is bookable
    #[arg(long)]
    pub stop_when_available: bool,

    /// Poll until the date is listed or bookable, up to --max-attempts
    #[arg(long, value_enum, conflicts_with = "loop_forever")]
    pub wait_until: Option<WaitUntil>,

    /// Attempt limit for --wait-until
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u64,

    /// Polling interval in seconds
    #[arg(long, env = "KAPASITAS_INTERVAL", default_value_t = 20)]
    pub interval: u64,

    /// Connect timeout in seconds
    #[arg(long, default_value_t = 5)]
    pub timeout_connect: u64,

    /// Read timeout in seconds
    #[arg(long, default_value_t = 45)]
    pub timeout_read: u64,

    /// Force IPv4 with TCP keepalive (recommended on VPS/DC hosts)
    #[arg(long)]
    pub ipv4: bool,

    /// Site root URL
    #[arg(long, env = "KAPASITAS_BASE_URL", default_value = "https://bromotenggersemeru.id")]
    pub base_url: String,

    /// Print the final record as JSON
    #[arg(long)]
    pub json: bool,
}

/// Stop condition of the bounded loops
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// The date shows up on the calendar, whatever its status
    Listed,
    /// The date shows up and can be booked
    Available,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_loop_flags() {
        let cli = Cli::try_parse_from([
            "quota_watch",
            "--target",
            "18",
            "--year-month",
            "2025-10",
            "--loop",
            "--stop-when-available",
            "--interval",
            "1",
            "--ipv4",
        ])
        .unwrap();

        assert!(cli.loop_forever);
        assert!(cli.stop_when_available);
        assert!(cli.ipv4);
        assert_eq!(cli.interval, 1);
        assert_eq!(cli.wait_until, None);
    }

    #[test]
    fn test_wait_until_conflicts_with_loop() {
        let result = Cli::try_parse_from([
            "quota_watch",
            "--target",
            "2025-10-18",
            "--loop",
            "--wait-until",
            "listed",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_wait_until_value() {
        let cli = Cli::try_parse_from([
            "quota_watch",
            "--target",
            "2025-10-18",
            "--wait-until",
            "available",
            "--max-attempts",
            "30",
        ])
        .unwrap();

        assert_eq!(cli.wait_until, Some(WaitUntil::Available));
        assert_eq!(cli.max_attempts, 30);
    }
}

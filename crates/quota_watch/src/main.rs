//! Entry point of the quota watcher.
//! Checks, or keeps checking, whether a date is bookable on the Semeru/Bromo quota calendar.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use quota_scan::{AvailabilityRecord, HttpTransportFactory, LogObserver, QuotaPoller};
use tokio_util::sync::CancellationToken;

mod cli;
mod config;
mod logging;
mod summary;

use cli::Cli;
use config::{RunMode, WatchConfig};
use summary::human_summary;

/// Ask for the target on stdin when it was not passed as a flag
fn read_target_interactively() -> anyhow::Result<String> {
    print!("Enter target date (e.g. 2025-10-18 / '18 Oktober 2025' / 18): ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read target date")?;
    Ok(line.trim().to_string())
}

fn load_config(cli: Cli) -> anyhow::Result<WatchConfig> {
    let target = match cli.target.clone() {
        Some(target) => target,
        None => read_target_interactively()?,
    };
    Ok(WatchConfig::resolve(cli, &target)?)
}

fn report(config: &WatchConfig, record: Option<&AvailabilityRecord>) -> anyhow::Result<()> {
    if config.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    match record {
        Some(record) => println!("{}", human_summary(record)),
        None => println!(
            "No matching result for {} in {}",
            config.target, config.year_month
        ),
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    logging::init();

    let config = match load_config(Cli::parse()) {
        Ok(config) => config,
        Err(e) => {
            log::error!("❌ {:#}", e);
            std::process::exit(2);
        }
    };

    log::info!(
        "🚀 Polling site {} for {} in {} ({:?})",
        config.site_id,
        config.target,
        config.year_month,
        config.mode
    );

    let factory = Arc::new(HttpTransportFactory::new(config.transport_config()));
    let mut poller = QuotaPoller::new(factory, Arc::new(LogObserver), config.poll_config())?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        log::info!("🛑 Interrupted (Ctrl+C), stopping");
        interrupt.cancel();

        // A request may still be in flight; a second Ctrl+C quits at once
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("🛑 Interrupted again, exiting");
            std::process::exit(130);
        }
    });

    let record = match config.mode {
        RunMode::Single => poller.check_cancellable(&config.target, &cancel).await?,
        RunMode::UntilListed(max_attempts) => {
            poller
                .wait_until_listed(&config.target, max_attempts, &cancel)
                .await
        }
        RunMode::UntilAvailable(max_attempts) => {
            poller
                .wait_until_available(&config.target, max_attempts, &cancel)
                .await
        }
        RunMode::Watch {
            stop_when_available,
        } => {
            poller
                .watch(&config.target, stop_when_available, &cancel)
                .await
        }
    };

    report(&config, record.as_ref())
}

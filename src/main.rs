//! Login Audit - Vision One inactive account report
//!
//! Lists IAM accounts, looks up each account's most recent login in the audit
//! logs and exports the accounts inactive past the cutoff to a CSV report.

#![deny(clippy::all)]

mod api;
mod audit;
mod config;
mod error;

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{error, info, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use api::ApiClient;
use audit::AuditSummary;
use config::Config;
use error::{ApiError, AppError};

/// Flag Vision One accounts without a login in the last 90 days
#[derive(Parser, Debug)]
#[command(name = "login-audit", version, about, long_about = None)]
struct Cli {
    /// Vision One API token
    #[arg(short = 't', long = "token", value_name = "API_TOKEN")]
    token: String,
}

fn main() {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config) {
        eprintln!("Failed to initialize logging: {:#}", e);
        std::process::exit(1);
    }

    info!("Starting login-audit v{}", env!("CARGO_PKG_VERSION"));

    // Requests are issued one at a time, a single-threaded runtime is enough
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create Tokio runtime: {}", e);
            eprintln!("Failed to start: {}", e);
            std::process::exit(1);
        }
    };

    match runtime.block_on(run(cli, &config)) {
        Ok(summary) => print_summary(&summary, &config),
        Err(e) => {
            error!("Audit failed: {:#}", e);
            eprintln!("Error: {}", user_message(&e));
            eprintln!("Details: {:#}", e);
            eprintln!("See {} for more information.", config.logging.error_log.display());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing/logging.
///
/// Console output follows the configured level; warnings and errors are also
/// appended to the error log.
fn init_logging(config: &Config) -> Result<()> {
    let error_log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.logging.error_log)
        .with_context(|| {
            format!(
                "Could not open error log {}",
                config.logging.error_log.display()
            )
        })?;

    let console_filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(error_log_layer(Mutex::new(error_log)))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Plain-text layer receiving every WARN and ERROR event, retries included.
fn error_log_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer::<S>()
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(LevelFilter::WARN)
}

/// Build the client and run the audit.
async fn run(cli: Cli, config: &Config) -> Result<AuditSummary> {
    let client = ApiClient::new(&config.api, &config.retry, &cli.token)
        .context("Failed to create API client")?;
    drop(cli);

    let summary = audit::run_audit(&client, config, Utc::now())
        .await
        .context("Audit run failed")?;

    Ok(summary)
}

/// Pick the most helpful message for the console.
fn user_message(err: &anyhow::Error) -> &str {
    if let Some(app) = err.downcast_ref::<AppError>() {
        return app.user_message();
    }
    if let Some(api) = err.downcast_ref::<ApiError>() {
        return api.user_message();
    }
    "An error occurred."
}

fn print_summary(summary: &AuditSummary, config: &Config) {
    let report = std::fs::canonicalize(&config.report.path)
        .unwrap_or_else(|_| config.report.path.clone());

    if summary.flagged.is_empty() {
        println!("No accounts found that need to be removed.");
    } else {
        println!("Filtered accounts saved to: {}", report.display());
    }
    println!(
        "Cutoff: {}",
        summary.cutoff.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("Total IAM accounts: {}", summary.total_accounts);
    println!(
        "Total accounts scheduled for removal: {}",
        summary.flagged.len()
    );
}

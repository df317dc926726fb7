//! Inactive account audit.
//!
//! This module provides functionality for:
//! - Classifying accounts against a fixed inactivity cutoff
//! - Writing the removal report
//! - Driving a full run: accounts, then each account's latest login

pub mod classifier;
pub mod report;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::api::{ApiClient, LoginQuery};
use crate::config::Config;
use crate::error::AppError;

pub use classifier::{classify, ClassificationResult};
pub use report::write_report;

/// Outcome of a completed audit run.
#[derive(Debug, Clone)]
pub struct AuditSummary {
    /// Instant every account was judged against.
    pub cutoff: DateTime<Utc>,
    pub total_accounts: usize,
    /// Flagged accounts, in account fetch order.
    pub flagged: Vec<ClassificationResult>,
}

/// Run the audit and write the report.
///
/// Accounts are processed one at a time; the first unrecoverable error aborts
/// the run and no report is written.
pub async fn run_audit(
    client: &ApiClient,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<AuditSummary, AppError> {
    let cutoff = config.audit.cutoff(now);
    let query = LoginQuery::new(&config.audit, now);
    info!(%cutoff, "Auditing accounts inactive for {} days", config.audit.inactivity_days);

    let accounts = client.list_accounts().await?;
    let total_accounts = accounts.len();

    let mut flagged = Vec::new();
    for (idx, account) in accounts.iter().enumerate() {
        let latest_login = client.latest_login(&account.user_id, &query).await?;

        if let Some(result) = classify(account, latest_login, cutoff) {
            match latest_login {
                Some(login) => info!(user = %account.user_id, %login, "Inactive since last login"),
                None => warn!(user = %account.user_id, "No login activity found"),
            }
            flagged.push(result);
        }

        // Log progress every 10 accounts
        if (idx + 1) % 10 == 0 {
            info!("Processed {}/{} accounts", idx + 1, total_accounts);
        }
    }

    write_report(&flagged, &config.report.path)?;
    info!(
        "Flagged {} of {} accounts, report written to {}",
        flagged.len(),
        total_accounts,
        config.report.path.display()
    );

    Ok(AuditSummary {
        cutoff,
        total_accounts,
        flagged,
    })
}

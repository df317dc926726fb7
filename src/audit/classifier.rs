//! Inactivity classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::models::Account;

/// Action requested for a flagged account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    Remove,
}

/// An account recommended for removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    #[serde(rename = "UserId")]
    pub user_id: String,

    #[serde(rename = "RoleName")]
    pub role_name: String,

    #[serde(rename = "RequestType")]
    pub request_type: RequestType,
}

/// Flag an account whose latest login is missing or strictly older than `cutoff`.
///
/// A login exactly at the cutoff counts as active.
pub fn classify(
    account: &Account,
    latest_login: Option<DateTime<Utc>>,
    cutoff: DateTime<Utc>,
) -> Option<ClassificationResult> {
    let inactive = match latest_login {
        None => true,
        Some(login) => login < cutoff,
    };

    inactive.then(|| ClassificationResult {
        user_id: account.user_id.clone(),
        role_name: account.role_name.clone(),
        request_type: RequestType::Remove,
    })
}

//! Data models for the Vision One IAM and audit-log APIs.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Role name recorded when the platform omits one.
pub const UNKNOWN_ROLE: &str = "Unknown";

/// An IAM account as used by the audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Account email; identity of the account.
    pub user_id: String,

    /// Role assigned to the account (e.g., "Master Administrator").
    pub role_name: String,
}

/// A single log-on event for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginEvent {
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
}

/// One page of a paginated list response.
///
/// Vision One returns `items` plus a `nextLink` continuation URL; some
/// endpoints still use the OData spelling.
#[derive(Debug, Deserialize)]
pub(crate) struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,

    #[serde(rename = "nextLink", alias = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

/// IAM account item from `/v3.0/iam/accounts`.
#[derive(Debug, Deserialize)]
pub(crate) struct AccountItem {
    pub email: Option<String>,
    pub role: Option<String>,
}

impl AccountItem {
    /// Convert into an [`Account`], or `None` when the item has no email.
    pub fn into_account(self) -> Option<Account> {
        let user_id = self.email.filter(|e| !e.trim().is_empty())?;
        Some(Account {
            user_id,
            role_name: self.role.unwrap_or_else(|| UNKNOWN_ROLE.to_string()),
        })
    }
}

/// Audit log item from `/v3.0/audit/logs`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuditLogItem {
    pub logged_date_time: Option<String>,
    pub logged_user: Option<String>,
    pub activity: Option<String>,
}

impl AuditLogItem {
    /// Whether this entry records a successful log-on.
    ///
    /// Entries without an `activity` are counted; any other activity
    /// (log-off, failed attempts) is not.
    pub fn is_log_on(&self) -> bool {
        match self.activity.as_deref() {
            Some(activity) => activity.trim().eq_ignore_ascii_case("log on"),
            None => true,
        }
    }

    /// Parse the entry's timestamp, if present and well-formed.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = self.logged_date_time.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

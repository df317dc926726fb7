//! Login activity lookup through the audit-log endpoint.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, warn};

use super::client::{ApiClient, ApiRequest};
use super::models::{AuditLogItem, LoginEvent};
use super::pagination::collect_pages;
use crate::config::AuditConfig;
use crate::error::ApiError;

/// Time window and category for login lookups, fixed once per run.
#[derive(Debug, Clone)]
pub struct LoginQuery {
    category: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl LoginQuery {
    /// Cover the platform's whole retention window ending at `now`.
    pub fn new(audit: &AuditConfig, now: DateTime<Utc>) -> Self {
        Self {
            category: audit.login_category.clone(),
            start: audit.retention_start(now),
            end: now,
        }
    }

    /// `TMV1-Filter` expression selecting one user's logon/logoff events.
    pub fn filter_for(&self, user_id: &str) -> String {
        format!(
            "(category eq '{}') and (loggedUser eq '{}')",
            escape_literal(&self.category),
            escape_literal(user_id)
        )
    }
}

/// Double single quotes so the value stays inside an OData string literal.
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl ApiClient {
    /// Most recent login for `user_id` within the query window.
    ///
    /// `None` means no login events were found, which is an expected outcome.
    pub async fn latest_login(
        &self,
        user_id: &str,
        query: &LoginQuery,
    ) -> Result<Option<DateTime<Utc>>, ApiError> {
        let api = self.api_config();
        let request = ApiRequest::get(api.audit_logs_path.as_str())
            .param("top", api.page_size)
            .param("orderBy", "loggedDateTime desc")
            .param("startDateTime", format_instant(query.start))
            .param("endDateTime", format_instant(query.end))
            .filter(query.filter_for(user_id));

        let items: Vec<AuditLogItem> = collect_pages(self, request, api.page_size).await?;
        let total = items.len();

        let latest = login_events(user_id, items)
            .filter(|event| {
                let matches = event.user_id.eq_ignore_ascii_case(user_id);
                if !matches {
                    warn!(
                        user = user_id,
                        logged_user = %event.user_id,
                        "Ignoring audit entry for a different user"
                    );
                }
                matches
            })
            .map(|event| event.timestamp)
            .max();

        debug!(user = user_id, events = total, latest = ?latest, "Resolved latest login");
        Ok(latest)
    }
}

/// Reduce raw audit entries to log-on events, dropping every other activity
/// and entries without a usable timestamp.
fn login_events(
    user_id: &str,
    items: Vec<AuditLogItem>,
) -> impl Iterator<Item = LoginEvent> + '_ {
    items.into_iter().filter_map(move |item| {
        if !item.is_log_on() {
            return None;
        }
        let Some(timestamp) = item.timestamp() else {
            warn!(
                user = user_id,
                logged_date_time = ?item.logged_date_time,
                "Skipping audit entry with invalid timestamp"
            );
            return None;
        };
        Some(LoginEvent {
            user_id: item.logged_user.unwrap_or_else(|| user_id.to_string()),
            timestamp,
        })
    })
}

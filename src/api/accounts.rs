//! IAM account listing.

use tracing::{info, warn};

use super::client::{ApiClient, ApiRequest};
use super::models::{Account, AccountItem};
use super::pagination::collect_pages;
use crate::error::ApiError;

impl ApiClient {
    /// List every IAM account, in the order the platform returns them.
    ///
    /// Accounts without an email cannot be matched against audit logs and are
    /// skipped.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, ApiError> {
        let api = self.api_config();
        let request = ApiRequest::get(api.accounts_path.as_str()).param("top", api.page_size);

        let items: Vec<AccountItem> = collect_pages(self, request, api.page_size).await?;
        let fetched = items.len();

        let accounts: Vec<Account> = items
            .into_iter()
            .enumerate()
            .filter_map(|(idx, item)| {
                let account = item.into_account();
                if account.is_none() {
                    warn!(position = idx, "Skipping IAM account without an email");
                }
                account
            })
            .collect();

        info!(
            "Retrieved {} IAM accounts ({} skipped)",
            accounts.len(),
            fetched - accounts.len()
        );
        Ok(accounts)
    }
}

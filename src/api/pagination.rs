//! Cursor pagination over Vision One list endpoints.

use serde::de::DeserializeOwned;
use tracing::debug;

use super::client::{ApiClient, ApiRequest};
use super::models::Page;
use crate::error::ApiError;

/// Fetch every page of a list endpoint, concatenating items in page order.
///
/// Stops when a page carries no continuation link or returns fewer items than
/// `page_size`. Transport errors propagate unmodified.
pub(crate) async fn collect_pages<T: DeserializeOwned>(
    client: &ApiClient,
    first: ApiRequest,
    page_size: usize,
) -> Result<Vec<T>, ApiError> {
    let interval = client.api_config().page_interval();
    let mut items = Vec::new();
    let mut request = first;
    let mut page_number = 1;

    loop {
        let body = client.call(&request).await?;
        let page: Page<T> =
            serde_json::from_value(body).map_err(|e| ApiError::ParseFailed(e.to_string()))?;

        let count = page.items.len();
        items.extend(page.items);
        debug!(page = page_number, count, total = items.len(), "Fetched page");

        let next = match page.next_link {
            Some(link) if count >= page_size => link,
            _ => break,
        };

        if !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
        request = request.follow(next);
        page_number += 1;
    }

    Ok(items)
}

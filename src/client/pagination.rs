//! Paginated list iteration over both endpoint generations.
//!
//! A listing response carries its items in some array property plus an
//! optional `nextPageKey`. First-generation endpoints expect the key
//! appended to the original query; second-generation endpoints expect the
//! follow-up query string to contain only the key. Iteration is strictly
//! forward and ends when no key is returned.

use crate::api::Pagination;
use crate::cancel::CancelToken;
use crate::error::HttpError;

use super::retry::{RetrySetting, send_with_retry};
use super::transport::{HttpRequest, HttpTransport};

/// Query parameter carrying the continuation key.
const NEXT_PAGE_KEY: &str = "nextPageKey";

/// Fetch every page of a listing.
///
/// `request` describes the first page; follow-up requests derive their query
/// string from `style`. Items are taken from the first array property of
/// each page (or the whole body when the endpoint returns a bare array).
///
/// # Errors
///
/// Propagates retry-wrapper errors and fails with [`HttpError::Failure`] on
/// any non-2xx page.
pub fn list_all_pages(
    transport: &dyn HttpTransport,
    cancel: &CancelToken,
    request: &HttpRequest,
    style: Pagination,
    retry: RetrySetting,
) -> Result<Vec<serde_json::Value>, HttpError> {
    let mut items = Vec::new();
    let mut current = request.clone();

    loop {
        let response = send_with_retry(transport, cancel, &current, retry)?;
        if !response.is_success() {
            return Err(HttpError::Failure {
                status: response.status,
                url: current.url.clone(),
                excerpt: response.excerpt(),
            });
        }
        let page: serde_json::Value = response.json(&current.url)?;
        items.extend(extract_items(&page));

        let Some(key) = next_page_key(&page) else {
            return Ok(items);
        };
        current = follow_up_request(request, style, &key);
    }
}

/// Build the follow-up request for a continuation key.
fn follow_up_request(first: &HttpRequest, style: Pagination, key: &str) -> HttpRequest {
    let mut next = first.clone();
    match style {
        // Second generation: the query string is reset to only the key.
        Pagination::V2 => {
            next.query = vec![(NEXT_PAGE_KEY.to_string(), key.to_string())];
        }
        // First generation: the key joins the original parameters.
        Pagination::V1 => {
            next.query.retain(|(k, _)| k != NEXT_PAGE_KEY);
            next.query.push((NEXT_PAGE_KEY.to_string(), key.to_string()));
        }
    }
    next
}

fn next_page_key(page: &serde_json::Value) -> Option<String> {
    page.get(NEXT_PAGE_KEY)
        .and_then(serde_json::Value::as_str)
        .filter(|k| !k.is_empty())
        .map(ToString::to_string)
}

/// Pull the item array out of a page.
///
/// Listing endpoints differ in the property that holds the array (`values`,
/// `dashboards`, `items`, ...), so the first array-valued property wins;
/// a bare top-level array is taken as-is.
fn extract_items(page: &serde_json::Value) -> Vec<serde_json::Value> {
    match page {
        serde_json::Value::Array(items) => items.clone(),
        serde_json::Value::Object(map) => map
            .values()
            .find_map(|v| v.as_array())
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

//! Issue resolution: turns a JQL query into the candidate issue set.

use crate::error::{SyncError, SyncResult};
use jira_api::JiraClient;
use log::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub key: String,
    pub summary: String,
}

/// Runs `query` against the search endpoint and returns the first page of hits.
///
/// Only one page of [`jira_api::SEARCH_PAGE_SIZE`] results is ever requested; anything past it
/// is not returned and no error is raised. Hits without a key or summary are dropped one by one.
pub async fn resolve_issues(client: &JiraClient, query: &str) -> SyncResult<Vec<Issue>> {
    let response = client.search_issues(query).await.map_err(SyncError::fetch)?;
    let (records, dropped) = response
        .records()
        .ok_or_else(|| SyncError::Fetch("Missing issue data in response".to_string()))?;

    if dropped > 0 {
        warn!("Dropped {} malformed issue record(s) from search results", dropped);
    }
    if let Some(total) = response.total {
        if total > records.len() as u64 + dropped as u64 {
            debug!(
                "Search matched {} issues, only the first {} were returned",
                total,
                records.len() + dropped
            );
        }
    }

    Ok(records
        .into_iter()
        .map(|record| Issue {
            key: record.key,
            summary: record.fields.summary,
        })
        .collect())
}

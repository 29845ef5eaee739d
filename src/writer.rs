//! Creation of new worklog entries.

use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, TimeZone, Utc};
use jira_api::{JiraClient, WorklogCreateRequest};
use log::{info, warn};

/// Parses user-entered hours (`"1.5"`, `" 2 "`). Rejected before any request is made.
pub fn parse_hours(input: &str) -> SyncResult<f64> {
    input
        .trim()
        .parse::<f64>()
        .map_err(|_| SyncError::Validation("Invalid hours".to_string()))
}

/// Converts hours to whole seconds, truncating toward zero (`0.0002` h is `0` s).
pub fn hours_to_seconds(hours: f64) -> SyncResult<u64> {
    if !hours.is_finite() || hours < 0.0 {
        return Err(SyncError::Validation("Invalid hours".to_string()));
    }
    Ok((hours * 3600.0).trunc() as u64)
}

/// Logs `hours` against `issue_key` starting at `started_at`. A blank comment is not sent.
pub async fn create_worklog<Tz: TimeZone>(
    client: &JiraClient,
    issue_key: &str,
    hours: f64,
    started_at: &DateTime<Tz>,
    comment: Option<&str>,
) -> SyncResult<()> {
    let issue_key = issue_key.trim();
    if issue_key.is_empty() {
        return Err(SyncError::Validation("Issue key is required".to_string()));
    }
    let seconds = hours_to_seconds(hours)?;
    let request = WorklogCreateRequest::new(
        seconds,
        started_at.with_timezone(&Utc),
        comment.map(str::trim),
    );

    match client.add_worklog(issue_key, &request).await {
        Ok(()) => {
            info!("Logged {}s on {}", seconds, issue_key);
            Ok(())
        }
        Err(err) => {
            warn!("Failed to log work on {}: {}", issue_key, err);
            let message = match err.status() {
                Some(status) => err.server_message().map(ToOwned::to_owned).unwrap_or_else(|| {
                    format!("Failed to create worklog (HTTP {})", status.as_u16())
                }),
                None => err.to_string(),
            };
            Err(SyncError::Write(message))
        }
    }
}

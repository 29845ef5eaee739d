//! Concurrent per-issue worklog retrieval with author and time-window filtering.

use crate::calendar::{start_of_day, week_start_date};
use crate::error::{SyncError, SyncResult};
use crate::issues::Issue;
use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc, Weekday};
use jira_api::{JiraClient, WorklogPage, WorklogRecord};
use log::{debug, warn};
use tokio::task::JoinSet;

/// One time entry logged against an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorklogEntry {
    pub id: String,
    pub issue_key: String,
    pub issue_summary: String,
    pub author_name: String,
    pub started_at: DateTime<FixedOffset>,
    pub duration_seconds: u64,
}

/// A span of time whose bounds are both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: &DateTime<FixedOffset>) -> bool {
        let at = at.with_timezone(&Utc);
        self.start <= at && at <= self.end
    }

    /// From the first midnight of the week containing `now` up to and including the next week's first midnight.
    pub fn week_of<Tz: TimeZone>(now: &DateTime<Tz>, week_start: Weekday) -> Self {
        let tz = now.timezone();
        let first = week_start_date(now.date_naive(), week_start);
        Self {
            start: start_of_day(&tz, first),
            end: start_of_day(&tz, first + Duration::days(7)),
        }
    }

    /// The week before `current`, ending exactly where `current` starts.
    pub fn previous_week<Tz: TimeZone>(now: &DateTime<Tz>, week_start: Weekday) -> Self {
        let tz = now.timezone();
        let first = week_start_date(now.date_naive(), week_start);
        Self {
            start: start_of_day(&tz, first - Duration::days(7)),
            end: start_of_day(&tz, first),
        }
    }
}

/// Fetches the worklogs of every issue concurrently and keeps those written by
/// `current_user` inside `window`.
///
/// One task per issue, no concurrency cap. The call returns only after every task has
/// finished. If any issue fails, the whole batch fails and entries from successful issues
/// are discarded. Individual records that cannot be decoded are skipped silently.
pub async fn fetch_filtered_worklogs(
    client: &JiraClient,
    issues: &[Issue],
    window: TimeWindow,
    current_user: &str,
) -> SyncResult<Vec<WorklogEntry>> {
    let mut tasks = JoinSet::new();
    for issue in issues {
        let client = client.clone();
        let issue = issue.clone();
        let current_user = current_user.to_string();
        tasks.spawn(async move {
            let result = client
                .get_issue_worklogs(&issue.key)
                .await
                .map(|page| filter_page(&issue, &page, &window, &current_user));
            (issue.key, result)
        });
    }

    let mut entries = Vec::new();
    let mut first_error: Option<SyncError> = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(found))) => entries.extend(found),
            Ok((key, Err(err))) => {
                warn!("Failed to fetch worklogs for {}: {}", key, err);
                first_error.get_or_insert(SyncError::fetch(err));
            }
            Err(err) => {
                warn!("Worklog fetch task aborted: {}", err);
                first_error.get_or_insert(SyncError::Fetch(format!(
                    "Worklog fetch task aborted: {err}"
                )));
            }
        }
    }

    if let Some(err) = first_error {
        return Err(err);
    }

    entries.sort_by(|a, b| {
        a.started_at
            .cmp(&b.started_at)
            .then_with(|| a.issue_key.cmp(&b.issue_key))
            .then_with(|| a.id.cmp(&b.id))
    });
    debug!(
        "Collected {} worklog entries from {} issues",
        entries.len(),
        issues.len()
    );
    Ok(entries)
}

fn filter_page(
    issue: &Issue,
    page: &WorklogPage,
    window: &TimeWindow,
    current_user: &str,
) -> Vec<WorklogEntry> {
    page.worklogs
        .iter()
        .filter_map(WorklogRecord::from_value)
        .filter_map(|record| {
            let started_at = record.started_at()?;
            if record.author.display_name != current_user || !window.contains(&started_at) {
                return None;
            }
            Some(WorklogEntry {
                id: record.id,
                issue_key: issue.key.clone(),
                issue_summary: issue.summary.clone(),
                author_name: record.author.display_name,
                started_at,
                duration_seconds: record.time_spent_seconds,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use jira_api::TrackerConfig;
    use serde_json::json;

    fn client_for(server: &mockito::ServerGuard) -> JiraClient {
        JiraClient::new(TrackerConfig::new(server.url(), "alice", "pw")).unwrap()
    }

    fn issue(key: &str) -> Issue {
        Issue {
            key: key.to_string(),
            summary: format!("Summary of {key}"),
        }
    }

    fn march_week() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap(),
        )
    }

    fn worklog(id: &str, author: &str, started: &str, seconds: i64) -> serde_json::Value {
        json!({
            "id": id,
            "author": {"displayName": author},
            "started": started,
            "timeSpentSeconds": seconds
        })
    }

    async fn mock_worklogs(
        server: &mut mockito::ServerGuard,
        key: &str,
        status: usize,
        body: String,
    ) {
        server
            .mock("GET", format!("/rest/api/2/issue/{key}/worklog").as_str())
            .with_status(status)
            .with_body(body)
            .create_async()
            .await;
    }

    #[tokio::test]
    async fn keeps_only_current_user_entries_inside_inclusive_window() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({"worklogs": [
            worklog("1", "Alice", "2024-03-04T00:00:00.000+0000", 3600),
            worklog("2", "Bob", "2024-03-05T10:00:00.000+0000", 3600),
            worklog("3", "Alice", "2024-03-11T00:00:00.000+0000", 1800),
            worklog("4", "Alice", "2024-03-11T00:00:01.000+0000", 60),
            worklog("5", "Alice", "2024-03-03T23:59:59.000+0000", 60),
            {"id": "6", "author": {"displayName": "Alice"}, "started": "yesterday", "timeSpentSeconds": 60},
            {"id": "7", "started": "2024-03-05T10:00:00.000+0000", "timeSpentSeconds": 60}
        ]});
        mock_worklogs(&mut server, "OPS-1", 200, body.to_string()).await;

        let client = client_for(&server);
        let entries = fetch_filtered_worklogs(&client, &[issue("OPS-1")], march_week(), "Alice")
            .await
            .unwrap();

        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert!(entries.iter().all(|e| e.author_name == "Alice"));
        assert_eq!(entries[0].issue_summary, "Summary of OPS-1");
        assert_eq!(entries[1].duration_seconds, 1800);
    }

    #[tokio::test]
    async fn merges_results_from_all_issues() {
        let mut server = mockito::Server::new_async().await;
        for (key, started) in [
            ("OPS-1", "2024-03-06T09:00:00.000+0000"),
            ("OPS-2", "2024-03-04T09:00:00.000+0000"),
            ("OPS-3", "2024-03-05T09:00:00.000+0000"),
        ] {
            let body = json!({"worklogs": [worklog(key, "Alice", started, 600)]});
            mock_worklogs(&mut server, key, 200, body.to_string()).await;
        }

        let issues = [issue("OPS-1"), issue("OPS-2"), issue("OPS-3")];
        let entries = fetch_filtered_worklogs(&client_for(&server), &issues, march_week(), "Alice")
            .await
            .unwrap();

        let keys: Vec<&str> = entries.iter().map(|e| e.issue_key.as_str()).collect();
        assert_eq!(keys, vec!["OPS-2", "OPS-3", "OPS-1"]);
    }

    #[tokio::test]
    async fn one_failed_issue_fails_the_whole_batch() {
        let mut server = mockito::Server::new_async().await;
        let ok = json!({"worklogs": [worklog("1", "Alice", "2024-03-05T09:00:00.000+0000", 600)]});
        mock_worklogs(&mut server, "OPS-1", 200, ok.to_string()).await;
        mock_worklogs(&mut server, "OPS-2", 503, String::new()).await;
        mock_worklogs(&mut server, "OPS-3", 200, ok.to_string()).await;

        let issues = [issue("OPS-1"), issue("OPS-2"), issue("OPS-3")];
        let err = fetch_filtered_worklogs(&client_for(&server), &issues, march_week(), "Alice")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Fetch);
    }

    #[tokio::test]
    async fn dropped_connection_on_one_of_three_issues_fails_the_batch() {
        let mut server = mockito::Server::new_async().await;
        let ok = json!({"worklogs": [worklog("1", "Alice", "2024-03-05T09:00:00.000+0000", 600)]});
        mock_worklogs(&mut server, "OPS-1", 200, ok.to_string()).await;
        server
            .mock("GET", "/rest/api/2/issue/OPS-2/worklog")
            .with_status(200)
            .with_chunked_body(|_| {
                Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset by peer",
                ))
            })
            .create_async()
            .await;
        mock_worklogs(&mut server, "OPS-3", 200, ok.to_string()).await;

        let issues = [issue("OPS-1"), issue("OPS-2"), issue("OPS-3")];
        let err = fetch_filtered_worklogs(&client_for(&server), &issues, march_week(), "Alice")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Fetch);
    }

    #[tokio::test]
    async fn unreachable_tracker_is_a_fetch_error() {
        let client = JiraClient::new(
            TrackerConfig::new("http://127.0.0.1:9", "alice", "pw")
                .with_connect_timeout(std::time::Duration::from_secs(2)),
        )
        .unwrap();

        let err = fetch_filtered_worklogs(&client, &[issue("OPS-1")], march_week(), "Alice")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fetch);
    }

    #[tokio::test]
    async fn empty_issue_set_needs_no_requests() {
        let client =
            JiraClient::new(TrackerConfig::new("http://127.0.0.1:9", "alice", "pw")).unwrap();
        let entries = fetch_filtered_worklogs(&client, &[], march_week(), "Alice")
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn week_windows_are_adjacent_and_inclusive() {
        let tz = FixedOffset::east_opt(3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 3, 6, 15, 30, 0).unwrap();

        let current = TimeWindow::week_of(&now, Weekday::Mon);
        let previous = TimeWindow::previous_week(&now, Weekday::Mon);

        assert_eq!(current.start, Utc.with_ymd_and_hms(2024, 3, 3, 23, 0, 0).unwrap());
        assert_eq!(current.end, Utc.with_ymd_and_hms(2024, 3, 10, 23, 0, 0).unwrap());
        assert_eq!(previous.end, current.start);
        assert_eq!(previous.start, Utc.with_ymd_and_hms(2024, 2, 25, 23, 0, 0).unwrap());
        assert!(current.contains(&current.start.fixed_offset()));
        assert!(current.contains(&current.end.fixed_offset()));
    }
}

//! Periodic and on-demand reload of the weekly worklog grids.

use crate::config::Config;
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::issues::resolve_issues;
use crate::matrix::build_matrix_in;
use crate::session::{Session, SessionManager};
use crate::snapshot_store::{SnapshotStore, WeeklySnapshot};
use crate::worklogs::{fetch_filtered_worklogs, TimeWindow};
use crate::writer::create_worklog;
use chrono::{DateTime, Local, TimeZone, Weekday};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{interval, MissedTickBehavior};

fn not_authenticated() -> SyncError {
    SyncError::Auth("Not authenticated. Sign in again to continue.".into())
}

/// Cheap handle for asking the scheduler to reload outside its timer.
#[derive(Clone)]
pub struct RefreshHandle {
    trigger: Arc<Notify>,
}

impl RefreshHandle {
    pub fn request(&self) {
        self.trigger.notify_one();
    }
}

/// Drives reload cycles: resolve issues, fetch current and previous week in parallel,
/// aggregate both, publish. Cycles may overlap; each one is numbered and the store
/// rejects results older than what it already shows.
#[derive(Clone)]
pub struct RefreshScheduler {
    sessions: SessionManager,
    store: SnapshotStore,
    query: String,
    every: Duration,
    week_start: Weekday,
    generation: Arc<AtomicU64>,
    trigger: Arc<Notify>,
}

impl RefreshScheduler {
    pub fn new(sessions: SessionManager, store: SnapshotStore, config: &Config) -> Self {
        Self {
            sessions,
            store,
            query: config.issue_query.clone(),
            every: config.refresh_interval(),
            week_start: config.week_start_day(),
            generation: Arc::new(AtomicU64::new(0)),
            trigger: Arc::new(Notify::new()),
        }
    }

    pub fn handle(&self) -> RefreshHandle {
        RefreshHandle {
            trigger: self.trigger.clone(),
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Runs one full cycle anchored on the current local time.
    pub async fn reload(&self) -> SyncResult<WeeklySnapshot> {
        self.reload_at(Local::now()).await
    }

    /// Runs one full cycle with week windows computed around `now`.
    pub async fn reload_at<Tz>(&self, now: DateTime<Tz>) -> SyncResult<WeeklySnapshot>
    where
        Tz: TimeZone + Send + Sync,
        Tz::Offset: Send + Sync,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Reload cycle {} started", generation);

        let session = self.sessions.current();
        let outcome = match &session {
            Some(session) => self.run_cycle(generation, session, &now).await,
            None => Err(not_authenticated()),
        };

        match outcome {
            Ok(snapshot) => {
                if self.store.publish(snapshot.clone()) {
                    info!(
                        "Reload cycle {} published ({} issues)",
                        generation,
                        snapshot.issues.len()
                    );
                } else {
                    debug!("Reload cycle {} superseded, result discarded", generation);
                }
                Ok(snapshot)
            }
            Err(err) => {
                warn!("Reload cycle {} failed: {}", generation, err);
                if err.kind() == ErrorKind::Auth {
                    if let Some(session) = &session {
                        if self.sessions.invalidate_if_current(session) {
                            self.store.clear();
                        }
                    }
                }
                self.store.record_error(generation, err.clone());
                Err(err)
            }
        }
    }

    async fn run_cycle<Tz>(
        &self,
        generation: u64,
        session: &Session,
        now: &DateTime<Tz>,
    ) -> SyncResult<WeeklySnapshot>
    where
        Tz: TimeZone + Send + Sync,
        Tz::Offset: Send + Sync,
    {
        let client = session.client();
        let user = session.current_user();

        let issues = resolve_issues(client, &self.query).await?;
        let current_window = TimeWindow::week_of(now, self.week_start);
        let previous_window = TimeWindow::previous_week(now, self.week_start);

        let (current, previous) = tokio::join!(
            fetch_filtered_worklogs(client, &issues, current_window, user),
            fetch_filtered_worklogs(client, &issues, previous_window, user),
        );
        let (current, previous) = (current?, previous?);

        let tz = now.timezone();
        Ok(WeeklySnapshot {
            generation,
            current_week: build_matrix_in(&current, &tz, self.week_start),
            previous_week: build_matrix_in(&previous, &tz, self.week_start),
            issues,
            refreshed_at: Local::now(),
        })
    }

    /// Logs work through the current session and schedules a reload on success.
    pub async fn log_work(
        &self,
        issue_key: &str,
        hours: f64,
        started_at: &DateTime<Local>,
        comment: Option<&str>,
    ) -> SyncResult<()> {
        let session = self.sessions.current().ok_or_else(not_authenticated)?;
        create_worklog(session.client(), issue_key, hours, started_at, comment).await?;
        self.handle().request();
        Ok(())
    }

    /// Reloads on every interval tick (the first one fires immediately) and on every
    /// [`RefreshHandle::request`]. Each cycle runs in its own task, so a hung cycle does
    /// not hold back the next one. Never returns.
    pub async fn run(self) {
        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.trigger.notified() => {
                    debug!("Manual refresh requested");
                }
            }
            if !self.sessions.is_authenticated() {
                debug!("Refresh skipped: no active session");
                continue;
            }
            let scheduler = self.clone();
            tokio::spawn(async move {
                let _ = scheduler.reload().await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use serde_json::json;

    async fn tracker() -> mockito::ServerGuard {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/api/2/myself")
            .with_status(200)
            .with_body(r#"{"displayName":"Alice"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/rest/api/2/search")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                json!({"issues": [
                    {"key": "OPS-1", "fields": {"summary": "Deploy"}},
                    {"key": "OPS-2", "fields": {"summary": "Review"}}
                ]})
                .to_string(),
            )
            .create_async()
            .await;
        server
            .mock("GET", "/rest/api/2/issue/OPS-1/worklog")
            .with_status(200)
            .with_body(
                json!({"worklogs": [
                    {"id": "1", "author": {"displayName": "Alice"}, "started": "2024-03-05T09:00:00.000+0000", "timeSpentSeconds": 7200},
                    {"id": "2", "author": {"displayName": "Alice"}, "started": "2024-02-27T09:00:00.000+0000", "timeSpentSeconds": 1800},
                    {"id": "3", "author": {"displayName": "Bob"}, "started": "2024-03-05T09:00:00.000+0000", "timeSpentSeconds": 3600}
                ]})
                .to_string(),
            )
            .create_async()
            .await;
        server
            .mock("GET", "/rest/api/2/issue/OPS-2/worklog")
            .with_status(200)
            .with_body(
                json!({"worklogs": [
                    {"id": "4", "author": {"displayName": "Alice"}, "started": "2024-03-06T09:00:00.000+0000", "timeSpentSeconds": 2700}
                ]})
                .to_string(),
            )
            .create_async()
            .await;
        server
    }

    async fn scheduler_for(server: &mockito::ServerGuard) -> RefreshScheduler {
        let sessions = SessionManager::new();
        sessions.login(&server.url(), "alice", "pw").await.unwrap();
        RefreshScheduler::new(sessions, SnapshotStore::default(), &Config::default())
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[tokio::test]
    async fn reload_builds_current_and_previous_week() {
        let server = tracker().await;
        let scheduler = scheduler_for(&server).await;
        let now = Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap();

        let snapshot = scheduler.reload_at(now).await.unwrap();

        assert_eq!(snapshot.generation, 1);
        assert_eq!(snapshot.issues.len(), 2);
        let current = &snapshot.current_week;
        assert_eq!(current.issues, vec!["OPS-1".to_string(), "OPS-2".to_string()]);
        assert_eq!(current.cell("OPS-1", date(5)), 7200);
        assert_eq!(current.cell("OPS-2", date(6)), 2700);
        assert_eq!(current.grand_total(), 9900);

        let previous = &snapshot.previous_week;
        assert_eq!(previous.issues, vec!["OPS-1".to_string()]);
        assert_eq!(previous.days[0], NaiveDate::from_ymd_opt(2024, 2, 26).unwrap());
        assert_eq!(previous.grand_total(), 1800);

        assert_eq!(scheduler.store().snapshot().map(|s| s.generation), Some(1));
    }

    #[tokio::test]
    async fn reload_without_session_is_an_auth_error() {
        let scheduler = RefreshScheduler::new(
            SessionManager::new(),
            SnapshotStore::default(),
            &Config::default(),
        );

        let err = scheduler.reload().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Auth);
        assert_eq!(scheduler.store().last_error().map(|e| e.kind()), Some(ErrorKind::Auth));
    }

    #[tokio::test]
    async fn rejected_credentials_during_reload_sign_out() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/api/2/myself")
            .with_status(200)
            .with_body(r#"{"displayName":"Alice"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/rest/api/2/search")
            .match_query(mockito::Matcher::Any)
            .with_status(401)
            .create_async()
            .await;
        let scheduler = scheduler_for(&server).await;
        scheduler.store().publish(WeeklySnapshot {
            generation: 0,
            issues: Vec::new(),
            current_week: Default::default(),
            previous_week: Default::default(),
            refreshed_at: Local::now(),
        });

        let err = scheduler.reload().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Auth);
        assert!(!scheduler.sessions.is_authenticated());
        assert!(scheduler.store().snapshot().is_none());
        assert_eq!(scheduler.store().last_error().map(|e| e.kind()), Some(ErrorKind::Auth));
    }

    #[tokio::test]
    async fn late_rejection_of_previous_login_keeps_current_session() {
        let mut old_tracker = mockito::Server::new_async().await;
        old_tracker
            .mock("GET", "/rest/api/2/myself")
            .with_status(200)
            .with_body(r#"{"displayName":"Alice"}"#)
            .create_async()
            .await;
        old_tracker
            .mock("GET", "/rest/api/2/search")
            .match_query(mockito::Matcher::Any)
            .with_status(401)
            .with_body_from_request(|_| {
                std::thread::sleep(Duration::from_millis(300));
                Vec::new()
            })
            .create_async()
            .await;
        let new_tracker = tracker().await;

        let scheduler = scheduler_for(&old_tracker).await;
        let in_flight = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.reload().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler
            .sessions
            .login(&new_tracker.url(), "alice2", "pw2")
            .await
            .unwrap();

        let err = in_flight.await.unwrap().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Auth);
        let current = scheduler.sessions.current().expect("newer login should survive");
        assert_eq!(current.username, "alice2");
        assert_eq!(current.base_url, new_tracker.url());
    }

    #[tokio::test]
    async fn display_name_with_trailing_space_still_matches_own_worklogs() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/api/2/myself")
            .with_status(200)
            .with_body(r#"{"displayName":"Alice "}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/rest/api/2/search")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"issues":[{"key":"OPS-1","fields":{"summary":"Deploy"}}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/rest/api/2/issue/OPS-1/worklog")
            .with_status(200)
            .with_body(
                json!({"worklogs": [{
                    "id": "1",
                    "author": {"displayName": "Alice "},
                    "started": "2024-03-05T09:00:00.000+0000",
                    "timeSpentSeconds": 7200
                }]})
                .to_string(),
            )
            .create_async()
            .await;
        let scheduler = scheduler_for(&server).await;
        let now = Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap();

        let snapshot = scheduler.reload_at(now).await.unwrap();

        assert_eq!(snapshot.current_week.issues, vec!["OPS-1".to_string()]);
        assert_eq!(snapshot.current_week.grand_total(), 7200);
    }

    #[tokio::test]
    async fn successful_log_work_requests_refresh() {
        let mut server = tracker().await;
        server
            .mock("POST", "/rest/api/2/issue/OPS-1/worklog")
            .with_status(201)
            .create_async()
            .await;
        let scheduler = scheduler_for(&server).await;

        scheduler
            .log_work("OPS-1", 1.0, &Local::now(), None)
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(1), scheduler.trigger.notified())
            .await
            .expect("refresh should have been requested");
    }

    #[tokio::test]
    async fn run_loop_publishes_initial_snapshot() {
        let server = tracker().await;
        let scheduler = scheduler_for(&server).await;
        let store = scheduler.store().clone();

        let task = tokio::spawn(scheduler.run());
        let mut published = false;
        for _ in 0..50 {
            if store.snapshot().is_some() {
                published = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        task.abort();

        assert!(published);
    }
}

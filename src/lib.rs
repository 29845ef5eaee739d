use chrono::Local;
use clap::{Parser, Subcommand};
use log::{debug, error, info, warn};
use std::env;

pub mod calendar;
pub mod config;
pub mod error;
pub mod issues;
pub mod matrix;
pub mod refresh;
pub mod secrets;
pub mod session;
pub mod snapshot_store;
pub mod worklogs;
pub mod writer;

use config::{Config, ConfigManager};
use matrix::{format_short_duration, AggregationMatrix};
use refresh::RefreshScheduler;
use secrets::{CredentialStore, KeyringStore};
use session::{forget_credentials, remember_credentials, Session, SessionManager};
use snapshot_store::{SnapshotStore, WeeklySnapshot};

const ISSUE_COLUMN_WIDTH: usize = 16;
const DAY_COLUMN_WIDTH: usize = 7;

/// Weekly Jira worklog tracker.
///
/// Signs in with `JIRA_BASE_URL`, `JIRA_USERNAME` and `JIRA_TOKEN` when all three are set,
/// otherwise with the account remembered by the last successful login.
#[derive(Parser, Debug)]
#[command(name = "jira-weekly")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// Refresh on a timer and log the week grids after every refresh (default).
    Watch,
    /// Refresh once, log the week grids and exit.
    Once,
    /// Forget the remembered account and its stored password.
    Logout,
    /// Log work against an issue starting now.
    Log {
        /// Issue key, e.g. OPS-12.
        issue_key: String,
        /// Hours spent, e.g. 1.5.
        hours: String,
        /// Optional comment; remaining words are joined with spaces.
        comment: Vec<String>,
    },
}

impl Cli {
    fn command(self) -> Command {
        self.command.unwrap_or(Command::Watch)
    }
}

fn pad(text: &str, width: usize) -> String {
    let shown: String = text.chars().take(width).collect();
    format!("{shown:<width$}")
}

/// Plain-text week grid: one row per issue, a total row and a total column.
pub fn render_week(title: &str, matrix: &AggregationMatrix) -> String {
    if matrix.is_empty() {
        return format!("{title}\n  No worklogs for this week.\n");
    }

    let mut out = format!("{title}\n");
    out.push_str(&pad("Issue", ISSUE_COLUMN_WIDTH));
    for label in matrix.day_labels() {
        out.push_str(&format!("{label:>DAY_COLUMN_WIDTH$}"));
    }
    out.push_str(&format!("{:>DAY_COLUMN_WIDTH$}\n", "Total"));

    for issue in &matrix.issues {
        out.push_str(&pad(issue, ISSUE_COLUMN_WIDTH));
        for day in &matrix.days {
            let cell = format_short_duration(matrix.cell(issue, *day));
            out.push_str(&format!("{cell:>DAY_COLUMN_WIDTH$}"));
        }
        let total = format_short_duration(matrix.row_total(issue));
        out.push_str(&format!("{total:>DAY_COLUMN_WIDTH$}\n"));
    }

    out.push_str(&pad("Total", ISSUE_COLUMN_WIDTH));
    for day in &matrix.days {
        let cell = format_short_duration(matrix.column_total(*day));
        out.push_str(&format!("{cell:>DAY_COLUMN_WIDTH$}"));
    }
    let grand = format_short_duration(matrix.grand_total());
    out.push_str(&format!("{grand:>DAY_COLUMN_WIDTH$}\n"));
    out
}

fn report(snapshot: &WeeklySnapshot) {
    info!(
        "Last refresh: {}\n{}\n{}",
        snapshot.refreshed_at.format("%Y-%m-%d %H:%M"),
        render_week("This Week", &snapshot.current_week),
        render_week("Previous Week", &snapshot.previous_week)
    );
}

fn env_credentials() -> Option<(String, String, String)> {
    let read = |name: &str| {
        env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };
    Some((read("JIRA_BASE_URL")?, read("JIRA_USERNAME")?, read("JIRA_TOKEN")?))
}

/// Logs in from environment credentials (remembering them) or replays stored ones.
async fn establish_session(
    sessions: &SessionManager,
    store: &dyn CredentialStore,
    config_manager: &ConfigManager,
    config: &mut Config,
) -> Option<Session> {
    if let Some((base_url, username, secret)) = env_credentials() {
        match sessions.login(&base_url, &username, &secret).await {
            Ok(session) => {
                if let Err(err) = remember_credentials(store, config, &session) {
                    warn!("Failed to remember credentials: {}", err);
                } else if let Err(err) = config_manager.save(config) {
                    warn!("Failed to save config: {}", err);
                }
                return Some(session);
            }
            Err(err) => {
                error!("Login failed: {}", err);
                return None;
            }
        }
    }
    sessions.try_auto_login(store, config).await
}

fn logout(
    sessions: &SessionManager,
    store: &dyn CredentialStore,
    config_manager: &ConfigManager,
    config: &mut Config,
) {
    sessions.logout();
    if let Some(username) = config.username.take() {
        if let Err(err) = forget_credentials(store, &username) {
            warn!("Failed to clear stored password: {}", err);
        }
    }
    if let Err(err) = config_manager.save(config) {
        warn!("Failed to save config: {}", err);
    }
}

async fn run_command(command: Command) -> Result<(), String> {
    let config_manager = ConfigManager::new();
    let mut config = config_manager.load();
    debug!("Using config at {}", config_manager.path().display());
    let store = KeyringStore;
    let sessions = SessionManager::new();

    if command == Command::Logout {
        logout(&sessions, &store, &config_manager, &mut config);
        info!("Signed out");
        return Ok(());
    }

    let session = establish_session(&sessions, &store, &config_manager, &mut config)
        .await
        .ok_or_else(|| {
            "Not signed in. Set JIRA_BASE_URL, JIRA_USERNAME and JIRA_TOKEN to log in.".to_string()
        })?;
    info!("Logged in as {}", session.current_user());

    let scheduler = RefreshScheduler::new(sessions, SnapshotStore::default(), &config);
    match command {
        Command::Once => {
            let snapshot = scheduler.reload().await.map_err(|err| err.to_string())?;
            report(&snapshot);
            Ok(())
        }
        Command::Log {
            issue_key,
            hours,
            comment,
        } => {
            let comment = (!comment.is_empty()).then(|| comment.join(" "));
            let hours = writer::parse_hours(&hours).map_err(|err| err.to_string())?;
            scheduler
                .log_work(&issue_key, hours, &Local::now(), comment.as_deref())
                .await
                .map_err(|err| err.to_string())?;
            let snapshot = scheduler.reload().await.map_err(|err| err.to_string())?;
            report(&snapshot);
            Ok(())
        }
        Command::Watch => {
            let store = scheduler.store().clone();
            let reporter = async {
                loop {
                    store.changed().await;
                    if let Some(snapshot) = store.snapshot() {
                        report(&snapshot);
                    }
                }
            };
            tokio::select! {
                _ = scheduler.run() => Ok(()),
                _ = reporter => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    signal.map_err(|err| format!("Failed to listen for shutdown: {err}"))?;
                    info!("Shutting down");
                    Ok(())
                }
            }
        }
        Command::Logout => Ok(()),
    }
}

/// Entry point of the headless tracker binary.
pub fn run() -> std::process::ExitCode {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();

    let command = Cli::parse().command();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("Failed to start async runtime: {}", err);
            return std::process::ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run_command(command)) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            std::process::ExitCode::FAILURE
        }
    }
}

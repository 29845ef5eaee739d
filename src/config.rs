//! Persistent tracker configuration model and file-backed manager.

use chrono::Weekday;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_ISSUE_QUERY: &str =
    "worklogAuthor = currentUser() AND worklogDate >= startOfWeek(-1) AND worklogDate <= endOfWeek()";
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;

fn default_issue_query() -> String {
    DEFAULT_ISSUE_QUERY.to_string()
}

fn default_refresh_interval_secs() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}

fn default_week_start() -> String {
    "monday".to_string()
}

/// Represents the configuration persisted on disk: last used Jira URL and username, the issue search query, refresh cadence and first day of the week.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    pub base_url: Option<String>,
    pub username: Option<String>,
    #[serde(default = "default_issue_query")]
    pub issue_query: String,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_week_start")]
    pub week_start: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            username: None,
            issue_query: default_issue_query(),
            refresh_interval_secs: default_refresh_interval_secs(),
            week_start: default_week_start(),
        }
    }
}

impl Config {
    /// First day of the week used for week windows and matrix anchoring. Unknown values fall back to Monday.
    pub fn week_start_day(&self) -> Weekday {
        self.week_start.trim().parse::<Weekday>().unwrap_or(Weekday::Mon)
    }

    /// Refresh interval clamped to at least one second.
    pub fn refresh_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    /// Saved account, present only when both URL and username are non-blank.
    pub fn saved_account(&self) -> Option<(&str, &str)> {
        let base_url = self.base_url.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
        let username = self.username.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
        Some((base_url, username))
    }
}

/// Loads and saves [`Config`] as JSON in the platform-specific config directory.
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// Creates a manager bound to the platform-specific config path.
    pub fn new() -> Self {
        let path = match directories::ProjectDirs::from("com", "jira-weekly", "jira-weekly") {
            Some(dirs) => dirs.config_dir().join("config.json"),
            None => {
                warn!("Could not determine config directory, using working directory");
                PathBuf::from("jira-weekly").join("config.json")
            }
        };
        Self { path }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads config from disk, falling back to defaults on read/parse errors.
    pub fn load(&self) -> Config {
        if !self.path.exists() {
            return Config::default();
        }
        let content = fs::read_to_string(&self.path).unwrap_or_default();
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                warn!("Ignoring unreadable config at {}: {}", self.path.display(), err);
                Config::default()
            }
        }
    }

    /// Persists config to disk, creating parent directories when needed.
    pub fn save(&self, config: &Config) -> Result<(), std::io::Error> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigManager, DEFAULT_ISSUE_QUERY};
    use chrono::Weekday;
    use std::env;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        env::temp_dir().join(format!("jira-weekly-tests-{name}-{nanos}/config.json"))
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.issue_query, DEFAULT_ISSUE_QUERY);
        assert_eq!(config.refresh_interval_secs, 300);
        assert_eq!(config.week_start_day(), Weekday::Mon);
        assert!(config.saved_account().is_none());
    }

    #[test]
    fn load_missing_file_returns_default() {
        let manager = ConfigManager::with_path(unique_path("missing"));
        assert_eq!(manager.load(), Config::default());
    }

    #[test]
    fn save_and_load_round_trip() {
        let path = unique_path("roundtrip");
        let parent = path.parent().map(ToOwned::to_owned);

        let manager = ConfigManager::with_path(path.clone());
        let config = Config {
            base_url: Some("https://jira.example.com".to_string()),
            username: Some("alice".to_string()),
            issue_query: "project = OPS".to_string(),
            refresh_interval_secs: 120,
            week_start: "sunday".to_string(),
        };

        manager.save(&config).expect("save should succeed");
        let loaded = manager.load();

        assert_eq!(loaded, config);
        assert_eq!(loaded.week_start_day(), Weekday::Sun);
        assert_eq!(
            loaded.saved_account(),
            Some(("https://jira.example.com", "alice"))
        );

        if let Some(parent) = parent {
            let _ = fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn partial_file_fills_missing_fields_with_defaults() {
        let path = unique_path("partial");
        let parent = path.parent().expect("parent must exist").to_owned();
        fs::create_dir_all(&parent).expect("create temp directory");
        fs::write(&path, r#"{"username":"bob","week_start":"nonsense"}"#).expect("write config");

        let loaded = ConfigManager::with_path(path).load();
        assert_eq!(loaded.username.as_deref(), Some("bob"));
        assert_eq!(loaded.refresh_interval_secs, 300);
        assert_eq!(loaded.week_start_day(), Weekday::Mon);
        assert!(loaded.saved_account().is_none());

        let _ = fs::remove_dir_all(parent);
    }

    #[test]
    fn load_invalid_json_falls_back_to_default() {
        let path = unique_path("invalid");
        let parent = path.parent().expect("parent must exist").to_owned();
        fs::create_dir_all(&parent).expect("create temp directory");
        fs::write(&path, "not-valid-json").expect("write invalid config");

        let loaded = ConfigManager::with_path(path).load();
        assert_eq!(loaded, Config::default());

        let _ = fs::remove_dir_all(parent);
    }

    #[test]
    fn zero_refresh_interval_is_clamped() {
        let config = Config {
            refresh_interval_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.refresh_interval().as_secs(), 1);
    }
}

//! Typed Jira REST API client crate used by the weekly worklog tracker.

pub mod client;
pub mod config;
pub mod error;
pub mod models;

pub use client::{JiraClient, SEARCH_PAGE_SIZE};
pub use config::TrackerConfig;
pub use error::{Result, TrackerError};
pub use reqwest::StatusCode;
pub use models::{
    parse_worklog_timestamp, ErrorBody, IssueFields, IssueRecord, Myself, SearchResponse,
    WorklogAuthor, WorklogCreateRequest, WorklogPage, WorklogRecord,
};

use chrono::{DateTime, FixedOffset, Utc};
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope of `GET issue/{key}/worklog`. Records stay raw so each one can be
/// decoded (and skipped) on its own.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct WorklogPage {
    #[serde(default)]
    pub worklogs: Vec<Value>,
    pub total: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WorklogRecord {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub author: WorklogAuthor,
    pub started: String,
    pub time_spent_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WorklogAuthor {
    pub display_name: String,
}

impl WorklogRecord {
    /// Decodes one raw record; `None` when a required field is missing or mistyped.
    pub fn from_value(value: &Value) -> Option<Self> {
        WorklogRecord::deserialize(value).ok()
    }

    pub fn started_at(&self) -> Option<DateTime<FixedOffset>> {
        parse_worklog_timestamp(&self.started)
    }
}

/// Parses `2024-03-04T09:15:00.000+0000` as well as RFC 3339 (`+00:00`, `Z`).
pub fn parse_worklog_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = value.trim();
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .or_else(|| DateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f%z").ok())
}

/// Body of `POST issue/{key}/worklog`.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorklogCreateRequest {
    pub time_spent_seconds: u64,
    pub started: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl WorklogCreateRequest {
    /// Builds the payload, formatting `started` in UTC and dropping a blank comment.
    pub fn new(time_spent_seconds: u64, started: DateTime<Utc>, comment: Option<&str>) -> Self {
        let comment = comment
            .filter(|text| !text.is_empty())
            .map(ToOwned::to_owned);
        Self {
            time_spent_seconds,
            started: started.format("%Y-%m-%dT%H:%M:%S%.3f+0000").to_string(),
            comment,
        }
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "unsupported worklog id: {other}"
        ))),
    }
}

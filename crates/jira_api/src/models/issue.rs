use serde::Deserialize;
use serde_json::Value;

/// Envelope of `GET search`. Issues stay as raw values so one malformed record
/// does not fail the whole page.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub issues: Option<Vec<Value>>,
    pub total: Option<u64>,
    pub start_at: Option<u64>,
    pub max_results: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct IssueRecord {
    pub key: String,
    pub fields: IssueFields,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct IssueFields {
    pub summary: String,
}

impl IssueRecord {
    /// Decodes a single search hit, returning `None` when `key` or `fields.summary` is absent.
    pub fn from_value(value: &Value) -> Option<Self> {
        IssueRecord::deserialize(value).ok()
    }
}

impl SearchResponse {
    /// Decodes every well-formed issue and counts the records that were dropped.
    pub fn records(&self) -> Option<(Vec<IssueRecord>, usize)> {
        let raw = self.issues.as_ref()?;
        let records: Vec<IssueRecord> = raw.iter().filter_map(IssueRecord::from_value).collect();
        let dropped = raw.len() - records.len();
        Some((records, dropped))
    }
}

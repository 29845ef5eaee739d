use serde::Deserialize;
use serde_json::{Map, Value};

/// Standard Jira error envelope: `{"errorMessages": [...], "errors": {"field": "message"}}`.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    #[serde(default)]
    pub error_messages: Vec<String>,
    #[serde(default)]
    pub errors: Map<String, Value>,
}

impl ErrorBody {
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }

    /// Human readable message: general messages first, then field errors.
    pub fn message(&self) -> Option<String> {
        if !self.error_messages.is_empty() {
            return Some(self.error_messages.join("; "));
        }
        if !self.errors.is_empty() {
            let joined = self
                .errors
                .iter()
                .map(|(field, value)| match value {
                    Value::String(text) => format!("{field}: {text}"),
                    other => format!("{field}: {other}"),
                })
                .collect::<Vec<_>>()
                .join("; ");
            return Some(joined);
        }
        None
    }
}

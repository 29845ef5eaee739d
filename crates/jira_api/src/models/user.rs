//! Identity payload returned by the `myself` endpoint.

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
/// Represents the authenticated account as reported by Jira, including display name, login name, email and cloud account id.
pub struct Myself {
    pub display_name: Option<String>,
    pub name: Option<String>,
    pub email_address: Option<String>,
    pub account_id: Option<String>,
}

impl Myself {
    /// Returns the display name exactly as sent, unless it is missing or blank.
    ///
    /// Not trimmed: worklog authors carry the same raw value and are matched against it.
    pub fn display_name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
    }
}

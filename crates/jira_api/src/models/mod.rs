mod error_body;
mod issue;
mod user;
mod worklog;

pub use error_body::ErrorBody;
pub use issue::{IssueFields, IssueRecord, SearchResponse};
pub use user::Myself;
pub use worklog::{
    parse_worklog_timestamp, WorklogAuthor, WorklogCreateRequest, WorklogPage, WorklogRecord,
};

use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::models::{ErrorBody, Myself, SearchResponse, WorklogCreateRequest, WorklogPage};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client as HttpClient, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Largest page the search endpoint is asked for.
pub const SEARCH_PAGE_SIZE: u32 = 100;
const SEARCH_FIELDS: &str = "key,summary";
const MAX_LOGGED_BODY: usize = 256;

/// Thin typed wrapper over the Jira REST v2 endpoints used for weekly worklog tracking.
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Clone)]
pub struct JiraClient {
    http: HttpClient,
    config: TrackerConfig,
}

impl JiraClient {
    pub fn new(config: TrackerConfig) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(TrackerError::InvalidConfig("base URL must not be empty".into()));
        }
        reqwest::Url::parse(&config.api_root())
            .map_err(|err| TrackerError::InvalidConfig(format!("invalid base URL: {err}")))?;
        let http = build_http_client(&config)?;
        Ok(Self { http, config })
    }

    pub async fn get<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.get_with_query(path, None).await
    }

    pub async fn get_with_query<T>(&self, path: &str, query: Option<&[(&str, &str)]>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = self.url_for(path);
        debug!(url = url.as_str(), "GET");
        let mut request = self.http.get(url);
        if let Some(params) = query {
            request = request.query(params);
        }
        let response = request.send().await?;
        Self::parse_json(response).await
    }

    pub async fn send_expect_empty<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url_for(path);
        debug!(url = url.as_str(), method = method.as_str(), "sending");
        let mut request = self.http.request(method, url);
        if let Some(payload) = body {
            request = request.json(payload);
        }
        let response = request.send().await?;
        Self::ensure_success(response).await
    }

    fn url_for(&self, path: &str) -> String {
        let mut base = self.config.api_root();
        base.push_str(path.trim_start_matches('/'));
        base
    }

    async fn parse_json<T>(response: Response) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            serde_json::from_str::<T>(&body).map_err(TrackerError::from)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(build_http_error(status, &body))
        }
    }

    async fn ensure_success(response: Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(build_http_error(status, &body))
        }
    }

    /// `GET myself`: identity of the account the client authenticates as.
    pub async fn get_myself(&self) -> Result<Myself> {
        self.get("myself").await
    }

    /// `GET search`: a single page of at most [`SEARCH_PAGE_SIZE`] issues. Further pages are
    /// never requested.
    pub async fn search_issues(&self, jql: &str) -> Result<SearchResponse> {
        let max_results = SEARCH_PAGE_SIZE.to_string();
        let params = [
            ("jql", jql),
            ("maxResults", max_results.as_str()),
            ("fields", SEARCH_FIELDS),
        ];
        self.get_with_query("search", Some(&params)).await
    }

    pub async fn get_issue_worklogs(&self, issue_key: &str) -> Result<WorklogPage> {
        let path = format!("issue/{}/worklog", issue_key.trim());
        self.get(&path).await
    }

    pub async fn add_worklog(&self, issue_key: &str, request: &WorklogCreateRequest) -> Result<()> {
        let path = format!("issue/{}/worklog", issue_key.trim());
        self.send_expect_empty(Method::POST, &path, Some(request)).await
    }
}

fn build_http_client(config: &TrackerConfig) -> Result<HttpClient> {
    let mut headers = HeaderMap::new();

    let mut auth_value = header_value(basic_auth_value(&config.username, &config.secret))?;
    auth_value.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth_value);
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, header_value(config.user_agent.clone())?);

    HttpClient::builder()
        .default_headers(headers)
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .build()
        .map_err(|err| TrackerError::Other(err.to_string()))
}

fn basic_auth_value(username: &str, secret: &str) -> String {
    let encoded = BASE64_STANDARD.encode(format!("{username}:{secret}"));
    format!("Basic {encoded}")
}

fn header_value(value: String) -> Result<HeaderValue> {
    HeaderValue::from_str(&value).map_err(|err| TrackerError::InvalidConfig(err.to_string()))
}

fn build_http_error(status: StatusCode, body: &str) -> TrackerError {
    let server_message = ErrorBody::parse(body).and_then(|parsed| parsed.message());
    debug!(%status, body = %truncate(body), "request failed");
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        let message = match &server_message {
            Some(detail) => format!("Access denied ({status}) - {detail}"),
            None => format!("Access denied ({status})"),
        };
        TrackerError::Authentication {
            status,
            server_message,
            message,
        }
    } else {
        let message = server_message
            .clone()
            .unwrap_or_else(|| describe_body(status, body));
        TrackerError::http(status, server_message, message)
    }
}

fn describe_body(status: StatusCode, body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() || serde_json::from_str::<Value>(trimmed).is_ok() {
        format!("request failed with status {}", status.as_u16())
    } else {
        truncate(trimmed)
    }
}

fn truncate(body: &str) -> String {
    if body.chars().count() <= MAX_LOGGED_BODY {
        body.to_string()
    } else {
        let head: String = body.chars().take(MAX_LOGGED_BODY).collect();
        format!("{head}…")
    }
}

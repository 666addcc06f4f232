//! GitHub REST API issue host.

use super::host::{IssueBody, IssueHost};
use crate::domain::IssueRef;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Default `User-Agent` sent with every request (GitHub rejects requests without one).
pub const DEFAULT_USER_AGENT: &str = concat!("issue-metadata/", env!("CARGO_PKG_VERSION"));

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct UpdateIssueRequest<'a> {
    body: &'a str,
}

/// Issue host backed by the GitHub REST API.
///
/// Uses `GET /repos/{owner}/{repo}/issues/{number}` to read and
/// `PATCH` on the same path to write. Requests are not retried.
#[derive(Debug, Clone)]
pub struct GithubClient {
    api_url: String,
    http: reqwest::Client,
}

impl GithubClient {
    /// Public GitHub API root.
    pub const DEFAULT_API_URL: &'static str = "https://api.github.com";

    /// Create a client with the default user agent and timeout.
    ///
    /// # Errors
    ///
    /// Returns `Error::BackendInitialization` if the token is not a valid
    /// header value or the HTTP client cannot be built.
    pub fn new(api_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        Self::with_options(api_url, token, DEFAULT_USER_AGENT, DEFAULT_TIMEOUT)
    }

    /// Create a client with an explicit user agent and request timeout.
    ///
    /// # Errors
    ///
    /// See [`GithubClient::new`].
    pub fn with_options(
        api_url: impl Into<String>,
        token: Option<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| Error::BackendInitialization(format!("invalid token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        let user_agent = HeaderValue::from_str(user_agent)
            .map_err(|e| Error::BackendInitialization(format!("invalid user agent: {e}")))?;
        headers.insert(USER_AGENT, user_agent);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::BackendInitialization(format!("HTTP client: {e}")))?;

        Ok(Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// The API root requests are sent to.
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn issue_url(&self, issue: &IssueRef) -> String {
        format!(
            "{}/repos/{}/{}/issues/{}",
            self.api_url, issue.owner, issue.repo, issue.issue_number
        )
    }

    async fn send(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<IssueBody> {
        let transport = |e: reqwest::Error| Error::RemoteTransport {
            operation,
            message: e.to_string(),
        };

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteStatus {
                operation,
                status: status.as_u16(),
                body,
            });
        }

        response.json::<IssueBody>().await.map_err(transport)
    }
}

#[async_trait]
impl IssueHost for GithubClient {
    async fn get_issue(&self, issue: &IssueRef) -> Result<IssueBody> {
        debug!(%issue, "Fetching issue");
        self.send("get_issue", self.http.get(self.issue_url(issue)))
            .await
    }

    async fn update_issue(&self, issue: &IssueRef, body: &str) -> Result<IssueBody> {
        debug!(%issue, bytes = body.len(), "Updating issue body");
        let request = self
            .http
            .patch(self.issue_url(issue))
            .json(&UpdateIssueRequest { body });
        self.send("update_issue", request).await
    }
}

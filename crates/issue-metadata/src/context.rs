//! Webhook context: which installation is acting, and on which issue.
//!
//! Only the handful of payload fields the storage backends need are read:
//!
//! - `installation.id` identifies the tenant
//! - `issue.number` (or `pull_request.number`) identifies the issue
//! - `repository.name` and `repository.owner.login` identify the repository

use crate::domain::{IssueRef, TenantId};
use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::Value;

/// Record key used by document stores for events not tied to an issue.
pub const NON_ISSUE_KEY: &str = "nonissuekey";

#[derive(Debug, Default, Deserialize)]
struct WebhookPayload {
    installation: Option<Installation>,
    issue: Option<Numbered>,
    pull_request: Option<Numbered>,
    repository: Option<Repository>,
}

#[derive(Debug, Deserialize)]
struct Installation {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct Numbered {
    number: u64,
}

#[derive(Debug, Deserialize)]
struct Repository {
    name: String,
    owner: Owner,
}

#[derive(Debug, Deserialize)]
struct Owner {
    login: String,
}

/// The parts of a webhook event the metadata backends care about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    installation_id: Option<u64>,
    owner: Option<String>,
    repo: Option<String>,
    issue_number: Option<u64>,
}

impl Context {
    /// Create a context for an installation with no issue attached.
    #[must_use]
    pub fn new(installation_id: u64) -> Self {
        Self {
            installation_id: Some(installation_id),
            ..Self::default()
        }
    }

    /// Attach the issue the event refers to.
    #[must_use]
    pub fn with_issue(mut self, owner: impl Into<String>, repo: impl Into<String>, number: u64) -> Self {
        self.owner = Some(owner.into());
        self.repo = Some(repo.into());
        self.issue_number = Some(number);
        self
    }

    /// Build a context from a raw webhook payload.
    ///
    /// Missing sections are tolerated; they only matter once a backend asks
    /// for the tenant or the issue.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if a present section has the wrong shape, e.g.
    /// a non-numeric installation id.
    pub fn from_payload(payload: Value) -> Result<Self> {
        let payload: WebhookPayload = serde_json::from_value(payload)?;
        let (owner, repo) = match payload.repository {
            Some(repository) => (Some(repository.owner.login), Some(repository.name)),
            None => (None, None),
        };

        Ok(Self {
            installation_id: payload.installation.map(|i| i.id),
            owner,
            repo,
            issue_number: payload.issue.or(payload.pull_request).map(|n| n.number),
        })
    }

    /// The installation id of the event, if it carried one.
    #[must_use]
    pub fn installation_id(&self) -> Option<u64> {
        self.installation_id
    }

    /// The tenant the event acts for.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the payload had no installation.
    pub fn tenant_id(&self) -> Result<TenantId> {
        self.installation_id
            .map(TenantId::from)
            .ok_or_else(|| Error::Config("webhook payload has no installation id".to_string()))
    }

    /// The issue the event refers to, if any.
    #[must_use]
    pub fn issue(&self) -> Option<IssueRef> {
        match (&self.owner, &self.repo, self.issue_number) {
            (Some(owner), Some(repo), Some(number)) => Some(IssueRef::new(owner, repo, number)),
            _ => None,
        }
    }

    /// Document store key for the event's issue, or [`NON_ISSUE_KEY`].
    #[must_use]
    pub fn record_key(&self) -> String {
        self.issue()
            .map_or_else(|| NON_ISSUE_KEY.to_string(), |issue| issue.record_key())
    }
}

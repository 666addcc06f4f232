//! The issue host seam: fetching and updating an issue's body.

use crate::domain::IssueRef;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// The body field of an issue as returned by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueBody {
    /// Body text, `None` when the issue has no body.
    #[serde(default)]
    pub body: Option<String>,
}

/// Remote system that owns issue bodies.
///
/// The host is the source of truth: every write goes through
/// [`IssueHost::update_issue`], and the body it answers with is what was
/// actually stored, which may differ from what was sent if the host
/// normalizes text.
#[async_trait]
pub trait IssueHost: Send + Sync {
    /// Fetch the issue.
    async fn get_issue(&self, issue: &IssueRef) -> Result<IssueBody>;

    /// Replace the issue's body, returning the stored result.
    async fn update_issue(&self, issue: &IssueRef, body: &str) -> Result<IssueBody>;
}

/// A call received by an [`InMemoryIssueHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    /// `get_issue` for the issue.
    Get(IssueRef),
    /// `update_issue` for the issue with the submitted body.
    Update(IssueRef, String),
}

type IssueKey = (String, String, u64);

fn key_of(issue: &IssueRef) -> IssueKey {
    (issue.owner.clone(), issue.repo.clone(), issue.issue_number)
}

/// Strip the known body so recorded calls compare by identity only.
fn bare(issue: &IssueRef) -> IssueRef {
    IssueRef::new(issue.owner.clone(), issue.repo.clone(), issue.issue_number)
}

#[derive(Default)]
struct HostState {
    bodies: HashMap<IssueKey, Option<String>>,
    calls: Vec<HostCall>,
}

/// Process-local issue host.
///
/// Issues spring into existence with a `null` body on first access. Every
/// call is recorded, so tests can assert how many round-trips a provider
/// made.
#[derive(Default)]
pub struct InMemoryIssueHost {
    state: Mutex<HostState>,
}

impl InMemoryIssueHost {
    /// Create a host with no issues.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a host holding one issue with the given body.
    #[must_use]
    pub fn with_issue(issue: &IssueRef, body: Option<&str>) -> Self {
        let mut state = HostState::default();
        state.bodies.insert(key_of(issue), body.map(str::to_string));
        Self {
            state: Mutex::new(state),
        }
    }

    /// Overwrite the stored body of an issue, as another writer would.
    pub async fn put(&self, issue: &IssueRef, body: Option<&str>) {
        self.state
            .lock()
            .await
            .bodies
            .insert(key_of(issue), body.map(str::to_string));
    }

    /// Current body of an issue.
    pub async fn body(&self, issue: &IssueRef) -> Option<String> {
        self.state
            .lock()
            .await
            .bodies
            .get(&key_of(issue))
            .cloned()
            .flatten()
    }

    /// Calls received so far, oldest first.
    pub async fn calls(&self) -> Vec<HostCall> {
        self.state.lock().await.calls.clone()
    }
}

#[async_trait]
impl IssueHost for InMemoryIssueHost {
    async fn get_issue(&self, issue: &IssueRef) -> Result<IssueBody> {
        let mut state = self.state.lock().await;
        state.calls.push(HostCall::Get(bare(issue)));
        let body = state.bodies.entry(key_of(issue)).or_default().clone();
        Ok(IssueBody { body })
    }

    async fn update_issue(&self, issue: &IssueRef, body: &str) -> Result<IssueBody> {
        let mut state = self.state.lock().await;
        state
            .calls
            .push(HostCall::Update(bare(issue), body.to_string()));
        state
            .bodies
            .insert(key_of(issue), Some(body.to_string()));
        Ok(IssueBody {
            body: Some(body.to_string()),
        })
    }
}

//! Metadata stored in a marker at the end of the issue body.
//!
//! Reads decode the marker out of the current body. Writes merge into the
//! tenant's record, render a new body, and push it to the [`IssueHost`].
//! Records of other tenants in the same marker pass through untouched.

mod github;
mod host;

pub use github::{DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, GithubClient};
pub use host::{HostCall, InMemoryIssueHost, IssueBody, IssueHost};

use crate::context::Context;
use crate::domain::{IssueRef, TenantId};
use crate::error::Result;
use crate::storage::{MetadataStorage, missing_issue};
use async_trait::async_trait;
use issue_metadata_marker::{MetadataRecord, decode};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Body-backed metadata storage for one issue and one tenant.
pub struct BodyStorage {
    host: Arc<dyn IssueHost>,
    issue: IssueRef,
    tenant: TenantId,
    /// Body supplied by the caller, refreshed after each of our writes.
    /// `None` means every operation fetches from the host.
    known_body: Mutex<Option<String>>,
}

impl BodyStorage {
    /// Create storage for `issue`, acting as `tenant`.
    ///
    /// If `issue.body` is set, it is used instead of fetching the issue.
    pub fn new(host: Arc<dyn IssueHost>, mut issue: IssueRef, tenant: TenantId) -> Self {
        let known_body = issue.body.take();
        Self {
            host,
            issue,
            tenant,
            known_body: Mutex::new(known_body),
        }
    }

    /// Create storage for the issue and installation of a webhook event.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the event has no installation or does not
    /// refer to an issue.
    pub fn for_context(host: Arc<dyn IssueHost>, context: &Context) -> Result<Self> {
        let issue = context.issue().ok_or_else(|| missing_issue(context))?;
        Ok(Self::new(host, issue, context.tenant_id()?))
    }

    /// The issue this storage reads and writes.
    #[must_use]
    pub fn issue(&self) -> &IssueRef {
        &self.issue
    }

    /// The tenant this storage acts as.
    #[must_use]
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    async fn body(&self) -> Result<String> {
        if let Some(body) = self.known_body.lock().await.clone() {
            return Ok(body);
        }
        debug!(issue = %self.issue, "No known body, fetching issue");
        let fetched = self.host.get_issue(&self.issue).await?;
        Ok(fetched.body.unwrap_or_default())
    }

    async fn remember(&self, body: &str) {
        if let Some(known) = self.known_body.lock().await.as_mut() {
            body.clone_into(known);
        }
    }
}

#[async_trait]
impl MetadataStorage for BodyStorage {
    async fn get(&self) -> Result<Option<MetadataRecord>> {
        let body = self.body().await?;
        let decoded = decode(Some(&body))?;
        Ok(decoded.table.record(self.tenant.as_str())?.cloned())
    }

    async fn set(&self, partial: MetadataRecord) -> Result<MetadataRecord> {
        let tenant = self.tenant.as_str();

        // === Phase 1: merge into the current body ===
        let body = self.body().await?;
        let mut decoded = decode(Some(&body))?;
        let merged = decoded.table.merge(tenant, partial)?.clone();
        let next = decoded.to_body()?;

        // === Phase 2: persist ===
        debug!(issue = %self.issue, %tenant, keys = merged.len(), "Writing metadata to issue body");
        let updated = self.host.update_issue(&self.issue, &next).await?;
        let stored = updated.body.unwrap_or(next);
        self.remember(&stored).await;

        // === Phase 3: report what the host actually kept ===
        let echoed = decode(Some(&stored))
            .and_then(|decoded| Ok(decoded.table.record(tenant)?.cloned()));
        match echoed {
            Ok(Some(record)) => Ok(record),
            Ok(None) => {
                warn!(issue = %self.issue, %tenant, "Host response dropped the metadata marker");
                Ok(merged)
            }
            Err(error) => {
                warn!(issue = %self.issue, %tenant, %error, "Could not decode host response body");
                Ok(merged)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::{Value, json};

    fn partial(value: Value) -> MetadataRecord {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn issue() -> IssueRef {
        IssueRef::new("foo", "bar", 42)
    }

    #[tokio::test]
    async fn null_body_reads_as_nothing() {
        let host = Arc::new(InMemoryIssueHost::with_issue(&issue(), None));
        let storage = BodyStorage::new(host.clone(), issue(), TenantId::from(1_u64));

        assert_eq!(storage.get().await.unwrap(), None);
        assert_eq!(storage.get_key("unknown").await.unwrap(), None);
        assert_eq!(host.calls().await, [HostCall::Get(issue()), HostCall::Get(issue())]);
    }

    #[tokio::test]
    async fn known_body_skips_fetch_and_follows_writes() {
        let host = Arc::new(InMemoryIssueHost::new());
        let known = issue().with_body("hello world\n\n<!-- probot = {\"1\":{\"hello\":\"world\"}} -->");
        let storage = BodyStorage::new(host.clone(), known, TenantId::from(1_u64));

        assert_eq!(storage.get_key("hello").await.unwrap(), Some(json!("world")));
        storage.set(partial(json!({"foo": "bar"}))).await.unwrap();
        assert_eq!(storage.get_key("foo").await.unwrap(), Some(json!("bar")));

        let calls = host.calls().await;
        assert_eq!(calls.len(), 1);
        assert!(matches!(&calls[0], HostCall::Update(..)));
    }

    #[tokio::test]
    async fn malformed_marker_fails_set_without_writing() {
        let host = Arc::new(InMemoryIssueHost::with_issue(
            &issue(),
            Some("post\n\n<!-- probot = {broken -->"),
        ));
        let storage = BodyStorage::new(host.clone(), issue(), TenantId::from(1_u64));

        let result = storage.set(partial(json!({"a": 1}))).await;

        assert!(matches!(result, Err(Error::Marker(_))));
        assert_eq!(host.calls().await, [HostCall::Get(issue())]);
    }

    #[test]
    fn for_context_requires_issue() {
        let host: Arc<dyn IssueHost> = Arc::new(InMemoryIssueHost::new());
        let result = BodyStorage::for_context(host, &Context::new(1));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}

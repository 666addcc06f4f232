//! Domain types shared by the storage backends.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the tenant (app installation) that owns a metadata record.
///
/// Records of different tenants live side by side in the same issue body;
/// a tenant only ever reads and writes its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl TenantId {
    /// Create a new tenant ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the tenant ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TenantId {
    fn from(installation_id: u64) -> Self {
        Self(installation_id.to_string())
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Reference to the issue whose body carries the metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRef {
    /// Repository owner (user or organization login)
    pub owner: String,

    /// Repository name
    pub repo: String,

    /// Issue or pull request number
    pub issue_number: u64,

    /// Body text already known to the caller, e.g. from the webhook payload.
    /// When set, reads use it instead of fetching the issue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl IssueRef {
    /// Create a reference without a known body
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, issue_number: u64) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            issue_number,
            body: None,
        }
    }

    /// Attach an already-known body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Key identifying this issue in a document store: `{owner}-{repo}_{number}`.
    #[must_use]
    pub fn record_key(&self) -> String {
        format!("{}-{}_{}", self.owner, self.repo, self.issue_number)
    }
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.issue_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_from_installation_id() {
        assert_eq!(TenantId::from(1_u64).as_str(), "1");
        assert_eq!(TenantId::from(1234567_u64).to_string(), "1234567");
    }

    #[test]
    fn record_key_format() {
        let issue = IssueRef::new("foo", "bar", 42);
        assert_eq!(issue.record_key(), "foo-bar_42");
        assert_eq!(issue.to_string(), "foo/bar#42");
    }

    #[test]
    fn body_is_optional_in_json() {
        let issue: IssueRef =
            serde_json::from_str(r#"{"owner":"foo","repo":"bar","issue_number":42}"#).unwrap();
        assert_eq!(issue.body, None);

        let issue = issue.with_body("text");
        assert_eq!(
            serde_json::to_string(&issue).unwrap(),
            r#"{"owner":"foo","repo":"bar","issue_number":42,"body":"text"}"#
        );
    }
}

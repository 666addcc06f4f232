//! Storage abstraction for per-tenant issue metadata.
//!
//! This module provides the core storage trait and a factory for creating
//! storage backends. It supports several implementations:
//!
//! - **Body**: metadata hidden in a marker at the end of the issue body,
//!   read and written through an [`body::IssueHost`]
//! - **Document**: one document per issue in an external document store
//! - **In-memory**: the document backend over a process-local store, for
//!   tests and local runs
//!
//! # Architecture
//!
//! The trait is async and object-safe, so callers can hold a
//! `Box<dyn MetadataStorage>` without caring which backend they got. Every
//! backend is scoped to one tenant and one issue when it is constructed.
//!
//! # Concurrency
//!
//! A `set` reads the current state, merges, and writes it back. Nothing
//! coordinates concurrent writers to the same issue: when two writes
//! interleave, the last one to land wins. Callers that need stronger
//! guarantees must serialize their writes.
//!
//! # Example
//!
//! ```
//! use issue_metadata::{Context, MetadataRecord, StorageBackend, create_storage};
//! use serde_json::json;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let context = Context::new(1).with_issue("foo", "bar", 42);
//!     let storage = create_storage(StorageBackend::InMemory, &context)?;
//!
//!     let mut partial = MetadataRecord::new();
//!     partial.insert("hello".to_string(), json!("world"));
//!     let record = storage.set(partial).await?;
//!
//!     assert_eq!(record.get("hello"), Some(&json!("world")));
//!     Ok(())
//! }
//! ```

use crate::context::Context;
use crate::error::{Error, Result};
use async_trait::async_trait;
use issue_metadata_marker::MetadataRecord;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub mod body;
pub mod document;

use body::{BodyStorage, IssueHost};
use document::{DocumentStorage, DocumentStore, InMemoryDocumentStore};

/// Core storage trait for tenant-scoped issue metadata.
///
/// Implementations must be `Send + Sync` so they can be shared across tasks.
///
/// # Error Handling
///
/// Backends do not retry and do not recover. Transport failures, corrupted
/// markers and store errors propagate to the caller. The only condition
/// mapped to a normal result is "nothing stored yet", which is `Ok(None)`.
#[async_trait]
pub trait MetadataStorage: Send + Sync {
    /// Get the full record of the tenant.
    ///
    /// Returns `None` when the tenant has no record at all. An empty map is
    /// never used to stand in for "nothing stored".
    async fn get(&self) -> Result<Option<MetadataRecord>>;

    /// Get a single value from the tenant's record.
    ///
    /// Returns `None` when the tenant has no record or the key is absent.
    async fn get_key(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.get().await?.and_then(|mut record| record.remove(key)))
    }

    /// Merge `partial` into the tenant's record and persist it.
    ///
    /// The merge is shallow: keys in `partial` replace same-named keys,
    /// nested objects included, and all other keys are kept. Returns the
    /// tenant's full record as it was persisted.
    async fn set(&self, partial: MetadataRecord) -> Result<MetadataRecord>;
}

#[async_trait]
impl<S: MetadataStorage + ?Sized> MetadataStorage for Box<S> {
    async fn get(&self) -> Result<Option<MetadataRecord>> {
        (**self).get().await
    }

    async fn get_key(&self, key: &str) -> Result<Option<Value>> {
        (**self).get_key(key).await
    }

    async fn set(&self, partial: MetadataRecord) -> Result<MetadataRecord> {
        (**self).set(partial).await
    }
}

/// Storage backend selection.
///
/// Determines which storage implementation [`create_storage`] builds.
#[derive(Clone)]
pub enum StorageBackend {
    /// Metadata hidden in the issue body.
    Body {
        /// Host used to fetch and update the issue.
        host: Arc<dyn IssueHost>,
        /// Issue to use instead of the one in the webhook context, e.g. to
        /// pass an already-known body.
        issue: Option<crate::domain::IssueRef>,
    },

    /// Metadata in an external document store.
    Document(Arc<dyn DocumentStore>),

    /// Document backend over a fresh process-local store (ephemeral).
    InMemory,
}

impl StorageBackend {
    /// Short name of the backend, as used in configuration files.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Body { .. } => "body",
            Self::Document(_) => "document",
            Self::InMemory => "memory",
        }
    }
}

impl fmt::Debug for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Body { issue, .. } => f.debug_struct("Body").field("issue", issue).finish(),
            Self::Document(_) => f.write_str("Document"),
            Self::InMemory => f.write_str("InMemory"),
        }
    }
}

/// Create a storage instance for the given backend.
///
/// The tenant and the issue are taken from `context`; both are fixed for
/// the lifetime of the returned storage.
///
/// # Errors
///
/// - `Error::Config` if the context has no installation id
/// - `Error::Config` if the body backend has no issue to work on
pub fn create_storage(
    backend: StorageBackend,
    context: &Context,
) -> Result<Box<dyn MetadataStorage>> {
    tracing::debug!(backend = backend.name(), "Creating metadata storage");
    match backend {
        StorageBackend::Body { host, issue } => {
            let storage = match issue {
                Some(issue) => BodyStorage::new(host, issue, context.tenant_id()?),
                None => BodyStorage::for_context(host, context)?,
            };
            Ok(Box::new(storage))
        }
        StorageBackend::Document(store) => Ok(Box::new(DocumentStorage::new(store, context)?)),
        StorageBackend::InMemory => {
            let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
            Ok(Box::new(DocumentStorage::new(store, context)?))
        }
    }
}

/// Returns `Error::Config` describing a context without an issue.
pub(crate) fn missing_issue(context: &Context) -> Error {
    Error::Config(format!(
        "webhook event for installation {:?} does not refer to an issue",
        context.installation_id()
    ))
}

//! Metadata stored as documents in an external document store.
//!
//! Each installation gets its own collection, named after the installation
//! id, with a unique index `unique-index-{id}` over the document key. Each
//! issue is one document `{ key, value }` where `key` is
//! `{owner}-{repo}_{number}` and `value` is the tenant's record.
//!
//! The collection and index are created once per [`DocumentStorage`], before
//! its first operation. Creating something that already exists is not an
//! error.

mod fauna;
mod memory;

pub use fauna::{DEFAULT_ENDPOINT, FaunaClient, SECRET_ENV};
pub use memory::InMemoryDocumentStore;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::storage::MetadataStorage;
use async_trait::async_trait;
use issue_metadata_marker::MetadataRecord;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Client of a document store holding `{ key, value }` documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a collection.
    ///
    /// Returns `Error::AlreadyExists` if it exists.
    async fn create_collection(&self, name: &str) -> Result<()>;

    /// Create a unique index over the `key` field of `collection`.
    ///
    /// Stores where index creation is naturally idempotent may succeed
    /// instead of returning `Error::AlreadyExists`.
    async fn create_index(&self, name: &str, collection: &str) -> Result<()>;

    /// Look up the value stored under `key`. A missing document is `None`.
    async fn find(&self, collection: &str, index: &str, key: &str)
    -> Result<Option<MetadataRecord>>;

    /// Create or replace the document for `key`, returning the stored value.
    async fn upsert(
        &self,
        collection: &str,
        index: &str,
        key: &str,
        value: MetadataRecord,
    ) -> Result<MetadataRecord>;
}

/// Treat "already exists" as success.
fn ignore_existing(result: Result<()>) -> Result<()> {
    match result {
        Err(Error::AlreadyExists { kind, name }) => {
            debug!(kind, %name, "Already exists, skipping creation");
            Ok(())
        }
        other => other,
    }
}

/// Document-backed metadata storage for one issue and one tenant.
pub struct DocumentStorage {
    store: Arc<dyn DocumentStore>,
    collection: String,
    index: String,
    key: String,
    initialized: OnceCell<()>,
}

impl DocumentStorage {
    /// Create storage over an injected store client.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the context has no installation id.
    pub fn new(store: Arc<dyn DocumentStore>, context: &Context) -> Result<Self> {
        let tenant = context.tenant_id()?;
        Ok(Self {
            store,
            index: format!("unique-index-{tenant}"),
            collection: tenant.0,
            key: context.record_key(),
            initialized: OnceCell::new(),
        })
    }

    /// Create storage over a [`FaunaClient`] built from the `FAUNADB_SECRET`
    /// environment variable.
    ///
    /// # Errors
    ///
    /// - `Error::BackendInitialization` if the variable is not set
    /// - `Error::Config` if the context has no installation id
    pub fn from_env(context: &Context) -> Result<Self> {
        let client = FaunaClient::from_env(DEFAULT_ENDPOINT, SECRET_ENV)?;
        Self::new(Arc::new(client), context)
    }

    /// Name of the installation's collection.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Name of the unique index over document keys.
    #[must_use]
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Key of this issue's document.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    async fn ensure_initialized(&self) -> Result<()> {
        self.initialized
            .get_or_try_init(|| async {
                debug!(collection = %self.collection, index = %self.index, "Initializing document store");
                ignore_existing(self.store.create_collection(&self.collection).await)?;
                ignore_existing(self.store.create_index(&self.index, &self.collection).await)
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MetadataStorage for DocumentStorage {
    async fn get(&self) -> Result<Option<MetadataRecord>> {
        self.ensure_initialized().await?;
        self.store
            .find(&self.collection, &self.index, &self.key)
            .await
    }

    async fn set(&self, partial: MetadataRecord) -> Result<MetadataRecord> {
        self.ensure_initialized().await?;
        let mut value = self
            .store
            .find(&self.collection, &self.index, &self.key)
            .await?
            .unwrap_or_default();
        for (key, entry) in partial {
            value.insert(key, entry);
        }
        debug!(key = %self.key, "Upserting metadata document");
        self.store
            .upsert(&self.collection, &self.index, &self.key, value)
            .await
    }
}

//! Process-local document store.
//!
//! Data is held in RAM and lost when the process exits. Behaves like a
//! remote store where it matters to [`super::DocumentStorage`]: creating
//! an existing collection or index fails with `AlreadyExists`, and lookups
//! through an unknown index fail.

use super::DocumentStore;
use crate::error::{Error, Result};
use async_trait::async_trait;
use issue_metadata_marker::MetadataRecord;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct Inner {
    /// Documents per collection, keyed by document key.
    collections: HashMap<String, HashMap<String, MetadataRecord>>,
    /// Index name to the collection it covers.
    indexes: HashMap<String, String>,
}

impl Inner {
    /// Checks that `index` exists and covers `collection`.
    fn check_index(&self, collection: &str, index: &str) -> Result<()> {
        match self.indexes.get(index) {
            Some(covered) if covered == collection => Ok(()),
            Some(_) => Err(Error::DocumentStore(format!(
                "index '{index}' does not cover collection '{collection}'"
            ))),
            None => Err(Error::DocumentStore(format!("index '{index}' not found"))),
        }
    }
}

/// Thread-safe in-memory [`DocumentStore`].
#[derive(Default)]
pub struct InMemoryDocumentStore {
    inner: Mutex<Inner>,
}

impl InMemoryDocumentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection, `None` if it does not exist.
    pub async fn document_count(&self, collection: &str) -> Option<usize> {
        self.inner
            .lock()
            .await
            .collections
            .get(collection)
            .map(HashMap::len)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn create_collection(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.collections.contains_key(name) {
            return Err(Error::AlreadyExists {
                kind: "collection",
                name: name.to_string(),
            });
        }
        inner.collections.insert(name.to_string(), HashMap::new());
        Ok(())
    }

    async fn create_index(&self, name: &str, collection: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.indexes.contains_key(name) {
            return Err(Error::AlreadyExists {
                kind: "index",
                name: name.to_string(),
            });
        }
        if !inner.collections.contains_key(collection) {
            return Err(Error::DocumentStore(format!(
                "collection '{collection}' not found"
            )));
        }
        inner
            .indexes
            .insert(name.to_string(), collection.to_string());
        Ok(())
    }

    async fn find(
        &self,
        collection: &str,
        index: &str,
        key: &str,
    ) -> Result<Option<MetadataRecord>> {
        let inner = self.inner.lock().await;
        inner.check_index(collection, index)?;
        Ok(inner
            .collections
            .get(collection)
            .and_then(|documents| documents.get(key))
            .cloned())
    }

    async fn upsert(
        &self,
        collection: &str,
        index: &str,
        key: &str,
        value: MetadataRecord,
    ) -> Result<MetadataRecord> {
        let mut inner = self.inner.lock().await;
        inner.check_index(collection, index)?;
        let documents = inner
            .collections
            .get_mut(collection)
            .ok_or_else(|| Error::DocumentStore(format!("collection '{collection}' not found")))?;
        documents.insert(key.to_string(), value.clone());
        Ok(value)
    }
}

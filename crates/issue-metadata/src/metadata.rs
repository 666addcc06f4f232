//! The `Metadata` facade.
//!
//! Callers write metadata in one of three shapes, all funneled through
//! [`SetInput::normalize`] into a partial record:
//!
//! ```
//! use issue_metadata::{KeyValue, SetInput};
//! use serde_json::json;
//!
//! let pair = SetInput::pair("key", "value").normalize().unwrap();
//! let entry = SetInput::from(KeyValue::new("key", "value")).normalize().unwrap();
//! assert_eq!(pair, entry);
//!
//! assert!(SetInput::Pair { key: "key".into(), value: None }.normalize().is_err());
//! ```

use crate::context::Context;
use crate::domain::IssueRef;
use crate::error::{Error, Result};
use crate::storage::MetadataStorage;
use crate::storage::body::{BodyStorage, IssueHost};
use issue_metadata_marker::MetadataRecord;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// A single key and its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValue {
    /// Key within the tenant's record
    pub key: String,
    /// Value to store; `None` and JSON `null` both count as missing
    #[serde(default)]
    pub value: Option<Value>,
}

impl KeyValue {
    /// Create an entry with a value.
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }
}

/// What a caller asked [`Metadata::set`] to write.
#[derive(Debug, Clone, PartialEq)]
pub enum SetInput {
    /// A key and its value.
    Pair {
        /// Key within the tenant's record
        key: String,
        /// Value to store
        value: Option<Value>,
    },
    /// A `{ key, value }` entry.
    Entry(KeyValue),
    /// Several keys at once, merged as given.
    Partial(MetadataRecord),
}

impl SetInput {
    /// A key with a value.
    pub fn pair(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Pair {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    /// Turn the input into the partial record to merge.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingValue` when a single key comes without a
    /// value, or with JSON `null`.
    pub fn normalize(self) -> Result<MetadataRecord> {
        let (key, value) = match self {
            Self::Partial(partial) => return Ok(partial),
            Self::Pair { key, value } | Self::Entry(KeyValue { key, value }) => (key, value),
        };
        match value {
            Some(value) if !value.is_null() => {
                let mut partial = MetadataRecord::new();
                partial.insert(key, value);
                Ok(partial)
            }
            _ => Err(Error::MissingValue { key }),
        }
    }
}

impl From<KeyValue> for SetInput {
    fn from(entry: KeyValue) -> Self {
        Self::Entry(entry)
    }
}

impl From<MetadataRecord> for SetInput {
    fn from(partial: MetadataRecord) -> Self {
        Self::Partial(partial)
    }
}

impl<K: Into<String>> From<(K, Value)> for SetInput {
    fn from((key, value): (K, Value)) -> Self {
        Self::Pair {
            key: key.into(),
            value: Some(value),
        }
    }
}

/// Tenant-scoped metadata of one issue, over any storage backend.
pub struct Metadata {
    storage: Box<dyn MetadataStorage>,
}

impl Metadata {
    /// Wrap a storage backend.
    pub fn new(storage: impl MetadataStorage + 'static) -> Self {
        Self {
            storage: Box::new(storage),
        }
    }

    /// Wrap a boxed backend, e.g. one from [`crate::create_storage`].
    #[must_use]
    pub fn from_boxed(storage: Box<dyn MetadataStorage>) -> Self {
        Self { storage }
    }

    /// The tenant's full record, `None` if nothing was stored yet.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn get(&self) -> Result<Option<MetadataRecord>> {
        self.storage.get().await
    }

    /// One value of the tenant's record.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn get_key(&self, key: &str) -> Result<Option<Value>> {
        self.storage.get_key(key).await
    }

    /// One value of the tenant's record, deserialized.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the stored value does not fit `T`.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get_key(key)
            .await?
            .map(serde_json::from_value)
            .transpose()
            .map_err(Error::from)
    }

    /// Merge `input` into the tenant's record and return the stored record.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingValue` before any I/O if a single key comes
    /// without a value; otherwise propagates backend errors.
    pub async fn set(&self, input: impl Into<SetInput>) -> Result<MetadataRecord> {
        let partial = input.into().normalize()?;
        self.storage.set(partial).await
    }

    /// Store one value.
    ///
    /// # Errors
    ///
    /// See [`Metadata::set`].
    pub async fn set_pair(
        &self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<MetadataRecord> {
        self.set(SetInput::pair(key, value)).await
    }

    /// Store one serializable value.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if `value` cannot be serialized; see also
    /// [`Metadata::set`].
    pub async fn set_value<T: Serialize + ?Sized>(
        &self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<MetadataRecord> {
        let value = serde_json::to_value(value)?;
        self.set(SetInput::Pair {
            key: key.into(),
            value: Some(value),
        })
        .await
    }
}

/// Body-backed metadata for the webhook event's issue, or for `issue` if given.
///
/// # Errors
///
/// Returns `Error::Config` if the context has no installation, or neither
/// `issue` nor the context names an issue.
pub fn metadata_for_issue(
    context: &Context,
    host: Arc<dyn IssueHost>,
    issue: Option<IssueRef>,
) -> Result<Metadata> {
    let storage = match issue {
        Some(issue) => BodyStorage::new(host, issue, context.tenant_id()?),
        None => BodyStorage::for_context(host, context)?,
    };
    Ok(Metadata::new(storage))
}

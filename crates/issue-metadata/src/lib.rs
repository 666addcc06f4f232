//! Per-installation key/value metadata stored on hosted issues.
//!
//! Bots that react to webhooks often need to remember a little state per
//! issue between invocations. This crate keeps that state either hidden in
//! the issue body itself (see [`issue_metadata_marker`] for the format) or
//! in an external document store, behind one [`MetadataStorage`] trait.
//!
//! # Example
//!
//! ```no_run
//! use issue_metadata::{Context, Metadata, SetInput};
//! use issue_metadata::storage::body::{BodyStorage, GithubClient};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let payload = json!({
//!         "installation": { "id": 1 },
//!         "issue": { "number": 42 },
//!         "repository": { "name": "bar", "owner": { "login": "foo" } },
//!     });
//!     let context = Context::from_payload(payload)?;
//!     let host = Arc::new(GithubClient::new(GithubClient::DEFAULT_API_URL, None)?);
//!
//!     let metadata = Metadata::new(BodyStorage::for_context(host, &context)?);
//!     metadata.set(SetInput::pair("hello", "world")).await?;
//!     assert_eq!(metadata.get_key("hello").await?, Some(json!("world")));
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod metadata;
pub mod storage;

pub use context::Context;
pub use domain::{IssueRef, TenantId};
pub use error::{Error, Result};
pub use issue_metadata_marker::MetadataRecord;
pub use metadata::{KeyValue, Metadata, SetInput, metadata_for_issue};
pub use storage::{MetadataStorage, StorageBackend, create_storage};

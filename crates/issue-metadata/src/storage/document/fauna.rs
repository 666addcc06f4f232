//! Fauna document store client.
//!
//! Talks to the Fauna v10 query endpoint (`POST /query/1`) with FQL query
//! strings. Collection and index names are mapped to FQL identifiers, since
//! installation ids start with a digit and index names contain dashes.
//! Values are embedded as literals: compact JSON is valid FQL once `#{`
//! (string interpolation) is escaped.

use super::DocumentStore;
use crate::error::{Error, Result};
use async_trait::async_trait;
use issue_metadata_marker::MetadataRecord;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Default Fauna endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://db.fauna.com";

/// Environment variable holding the Fauna secret.
pub const SECRET_ENV: &str = "FAUNADB_SECRET";

/// Error code Fauna uses when a create violates a uniqueness constraint.
const CONSTRAINT_FAILURE: &str = "constraint_failure";

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: QueryError,
}

#[derive(Deserialize)]
struct QueryError {
    code: String,
    #[serde(default)]
    message: String,
}

/// Maps a store name onto an FQL identifier.
fn identifier(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if !ident.starts_with(|c: char| c.is_ascii_alphabetic()) {
        ident.insert_str(0, "doc_");
    }
    ident
}

/// Renders a JSON value as an FQL literal.
fn literal<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.replace("#{", "\\#{"))
}

/// [`super::DocumentStore`] backed by Fauna.
#[derive(Debug, Clone)]
pub struct FaunaClient {
    endpoint: String,
    http: reqwest::Client,
}

impl FaunaClient {
    /// Create a client authenticating with `secret`.
    ///
    /// # Errors
    ///
    /// Returns `Error::BackendInitialization` if the secret is not a valid
    /// header value or the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, secret: &str) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {secret}"))
            .map_err(|e| Error::BackendInitialization(format!("invalid secret: {e}")))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert("x-format", HeaderValue::from_static("simple"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::BackendInitialization(format!("HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Create a client with the secret read from the environment variable `var`.
    ///
    /// # Errors
    ///
    /// Returns `Error::BackendInitialization` if the variable is unset or empty.
    pub fn from_env(endpoint: impl Into<String>, var: &str) -> Result<Self> {
        match std::env::var(var) {
            Ok(secret) if !secret.is_empty() => Self::new(endpoint, &secret),
            _ => Err(Error::BackendInitialization(format!(
                "no document store client was provided and {var} is not set"
            ))),
        }
    }

    /// The endpoint queries are sent to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn query(&self, fql: &str) -> Result<std::result::Result<Value, QueryError>> {
        let url = format!("{}/query/1", self.endpoint);
        let response = self
            .http
            .post(url)
            .json(&QueryRequest { query: fql })
            .send()
            .await
            .map_err(|e| Error::DocumentStore(format!("request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::DocumentStore(format!("reading response failed: {e}")))?;

        if status.is_success() {
            let parsed: QueryResponse = serde_json::from_str(&text)?;
            return Ok(Ok(parsed.data));
        }
        match serde_json::from_str::<ErrorResponse>(&text) {
            Ok(parsed) => Ok(Err(parsed.error)),
            Err(_) => Err(Error::DocumentStore(format!("HTTP {status}: {text}"))),
        }
    }

    async fn run(&self, fql: &str) -> Result<Value> {
        self.query(fql).await?.map_err(|e| {
            Error::DocumentStore(format!("{}: {}", e.code, e.message))
        })
    }
}

fn record_from(data: Value) -> Result<Option<MetadataRecord>> {
    match data {
        Value::Null => Ok(None),
        Value::Object(record) => Ok(Some(record)),
        other => Err(Error::DocumentStore(format!(
            "expected a metadata object, got {other}"
        ))),
    }
}

#[async_trait]
impl DocumentStore for FaunaClient {
    async fn create_collection(&self, name: &str) -> Result<()> {
        let fql = format!("Collection.create({{ name: {} }})", literal(&identifier(name))?);
        debug!(collection = name, "Creating Fauna collection");
        match self.query(&fql).await? {
            Ok(_) => Ok(()),
            Err(e) if e.code == CONSTRAINT_FAILURE || e.message.contains("already exists") => {
                Err(Error::AlreadyExists {
                    kind: "collection",
                    name: name.to_string(),
                })
            }
            Err(e) => Err(Error::DocumentStore(format!("{}: {}", e.code, e.message))),
        }
    }

    async fn create_index(&self, name: &str, collection: &str) -> Result<()> {
        let fql = format!(
            "Collection.byName({})!.update({{ indexes: {{ {}: {{ terms: [{{ field: \".key\" }}] }} }}, constraints: [{{ unique: [\".key\"] }}] }})",
            literal(&identifier(collection))?,
            identifier(name),
        );
        debug!(index = name, collection, "Creating Fauna index");
        self.run(&fql).await.map(|_| ())
    }

    async fn find(
        &self,
        collection: &str,
        index: &str,
        key: &str,
    ) -> Result<Option<MetadataRecord>> {
        let fql = format!(
            "{}.{}({}).first()?.value",
            identifier(collection),
            identifier(index),
            literal(key)?,
        );
        record_from(self.run(&fql).await?)
    }

    async fn upsert(
        &self,
        collection: &str,
        index: &str,
        key: &str,
        value: MetadataRecord,
    ) -> Result<MetadataRecord> {
        let collection = identifier(collection);
        let document = format!("{{ key: {}, value: {} }}", literal(key)?, literal(&value)?);
        let fql = format!(
            "let doc = {collection}.{index}({key}).first()\n\
             if (doc == null) {{\n  {collection}.create({document}).value\n}} else {{\n  doc!.replace({document}).value\n}}",
            index = identifier(index),
            key = literal(key)?,
        );
        debug!(%collection, key, "Upserting Fauna document");
        record_from(self.run(&fql).await?)?
            .ok_or_else(|| Error::DocumentStore("upsert returned no document".to_string()))
    }
}

//! YAML configuration selecting and parameterizing a storage backend.
//!
//! ```yaml
//! backend: body
//! github:
//!   api-url: https://api.github.com
//!   token-env: GITHUB_TOKEN
//!   user-agent: issue-metadata
//!   timeout-secs: 30
//! document:
//!   endpoint: https://db.fauna.com
//!   secret-env: FAUNADB_SECRET
//! ```
//!
//! Secrets never live in the file, only the names of the environment
//! variables that hold them.

use crate::error::{Error, Result};
use crate::storage::StorageBackend;
use crate::storage::body::{DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, GithubClient};
use crate::storage::document::{DEFAULT_ENDPOINT, FaunaClient, SECRET_ENV};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;

/// Environment variable holding the GitHub token by default.
pub const DEFAULT_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Which backend [`MetadataConfig::to_backend`] builds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Marker in the issue body.
    #[default]
    Body,
    /// External document store.
    Document,
    /// Process-local document store.
    Memory,
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct MetadataConfig {
    /// Storage backend type
    #[serde(default)]
    pub backend: BackendKind,

    /// GitHub API section, used by the body backend
    #[serde(default)]
    pub github: GithubConfig,

    /// Document store section, used by the document backend
    #[serde(default)]
    pub document: DocumentConfig,
}

/// GitHub API configuration section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct GithubConfig {
    /// API root
    pub api_url: String,

    /// Environment variable holding the token; unset means anonymous
    pub token_env: String,

    /// `User-Agent` header value
    pub user_agent: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: GithubClient::DEFAULT_API_URL.to_string(),
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

/// Document store configuration section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct DocumentConfig {
    /// Store endpoint
    pub endpoint: String,

    /// Environment variable holding the store secret
    pub secret_env: String,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            secret_env: SECRET_ENV.to_string(),
        }
    }
}

impl MetadataConfig {
    /// Default configuration for a backend.
    #[must_use]
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }

    /// Load configuration from a file
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read, or `Error::Config`
    /// if it is not valid YAML or fails [`MetadataConfig::validate`].
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config: Self =
            serde_yaml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if serialization fails or `Error::Io` if the
    /// file cannot be written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Check the values a backend cannot work without.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the offending key.
    pub fn validate(&self) -> Result<()> {
        if self.github.api_url.trim().is_empty() {
            return Err(Error::Config("github.api-url must not be empty".to_string()));
        }
        if self.github.timeout_secs == 0 {
            return Err(Error::Config(
                "github.timeout-secs must be greater than zero".to_string(),
            ));
        }
        if self.document.endpoint.trim().is_empty() {
            return Err(Error::Config("document.endpoint must not be empty".to_string()));
        }
        Ok(())
    }

    /// Build the configured backend.
    ///
    /// The body backend works on the issue of the context it is later given
    /// to [`crate::create_storage`] with.
    ///
    /// # Errors
    ///
    /// - `Error::Config` if the configuration is invalid
    /// - `Error::BackendInitialization` if a client cannot be built or the
    ///   document store secret is not set
    pub fn to_backend(&self) -> Result<StorageBackend> {
        self.validate()?;
        match self.backend {
            BackendKind::Body => {
                let token = std::env::var(&self.github.token_env)
                    .ok()
                    .filter(|token| !token.is_empty());
                let client = GithubClient::with_options(
                    &self.github.api_url,
                    token,
                    &self.github.user_agent,
                    Duration::from_secs(self.github.timeout_secs),
                )?;
                Ok(StorageBackend::Body {
                    host: Arc::new(client),
                    issue: None,
                })
            }
            BackendKind::Document => {
                let client = FaunaClient::from_env(&self.document.endpoint, &self.document.secret_env)?;
                Ok(StorageBackend::Document(Arc::new(client)))
            }
            BackendKind::Memory => Ok(StorageBackend::InMemory),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = MetadataConfig::default();
        assert_eq!(config.backend, BackendKind::Body);
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.github.timeout_secs, 30);
        assert_eq!(config.document.secret_env, "FAUNADB_SECRET");
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_config_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("metadata.yaml");

        let mut original = MetadataConfig::new(BackendKind::Document);
        original.document.endpoint = "http://localhost:8443".to_string();
        original.save(&config_path).await.unwrap();

        let loaded = MetadataConfig::load(&config_path).await.unwrap();
        assert_eq!(original, loaded);
    }

    #[tokio::test]
    async fn test_config_yaml_format() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("metadata.yaml");

        MetadataConfig::default().save(&config_path).await.unwrap();
        let content = tokio::fs::read_to_string(&config_path).await.unwrap();

        assert!(content.contains("backend: body"));
        assert!(content.contains("api-url: https://api.github.com"));
        assert!(content.contains("timeout-secs: 30"));
        assert!(content.contains("secret-env: FAUNADB_SECRET"));
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("metadata.yaml");
        tokio::fs::write(&config_path, "backend: memory\ngithub:\n  timeout-secs: 5\n")
            .await
            .unwrap();

        let config = MetadataConfig::load(&config_path).await.unwrap();
        assert_eq!(config.backend, BackendKind::Memory);
        assert_eq!(config.github.timeout_secs, 5);
        assert_eq!(config.github.token_env, DEFAULT_TOKEN_ENV);
    }

    #[tokio::test]
    async fn test_invalid_yaml_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("metadata.yaml");
        tokio::fs::write(&config_path, "backend: [").await.unwrap();

        let result = MetadataConfig::load(&config_path).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = MetadataConfig::load(&temp_dir.path().join("absent.yaml")).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = MetadataConfig::default();
        config.github.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_backend_selection() {
        let memory = MetadataConfig::new(BackendKind::Memory).to_backend().unwrap();
        assert_eq!(memory.name(), "memory");

        let body = MetadataConfig::new(BackendKind::Body).to_backend().unwrap();
        assert_eq!(body.name(), "body");

        let mut document = MetadataConfig::new(BackendKind::Document);
        document.document.secret_env = "ISSUE_METADATA_TEST_UNSET_SECRET".to_string();
        assert!(matches!(
            document.to_backend(),
            Err(Error::BackendInitialization(_))
        ));
    }
}

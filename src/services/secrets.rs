//! Parameter/secret resolution, performed once at process startup.
//!
//! The provider hands out opaque string values by name: the active
//! encryption key id and the key-service master secret. `main` resolves both
//! before serving; an unresolved parameter keeps the process from becoming
//! ready.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;
use tracing::info;

/// Name of the active encryption key id parameter.
pub const KEY_ID_PARAMETER: &str = "/secure-file-store/key-id";

/// Name of the hex-encoded key-service master secret parameter.
pub const MASTER_KEY_PARAMETER: &str = "/secure-file-store/master-key";

#[derive(Debug, Error)]
pub enum SecretsError {
    #[error("parameter `{0}` is not present")]
    Missing(String),
    #[error("parameters document is not a JSON object of strings")]
    MalformedDocument,
    #[error("parameters document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// External parameter-store capability.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    async fn get_parameter(&self, name: &str) -> Result<String, SecretsError>;
}

/// Provider backed by a JSON document of `name -> value` pairs on disk.
#[derive(Clone)]
pub struct FileParameterProvider {
    path: PathBuf,
}

impl FileParameterProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn load(&self) -> Result<HashMap<String, String>, SecretsError> {
        let raw = fs::read_to_string(&self.path).await?;
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        let object = value.as_object().ok_or(SecretsError::MalformedDocument)?;
        let mut parameters = HashMap::with_capacity(object.len());
        for (name, entry) in object {
            let text = entry.as_str().ok_or(SecretsError::MalformedDocument)?;
            parameters.insert(name.clone(), text.to_string());
        }
        Ok(parameters)
    }
}

#[async_trait]
impl SecretProvider for FileParameterProvider {
    async fn get_parameter(&self, name: &str) -> Result<String, SecretsError> {
        let parameters = self.load().await?;
        match parameters.get(name) {
            Some(value) => {
                info!("resolved parameter {}", name);
                Ok(value.clone())
            }
            None => Err(SecretsError::Missing(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn provider_with(content: &str) -> (tempfile::TempDir, FileParameterProvider) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("parameters.json");
        let mut file = std::fs::File::create(&path).expect("create");
        file.write_all(content.as_bytes()).expect("write");
        (dir, FileParameterProvider::new(path))
    }

    #[tokio::test]
    async fn resolves_present_parameter() {
        let (_dir, provider) =
            provider_with(r#"{"/secure-file-store/key-id": "alias/files-2026"}"#);
        let value = provider.get_parameter(KEY_ID_PARAMETER).await.unwrap();
        assert_eq!(value, "alias/files-2026");
    }

    #[tokio::test]
    async fn missing_parameter_is_an_error() {
        let (_dir, provider) = provider_with("{}");
        assert!(matches!(
            provider.get_parameter(KEY_ID_PARAMETER).await,
            Err(SecretsError::Missing(_))
        ));
    }

    #[tokio::test]
    async fn malformed_document_is_an_error() {
        let (_dir, provider) = provider_with(r#"{"key": 42}"#);
        assert!(matches!(
            provider.get_parameter("key").await,
            Err(SecretsError::MalformedDocument)
        ));

        let (_dir, provider) = provider_with("not json");
        assert!(matches!(
            provider.get_parameter("key").await,
            Err(SecretsError::Json(_))
        ));
    }
}

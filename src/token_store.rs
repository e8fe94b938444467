//! Credential persistence.
//!
//! The [`TokenStore`] trait is the capability the OAuth engine and the
//! repository client share: `load` the current credential, `save` a renewed
//! one. Implementations must be `Send + Sync`.
//!
//! [`FileTokenStore`] is the production backend: a single JSON file,
//! re-read on every `load` so that external rewrites (another process
//! completing an authorization) are picked up without coordination.
//! Writes are last-writer-wins.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::RwLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::warn;

use crate::models::Credential;

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Current credential, or `None` when nothing usable is stored.
    async fn load(&self) -> Result<Option<Credential>>;

    /// Persist a credential, replacing whatever was stored.
    async fn save(&self, credential: &Credential) -> Result<()>;
}

/// JSON-file-backed store.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<Credential>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                // An unreadable store means "not authorized yet", not a
                // hard failure. The next save rewrites it.
                warn!(path = %self.path.display(), error = %e, "token file unreadable");
                return Ok(None);
            }
        };
        match serde_json::from_str::<Credential>(&raw) {
            Ok(cred) if !cred.access_token.is_empty() => Ok(Some(cred)),
            Ok(_) => Ok(None),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "token file malformed");
                Ok(None)
            }
        }
    }

    async fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.with_context(|| {
                    format!("Failed to create token directory: {}", parent.display())
                })?;
            }
        }
        let body = serde_json::to_string_pretty(credential)?;
        tokio::fs::write(&self.path, body)
            .await
            .with_context(|| format!("Failed to write token file: {}", self.path.display()))?;
        Ok(())
    }
}

/// In-memory store for tests and embedded use.
#[derive(Default)]
pub struct MemoryTokenStore {
    slot: RwLock<Option<Credential>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: RwLock::new(Some(credential)),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<Credential>> {
        Ok(self.slot.read().unwrap().clone())
    }

    async fn save(&self, credential: &Credential) -> Result<()> {
        *self.slot.write().unwrap() = Some(credential.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Credential {
        Credential {
            access_token: "at-1".to_string(),
            refresh_token: Some("rt-1".to_string()),
            expires_at: Some(1_900_000_000),
        }
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("tokens.json"));
        assert!(store.load().await.unwrap().is_none());

        store.save(&sample()).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, sample());
    }

    #[tokio::test]
    async fn test_file_store_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("state").join("auth").join("tokens.json");
        let store = FileTokenStore::new(&nested);
        store.save(&sample()).await.unwrap();
        assert!(nested.exists());
    }

    #[tokio::test]
    async fn test_file_store_rereads_every_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let store = FileTokenStore::new(&path);
        store.save(&sample()).await.unwrap();
        assert_eq!(store.load().await.unwrap().unwrap().access_token, "at-1");

        // Simulate a parallel authorization rewriting the file.
        let renewed = Credential {
            access_token: "at-2".to_string(),
            refresh_token: None,
            expires_at: None,
        };
        tokio::fs::write(&path, serde_json::to_string(&renewed).unwrap())
            .await
            .unwrap();
        assert_eq!(store.load().await.unwrap().unwrap().access_token, "at-2");
    }

    #[tokio::test]
    async fn test_corrupt_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        tokio::fs::write(&path, "{not json").await.unwrap();
        let store = FileTokenStore::new(&path);
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_access_token_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        tokio::fs::write(&path, r#"{"access_token":""}"#).await.unwrap();
        let store = FileTokenStore::new(&path);
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryTokenStore::new();
        assert!(store.load().await.unwrap().is_none());
        store.save(&sample()).await.unwrap();
        assert_eq!(store.load().await.unwrap().unwrap(), sample());
    }
}

//! Durable key → vector stores.
//!
//! The acquirer consults a [`VectorStore`] after a cache miss and writes
//! generated vectors back to it. Keys arrive already normalized.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Durable storage for embeddings.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Look up a stored vector.
    async fn lookup(&self, key: &str) -> Result<Option<Embedding>>;

    /// Store a vector, replacing any previous one.
    async fn store(&self, key: &str, embedding: &Embedding) -> Result<()>;
}

/// Store that keeps everything in memory.
#[derive(Default)]
pub struct MemoryVectorStore {
    entries: RwLock<HashMap<String, Embedding>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn lookup(&self, key: &str) -> Result<Option<Embedding>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn store(&self, key: &str, embedding: &Embedding) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), embedding.clone());
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredVector {
    key: String,
    embedding: Embedding,
}

/// Store persisted as a single JSON file.
///
/// The whole map is rewritten on every `store`; writes go to a temporary
/// file that is then renamed over the original.
pub struct JsonFileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, Embedding>>,
}

impl JsonFileStore {
    /// Open the store at `path`, loading existing entries if the file exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut entries = HashMap::new();

        if fs::try_exists(&path).await? {
            let content = fs::read_to_string(&path).await?;
            let stored: Vec<StoredVector> = serde_json::from_str(&content)?;
            entries.extend(stored.into_iter().map(|s| (s.key, s.embedding)));
            info!("Loaded {} stored vectors from {}", entries.len(), path.display());
        }

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn save(&self, entries: &HashMap<String, Embedding>) -> Result<()> {
        let stored: Vec<StoredVector> = entries
            .iter()
            .map(|(key, embedding)| StoredVector {
                key: key.clone(),
                embedding: embedding.clone(),
            })
            .collect();
        let content = serde_json::to_string(&stored)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, content).await.map_err(|e| {
            EmbeddingError::Store(format!("{}: {e}", temp_path.display()))
        })?;
        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| EmbeddingError::Store(format!("{}: {e}", self.path.display())))?;

        debug!("Saved {} vectors to disk", stored.len());
        Ok(())
    }
}

#[async_trait]
impl VectorStore for JsonFileStore {
    async fn lookup(&self, key: &str) -> Result<Option<Embedding>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn store(&self, key: &str, embedding: &Embedding) -> Result<()> {
        // Hold the write lock across the save so concurrent writers cannot
        // interleave their snapshots.
        let mut entries = self.entries.write().await;
        let mut next = entries.clone();
        next.insert(key.to_string(), embedding.clone());
        // Memory only changes once the file holds the new entry.
        self.save(&next).await?;
        *entries = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryVectorStore::new();
        assert_eq!(store.lookup("king").await.unwrap(), None);

        store.store("king", &vec![1.0, 2.0]).await.unwrap();
        assert_eq!(store.lookup("king").await.unwrap(), Some(vec![1.0, 2.0]));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_json_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/vectors.json");

        let store = JsonFileStore::open(&path).await.unwrap();
        store.store("king", &vec![0.5, -0.5]).await.unwrap();
        store.store("queen", &vec![0.25, 0.75]).await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.lookup("queen").await.unwrap(),
            Some(vec![0.25, 0.75])
        );
        assert_eq!(reopened.lookup("man").await.unwrap(), None);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_json_store_rejects_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vectors.json");
        std::fs::write(&path, "not json").unwrap();

        let result = JsonFileStore::open(&path).await;
        assert!(matches!(result, Err(EmbeddingError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_failed_save_leaves_memory_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vectors").join("store.json");
        let store = JsonFileStore::open(&path).await.unwrap();
        // A plain file where the parent directory should be makes every save fail.
        std::fs::write(dir.path().join("vectors"), "not a directory").unwrap();

        assert!(store.store("king", &vec![1.0, 0.0]).await.is_err());
        assert_eq!(store.lookup("king").await.unwrap(), None);
    }
}

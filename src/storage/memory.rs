use super::traits::{Blob, BlobStore, Revision, StorageError, WriteMode};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Entry {
    content: Vec<u8>,
    version: u64,
}

/// In-process store. Revisions are per-path write counters.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths currently stored, sorted.
    pub async fn paths(&self) -> Vec<String> {
        let entries = self.entries.lock().await;
        let mut paths: Vec<String> = entries.keys().cloned().collect();
        paths.sort();
        paths
    }
}

fn revision(version: u64) -> Revision {
    Revision(format!("mem-{}", version))
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<Blob>, StorageError> {
        let entries = self.entries.lock().await;
        Ok(entries.get(path).map(|entry| Blob {
            content: entry.content.clone(),
            revision: revision(entry.version),
        }))
    }

    async fn put(
        &self,
        path: &str,
        content: Vec<u8>,
        mode: WriteMode,
    ) -> Result<Revision, StorageError> {
        let mut entries = self.entries.lock().await;
        let current = entries.get(path).map(|e| revision(e.version));

        let allowed = match (&mode, &current) {
            (WriteMode::Overwrite, _) => true,
            (WriteMode::Create, None) => true,
            (WriteMode::Create, Some(_)) => false,
            (WriteMode::Update(expected), Some(current)) => expected == current,
            (WriteMode::Update(_), None) => false,
        };
        if !allowed {
            return Err(StorageError::Conflict {
                path: path.to_string(),
            });
        }

        let entry = entries.entry(path.to_string()).or_default();
        entry.content = content;
        entry.version += 1;
        Ok(revision(entry.version))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_absent_path_is_none() {
        let store = MemoryStore::new();
        assert!(store.get("/missing.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_content_is_not_absent() {
        let store = MemoryStore::new();
        store.put("/empty.txt", Vec::new(), WriteMode::Overwrite).await.unwrap();

        let blob = store.get("/empty.txt").await.unwrap().expect("blob should exist");
        assert!(blob.content.is_empty());
    }

    #[tokio::test]
    async fn test_create_refuses_existing_path() {
        let store = MemoryStore::new();
        store.put("/a", b"1".to_vec(), WriteMode::Create).await.unwrap();

        let err = store.put("/a", b"2".to_vec(), WriteMode::Create).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_update_requires_matching_revision() {
        let store = MemoryStore::new();
        store.put("/a", b"1".to_vec(), WriteMode::Overwrite).await.unwrap();
        let first = store.get("/a").await.unwrap().unwrap();

        // Another writer gets in first
        store.put("/a", b"2".to_vec(), WriteMode::Update(first.revision.clone())).await.unwrap();

        let err = store
            .put("/a", b"3".to_vec(), WriteMode::Update(first.revision))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.get("/a").await.unwrap().unwrap().content, b"2");
    }
}

use super::traits::{Blob, BlobStore, Revision, StorageError, WriteMode};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Blob store backed by a directory on the local filesystem.
///
/// Store paths such as `/records_and_logs/group_number.txt` are resolved
/// relative to `root`. Revisions are SHA-256 digests of the content.
/// Conditional writes are checked under a process-local lock only.
#[derive(Debug)]
pub struct LocalStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a store path onto the filesystem, refusing anything that would
    /// escape the root.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative.as_os_str().is_empty() {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(StorageError::InvalidPath(path.to_string())),
            }
        }
        Ok(self.root.join(relative))
    }

    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                path: path.to_string(),
                source,
            }),
        }
    }
}

pub fn content_revision(content: &[u8]) -> Revision {
    Revision(format!("{:x}", Sha256::digest(content)))
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn get(&self, path: &str) -> Result<Option<Blob>, StorageError> {
        Ok(self.read(path).await?.map(|content| Blob {
            revision: content_revision(&content),
            content,
        }))
    }

    async fn put(
        &self,
        path: &str,
        content: Vec<u8>,
        mode: WriteMode,
    ) -> Result<Revision, StorageError> {
        let _guard = self.write_lock.lock().await;

        if mode != WriteMode::Overwrite {
            let current = self.read(path).await?.map(|c| content_revision(&c));
            let allowed = match (&mode, &current) {
                (WriteMode::Create, None) => true,
                (WriteMode::Update(expected), Some(current)) => expected == current,
                _ => false,
            };
            if !allowed {
                return Err(StorageError::Conflict {
                    path: path.to_string(),
                });
            }
        }

        let full = self.resolve(path)?;
        let io_err = |source| StorageError::Io {
            path: path.to_string(),
            source,
        };
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        // Write to a sibling temp file first so readers never see a torn blob
        let tmp = full.with_file_name(format!(".tracklog-{}.tmp", Uuid::new_v4()));
        let revision = content_revision(&content);
        tokio::fs::write(&tmp, &content).await.map_err(io_err)?;
        if let Err(e) = tokio::fs::rename(&tmp, &full).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_err(e));
        }

        Ok(revision)
    }

    fn describe(&self) -> String {
        format!("local:{}", self.root.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());

        store
            .put("/records/logs/a.json", b"[]".to_vec(), WriteMode::Overwrite)
            .await
            .unwrap();

        assert!(dir.path().join("records/logs/a.json").exists());
        let blob = store.get("/records/logs/a.json").await.unwrap().unwrap();
        assert_eq!(blob.content, b"[]");
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        assert!(store.get("/nothing/here.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_directory_read_is_an_error_not_absent() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("records")).unwrap();
        let store = LocalStore::new(dir.path());

        let result = store.get("/records").await;
        assert!(matches!(result, Err(StorageError::Io { .. })));
    }

    #[tokio::test]
    async fn test_rejects_parent_traversal() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());

        let result = store.get("/../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidPath(_))));
    }

    #[tokio::test]
    async fn test_stale_revision_conflicts() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());

        store.put("/n.txt", b"1".to_vec(), WriteMode::Create).await.unwrap();
        let seen = store.get("/n.txt").await.unwrap().unwrap();

        std::fs::write(dir.path().join("n.txt"), b"7").unwrap();

        let err = store
            .put("/n.txt", b"2".to_vec(), WriteMode::Update(seen.revision))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(std::fs::read(dir.path().join("n.txt")).unwrap(), b"7");
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        store.put("/a.txt", b"x".to_vec(), WriteMode::Overwrite).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt".to_string()]);
    }
}

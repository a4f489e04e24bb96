use async_trait::async_trait;
use std::fmt;

/// Opaque token identifying one stored version of a blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(pub String);

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Blob {
    pub content: Vec<u8>,
    pub revision: Revision,
}

impl Blob {
    pub fn text(&self) -> Result<&str, StorageError> {
        std::str::from_utf8(&self.content).map_err(|e| StorageError::Encoding(e.to_string()))
    }
}

/// Precondition applied to a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace whatever is there, creating the path if needed.
    Overwrite,
    /// Only succeed if nothing is stored at the path yet.
    Create,
    /// Only succeed if the stored revision still matches.
    Update(Revision),
}

impl WriteMode {
    /// Mode for writing back a blob that was read as `previous`.
    pub fn after(previous: Option<&Blob>) -> Self {
        match previous {
            Some(blob) => WriteMode::Update(blob.revision.clone()),
            None => WriteMode::Create,
        }
    }
}

/// Durable key-value store keyed by path.
///
/// `get` returns `Ok(None)` only when nothing is stored at the path. Any
/// failure to find out is an `Err`, so callers never mistake an outage for
/// empty state.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<Blob>, StorageError>;

    async fn put(&self, path: &str, content: Vec<u8>, mode: WriteMode)
        -> Result<Revision, StorageError>;

    /// Human-readable backend name for log lines.
    fn describe(&self) -> String;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote store returned status {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("write conflict on '{path}': stored revision changed since it was read")]
    Conflict { path: String },

    #[error("invalid path '{0}'")]
    InvalidPath(String),

    #[error("content is not valid utf-8: {0}")]
    Encoding(String),
}

impl StorageError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict { .. })
    }
}

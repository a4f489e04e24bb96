pub mod dropbox;
pub mod local;
pub mod memory;
pub mod traits;

pub use dropbox::DropboxStore;
pub use local::LocalStore;
pub use memory::MemoryStore;
pub use traits::{Blob, BlobStore, Revision, StorageError, WriteMode};

use crate::config::types::StoreConfig;
use std::sync::Arc;

/// Build the configured backend.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn BlobStore>, StorageError> {
    let store: Arc<dyn BlobStore> = match config {
        StoreConfig::Local { root, .. } => Arc::new(LocalStore::new(root.clone())),
        StoreConfig::Dropbox {
            access_token,
            timeout,
            base_url,
            ..
        } => match base_url {
            Some(url) => Arc::new(DropboxStore::with_base_url(
                url.clone(),
                access_token.clone(),
                *timeout,
            )?),
            None => Arc::new(DropboxStore::new(access_token.clone(), *timeout)?),
        },
    };
    tracing::info!(store = %store.describe(), "Opened blob store");
    Ok(store)
}

use super::traits::{Blob, BlobStore, Revision, StorageError, WriteMode};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const DEFAULT_CONTENT_URL: &str = "https://content.dropboxapi.com/2";

#[derive(Debug, Deserialize)]
struct FileMetadata {
    rev: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error_summary: String,
}

/// Blob store backed by the Dropbox content API.
#[derive(Debug)]
pub struct DropboxStore {
    base_url: String,
    access_token: String,
    client: reqwest::Client,
}

impl DropboxStore {
    pub fn new(access_token: String, timeout: Duration) -> Result<Self, StorageError> {
        Self::with_base_url(DEFAULT_CONTENT_URL.to_string(), access_token, timeout)
    }

    /// Point the store at a different content endpoint (used against stub servers).
    pub fn with_base_url(
        base_url: String,
        access_token: String,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
            client,
        })
    }

    fn api_path(path: &str) -> Result<String, StorageError> {
        if path.is_empty() || path.contains("/../") || path.ends_with("/..") {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        if path.starts_with('/') {
            Ok(path.to_string())
        } else {
            Ok(format!("/{}", path))
        }
    }

    async fn error_summary(response: reqwest::Response) -> (u16, String) {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let summary = serde_json::from_str::<ApiErrorBody>(&text)
            .map(|body| body.error_summary)
            .unwrap_or_default();
        if summary.is_empty() {
            (status, text)
        } else {
            (status, summary)
        }
    }
}

fn write_mode_arg(mode: &WriteMode) -> serde_json::Value {
    match mode {
        WriteMode::Overwrite => json!("overwrite"),
        WriteMode::Create => json!("add"),
        WriteMode::Update(rev) => json!({ ".tag": "update", "update": rev.0 }),
    }
}

/// Serialize a `Dropbox-API-Arg` header value. The API only accepts ASCII
/// there, so DEL and everything above it goes out as `\uXXXX` escapes
/// (surrogate pairs outside the BMP).
fn api_arg(value: &serde_json::Value) -> String {
    let text = value.to_string();
    let mut out = String::with_capacity(text.len());
    let mut units = [0u16; 2];
    for c in text.chars() {
        if (c as u32) < 0x7f {
            out.push(c);
        } else {
            for unit in c.encode_utf16(&mut units).iter() {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

#[async_trait]
impl BlobStore for DropboxStore {
    async fn get(&self, path: &str) -> Result<Option<Blob>, StorageError> {
        let api_path = Self::api_path(path)?;
        let arg = api_arg(&json!({ "path": api_path }));

        let response = self
            .client
            .post(format!("{}/files/download", self.base_url))
            .bearer_auth(&self.access_token)
            .header("Dropbox-API-Arg", arg)
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, message) = Self::error_summary(response).await;
            if status == 409 && message.starts_with("path/not_found") {
                return Ok(None);
            }
            return Err(StorageError::Remote { status, message });
        }

        let metadata: FileMetadata = response
            .headers()
            .get("Dropbox-API-Result")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| serde_json::from_str(value).ok())
            .ok_or_else(|| StorageError::Remote {
                status: response.status().as_u16(),
                message: "download response is missing Dropbox-API-Result".to_string(),
            })?;

        let content = response.bytes().await?.to_vec();
        Ok(Some(Blob {
            content,
            revision: Revision(metadata.rev),
        }))
    }

    async fn put(
        &self,
        path: &str,
        content: Vec<u8>,
        mode: WriteMode,
    ) -> Result<Revision, StorageError> {
        let api_path = Self::api_path(path)?;
        let arg = api_arg(&json!({
            "path": api_path,
            "mode": write_mode_arg(&mode),
            "autorename": false,
            "mute": true,
            "strict_conflict": true,
        }));

        let response = self
            .client
            .post(format!("{}/files/upload", self.base_url))
            .bearer_auth(&self.access_token)
            .header("Dropbox-API-Arg", arg)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(content)
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, message) = Self::error_summary(response).await;
            if status == 409 && message.contains("conflict") {
                return Err(StorageError::Conflict {
                    path: path.to_string(),
                });
            }
            return Err(StorageError::Remote { status, message });
        }

        let metadata: FileMetadata = response.json().await?;
        Ok(Revision(metadata.rev))
    }

    fn describe(&self) -> String {
        format!("dropbox:{}", self.base_url)
    }
}

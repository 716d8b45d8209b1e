//! Object storage: multipart uploads and public URLs.
//!
//! DESIGN
//! ======
//! The object store is an external collaborator behind `ObjectStore`.
//! `Uploader` is the adapter the pipeline uses: it runs the multipart
//! upload, filters progress so it never goes backwards, and maps any
//! non-200 completion status to `UploadFailed`. Retries belong to callers.
//!
//! Object keys are `{id}{ext}` or `{folder}/{id}{ext}`, where `ext` is the
//! original filename from its last '.' onward (empty when there is none).

pub mod http;

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::progress::Monotonic;

/// Completion status the store returns for a successful upload.
pub const SUCCESS_STATUS: u16 = 200;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("upload of {path} failed with status {status}")]
    UploadFailed { path: String, status: u16 },

    #[error("storage request failed: {0}")]
    Request(String),

    #[error("storage response parse failed: {0}")]
    Parse(String),

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl crate::frame::ErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UploadFailed { .. } => "E_UPLOAD_FAILED",
            Self::Request(_) => "E_STORAGE_REQUEST",
            Self::Parse(_) => "E_STORAGE_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::UploadFailed { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// OBJECT STORE TRAIT
// =============================================================================

/// Final status of a multipart upload as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadReceipt {
    pub status: u16,
}

/// Remote object store. Enables mocking in tests.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload `payload` to `path` in parts, calling `on_progress` with the
    /// fraction transferred so far.
    ///
    /// A non-success HTTP status is not an error here; it comes back in
    /// the receipt.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the transfer itself could not be made.
    async fn multipart_upload(
        &self,
        path: &str,
        payload: Bytes,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<UploadReceipt, StorageError>;

    /// Publicly resolvable URL for an object key.
    fn public_url(&self, path: &str) -> String;
}

// =============================================================================
// PATHS
// =============================================================================

/// Extension of `file_name` including the leading '.', or "" if none.
#[must_use]
pub fn file_extension(file_name: &str) -> &str {
    file_name.rfind('.').map_or("", |idx| &file_name[idx..])
}

/// Object key for an upload: `{folder}/{id}{ext}` or `{id}{ext}`.
#[must_use]
pub fn object_path(folder: Option<&str>, id: Uuid, file_name: &str) -> String {
    let name = format!("{}{}", id.simple(), file_extension(file_name));
    match folder.map(|f| f.trim_matches('/')).filter(|f| !f.is_empty()) {
        Some(folder) => format!("{folder}/{name}"),
        None => name,
    }
}

// =============================================================================
// ADAPTER
// =============================================================================

/// Upload adapter used by the ingestion pipeline. Cheap to clone.
#[derive(Clone)]
pub struct Uploader {
    store: Arc<dyn ObjectStore>,
}

impl Uploader {
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Upload `payload` to `path` and return its public URL.
    ///
    /// `on_progress` sees a non-decreasing sequence in `[0, 1]`; a final
    /// 1.0 is not guaranteed.
    ///
    /// # Errors
    ///
    /// Returns `UploadFailed` for any completion status other than 200.
    pub async fn upload(
        &self,
        path: &str,
        payload: Bytes,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<String, StorageError> {
        let high_water = Monotonic::new();
        let filtered = |fraction: f64| on_progress(high_water.advance(fraction));

        debug!(path, bytes = payload.len(), "upload started");
        let receipt = self.store.multipart_upload(path, payload, &filtered).await?;
        if receipt.status != SUCCESS_STATUS {
            warn!(path, status = receipt.status, "upload rejected by store");
            return Err(StorageError::UploadFailed { path: path.to_string(), status: receipt.status });
        }

        let url = self.store.public_url(path);
        debug!(path, %url, "upload finished");
        Ok(url)
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

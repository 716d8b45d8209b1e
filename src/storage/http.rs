//! Object store HTTP client.
//!
//! Multipart protocol, three steps against `{endpoint}/uploads`:
//! 1. `POST /uploads` with `{"path"}` returns `{"upload_id"}`.
//! 2. `PUT /uploads/{upload_id}/parts/{n}` with each part's bytes (1-based).
//! 3. `POST /uploads/{upload_id}/complete` with `{"parts"}`.
//!
//! The completion status is returned as the receipt. A non-success status
//! on steps 1 or 2 ends the upload early with that status as the receipt.

use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ObjectStore, StorageError, UploadReceipt};
use crate::config::HttpTimeouts;

// =============================================================================
// CLIENT
// =============================================================================

pub struct HttpObjectStore {
    http: reqwest::Client,
    endpoint: String,
    public_base: String,
    token: Option<String>,
    part_size: usize,
}

impl HttpObjectStore {
    pub fn new(
        endpoint: String,
        public_base: String,
        token: Option<String>,
        part_size: usize,
        timeouts: HttpTimeouts,
    ) -> Result<Self, StorageError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| StorageError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            public_base: public_base.trim_end_matches('/').to_string(),
            token,
            part_size: part_size.max(1),
        })
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn initiate(&self, path: &str) -> Result<Result<String, u16>, StorageError> {
        let response = self
            .authorize(self.http.post(format!("{}/uploads", self.endpoint)))
            .json(&InitiateRequest { path })
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Ok(Err(status.as_u16()));
        }
        let text = response
            .text()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        parse_initiate(&text).map(Ok)
    }

    async fn put_part(&self, upload_id: &str, number: usize, part: Bytes) -> Result<u16, StorageError> {
        let response = self
            .authorize(self.http.put(format!("{}/uploads/{upload_id}/parts/{number}", self.endpoint)))
            .body(part)
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        Ok(response.status().as_u16())
    }

    async fn complete(&self, upload_id: &str, parts: usize) -> Result<u16, StorageError> {
        let response = self
            .authorize(self.http.post(format!("{}/uploads/{upload_id}/complete", self.endpoint)))
            .json(&CompleteRequest { parts })
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        Ok(response.status().as_u16())
    }
}

#[async_trait::async_trait]
impl ObjectStore for HttpObjectStore {
    async fn multipart_upload(
        &self,
        path: &str,
        payload: Bytes,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<UploadReceipt, StorageError> {
        let upload_id = match self.initiate(path).await? {
            Ok(upload_id) => upload_id,
            Err(status) => return Ok(UploadReceipt { status }),
        };

        let parts = split_parts(&payload, self.part_size);
        let total = payload.len();
        let mut sent = 0usize;
        debug!(path, %upload_id, parts = parts.len(), "multipart upload initiated");

        for (idx, part) in parts.iter().enumerate() {
            let len = part.len();
            let status = self.put_part(&upload_id, idx + 1, part.clone()).await?;
            if !(200..300).contains(&status) {
                return Ok(UploadReceipt { status });
            }
            sent += len;
            on_progress(fraction_sent(sent, total));
        }

        let status = self.complete(&upload_id, parts.len()).await?;
        Ok(UploadReceipt { status })
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base, path.trim_start_matches('/'))
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct InitiateRequest<'a> {
    path: &'a str,
}

#[derive(Deserialize)]
struct InitiateResponse {
    upload_id: String,
}

#[derive(Serialize)]
struct CompleteRequest {
    parts: usize,
}

// =============================================================================
// HELPERS
// =============================================================================

fn parse_initiate(json: &str) -> Result<String, StorageError> {
    let parsed: InitiateResponse = serde_json::from_str(json).map_err(|e| StorageError::Parse(e.to_string()))?;
    Ok(parsed.upload_id)
}

/// Split into `part_size` chunks. An empty payload is one empty part.
fn split_parts(payload: &Bytes, part_size: usize) -> Vec<Bytes> {
    if payload.is_empty() {
        return vec![Bytes::new()];
    }
    (0..payload.len())
        .step_by(part_size)
        .map(|start| payload.slice(start..(start + part_size).min(payload.len())))
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn fraction_sent(sent: usize, total: usize) -> f64 {
    if total == 0 { 1.0 } else { sent as f64 / total as f64 }
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;

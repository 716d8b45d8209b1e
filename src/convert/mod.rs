//! Document conversion: slide decks to ordered scene lists.
//!
//! DESIGN
//! ======
//! The conversion service is an external collaborator behind the
//! `Converter` trait. `DocumentConverter` is the adapter the pipeline
//! talks to: it forwards the request, clamps progress into `[0, 1]`, and
//! turns an empty result into an error so callers can always activate the
//! first scene.
//!
//! Static and dynamic conversions share one request shape. The kind is
//! forwarded to the service, which decides how slides are rendered; the
//! pipeline treats both results identically.

pub mod http;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// =============================================================================
// TYPES
// =============================================================================

/// One converted slide. `render_data` is opaque to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub name: String,
    #[serde(rename = "ppt")]
    pub render_data: serde_json::Value,
}

/// Conversion strategy requested from the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionKind {
    /// One raster image per slide.
    Static,
    /// Slides keep animations and embedded media.
    Dynamic,
}

impl ConversionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for ConversionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "static" => Ok(Self::Static),
            "dynamic" => Ok(Self::Dynamic),
            other => Err(format!("unknown conversion kind '{other}' (expected 'static' or 'dynamic')")),
        }
    }
}

/// Everything the service needs to start a conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub url: String,
    pub kind: ConversionKind,
    pub region: String,
}

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// The service accepted the task and later reported failure.
    #[error("conversion failed: {reason}")]
    Failed { reason: String },

    /// The service returned a non-success HTTP status.
    #[error("conversion service error: status {status}")]
    ServiceStatus { status: u16, body: String },

    #[error("conversion request failed: {0}")]
    Request(String),

    #[error("conversion response parse failed: {0}")]
    Parse(String),

    #[error("conversion produced no scenes")]
    NoScenes,

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl crate::frame::ErrorCode for ConvertError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Failed { .. } => "E_CONVERSION_FAILED",
            Self::ServiceStatus { .. } => "E_CONVERSION_STATUS",
            Self::Request(_) => "E_CONVERSION_REQUEST",
            Self::Parse(_) => "E_CONVERSION_PARSE",
            Self::NoScenes => "E_CONVERSION_EMPTY",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::ServiceStatus { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// CONVERTER TRAIT
// =============================================================================

/// Remote conversion service. Enables mocking in tests.
#[async_trait::async_trait]
pub trait Converter: Send + Sync {
    /// Convert the document at `request.url`, reporting completion
    /// fractions through `on_progress`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConvertError`] if the service rejects or fails the task.
    async fn convert(
        &self,
        request: &ConversionRequest,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<Vec<Scene>, ConvertError>;
}

// =============================================================================
// ADAPTER
// =============================================================================

/// Conversion adapter used by the ingestion pipeline.
#[derive(Clone)]
pub struct DocumentConverter {
    inner: Arc<dyn Converter>,
}

impl DocumentConverter {
    #[must_use]
    pub fn new(inner: Arc<dyn Converter>) -> Self {
        Self { inner }
    }

    /// Convert `source_url` and return its scenes in service order.
    ///
    /// Progress fractions are clamped into `[0, 1]`. No retry is attempted.
    ///
    /// # Errors
    ///
    /// Propagates the service error, or `NoScenes` for an empty result.
    pub async fn convert(
        &self,
        source_url: &str,
        kind: ConversionKind,
        region: &str,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<Vec<Scene>, ConvertError> {
        let request = ConversionRequest { url: source_url.to_string(), kind, region: region.to_string() };
        info!(url = source_url, %kind, region, "conversion started");

        let clamped = |fraction: f64| on_progress(fraction.clamp(0.0, 1.0));
        let scenes = match self.inner.convert(&request, &clamped).await {
            Ok(scenes) => scenes,
            Err(e) => {
                warn!(error = %e, url = source_url, "conversion failed");
                return Err(e);
            }
        };

        if scenes.is_empty() {
            return Err(ConvertError::NoScenes);
        }
        info!(url = source_url, scenes = scenes.len(), "conversion finished");
        Ok(scenes)
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

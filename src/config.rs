//! Ingestion configuration parsed from environment variables.

pub const DEFAULT_PART_SIZE: usize = 1024 * 1024;
pub const DEFAULT_DOCUMENT_FOLDER: &str = "documents";
pub const DEFAULT_REGION: &str = "us-sv";
pub const DEFAULT_CONVERTER_POLL_MS: u64 = 1500;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {var}")]
    Missing { var: String },

    #[error("config parse failed: {0}")]
    Parse(String),
}

impl crate::frame::ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Missing { .. } => "E_CONFIG_MISSING",
            Self::Parse(_) => "E_CONFIG_PARSE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub endpoint: String,
    pub public_url: String,
    pub token: Option<String>,
    pub part_size: usize,
    /// Folder that converted source documents are uploaded into.
    pub document_folder: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterConfig {
    pub endpoint: String,
    pub token: Option<String>,
    pub poll_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub storage: StorageConfig,
    /// `None` when `CONVERTER_ENDPOINT` is unset; document conversion is disabled.
    pub converter: Option<ConverterConfig>,
    pub region: String,
    pub timeouts: HttpTimeouts,
}

impl IngestConfig {
    /// Build typed ingestion config from environment variables.
    ///
    /// Required:
    /// - `STORAGE_ENDPOINT`
    ///
    /// Optional:
    /// - `STORAGE_PUBLIC_URL`: defaults to `STORAGE_ENDPOINT`
    /// - `STORAGE_TOKEN`: bearer token for the object store
    /// - `STORAGE_PART_SIZE`: multipart chunk size in bytes, default 1 MiB
    /// - `STORAGE_FOLDER`: document upload folder, default `documents`
    /// - `CONVERTER_ENDPOINT`: conversion service base URL
    /// - `CONVERTER_TOKEN`: conversion service token
    /// - `CONVERTER_POLL_MS`: task poll interval, default 1500
    /// - `INGEST_REGION`: region hint, default `us-sv`
    /// - `INGEST_REQUEST_TIMEOUT_SECS`: default 120
    /// - `INGEST_CONNECT_TIMEOUT_SECS`: default 10
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoint = required("STORAGE_ENDPOINT")?;
        let public_url = optional("STORAGE_PUBLIC_URL").unwrap_or_else(|| endpoint.clone());
        let part_size = env_parse("STORAGE_PART_SIZE", DEFAULT_PART_SIZE);
        if part_size == 0 {
            return Err(ConfigError::Parse("STORAGE_PART_SIZE must be greater than zero".into()));
        }

        let storage = StorageConfig {
            endpoint: trim_url(&endpoint),
            public_url: trim_url(&public_url),
            token: optional("STORAGE_TOKEN"),
            part_size,
            document_folder: optional("STORAGE_FOLDER").unwrap_or_else(|| DEFAULT_DOCUMENT_FOLDER.to_string()),
        };

        let converter = optional("CONVERTER_ENDPOINT").map(|endpoint| ConverterConfig {
            endpoint: trim_url(&endpoint),
            token: optional("CONVERTER_TOKEN"),
            poll_ms: env_parse("CONVERTER_POLL_MS", DEFAULT_CONVERTER_POLL_MS),
        });

        let timeouts = HttpTimeouts {
            request_secs: env_parse("INGEST_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("INGEST_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        Ok(Self {
            storage,
            converter,
            region: optional("INGEST_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            timeouts,
        })
    }
}

fn required(key: &str) -> Result<String, ConfigError> {
    optional(key).ok_or_else(|| ConfigError::Missing { var: key.to_string() })
}

/// Unset and blank values are both treated as absent.
fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn trim_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

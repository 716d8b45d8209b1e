//! Conversion service HTTP client.
//!
//! Creates a conversion task, then polls it until the service reports
//! `Finished` or `Fail`. Thin HTTP wrapper; pure parsing in `parse_*`
//! for testability.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ConversionKind, ConversionRequest, ConvertError, Converter, Scene};
use crate::config::HttpTimeouts;

const TASKS_PATH: &str = "services/conversion/tasks";

// =============================================================================
// CLIENT
// =============================================================================

pub struct HttpConverter {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    poll_interval: Duration,
}

impl HttpConverter {
    pub fn new(
        endpoint: String,
        token: Option<String>,
        poll_interval: Duration,
        timeouts: HttpTimeouts,
    ) -> Result<Self, ConvertError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| ConvertError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, endpoint: endpoint.trim_end_matches('/').to_string(), token, poll_interval })
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.header("token", token),
            None => builder,
        }
    }

    async fn create_task(&self, request: &ConversionRequest) -> Result<String, ConvertError> {
        let body = CreateTaskRequest { resource: &request.url, kind: request.kind, region: &request.region };
        let response = self
            .authorize(self.http.post(format!("{}/{TASKS_PATH}", self.endpoint)))
            .json(&body)
            .send()
            .await
            .map_err(|e| ConvertError::Request(e.to_string()))?;
        let text = read_success(response).await?;
        parse_created(&text)
    }

    async fn poll_task(&self, task_id: &str, kind: ConversionKind) -> Result<TaskState, ConvertError> {
        let response = self
            .authorize(self.http.get(format!("{}/{TASKS_PATH}/{task_id}", self.endpoint)))
            .query(&[("type", kind.as_str())])
            .send()
            .await
            .map_err(|e| ConvertError::Request(e.to_string()))?;
        let text = read_success(response).await?;
        parse_task(&text)
    }
}

async fn read_success(response: reqwest::Response) -> Result<String, ConvertError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ConvertError::Request(e.to_string()))?;
    if !status.is_success() {
        return Err(ConvertError::ServiceStatus { status: status.as_u16(), body: text });
    }
    Ok(text)
}

#[async_trait::async_trait]
impl Converter for HttpConverter {
    async fn convert(
        &self,
        request: &ConversionRequest,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<Vec<Scene>, ConvertError> {
        let task_id = self.create_task(request).await?;
        debug!(%task_id, kind = %request.kind, "conversion task created");

        loop {
            match self.poll_task(&task_id, request.kind).await? {
                TaskState::Pending { fraction } => {
                    on_progress(fraction);
                    tokio::time::sleep(self.poll_interval).await;
                }
                TaskState::Finished { fraction, scenes } => {
                    on_progress(fraction);
                    return Ok(scenes);
                }
                TaskState::Failed { reason } => return Err(ConvertError::Failed { reason }),
            }
        }
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct CreateTaskRequest<'a> {
    resource: &'a str,
    #[serde(rename = "type")]
    kind: ConversionKind,
    region: &'a str,
}

#[derive(Deserialize)]
struct CreateTaskResponse {
    uuid: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskResponse {
    status: String,
    failed_reason: Option<String>,
    progress: Option<TaskProgress>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskProgress {
    converted_percentage: Option<f64>,
    #[serde(default)]
    converted_file_list: Vec<ConvertedFile>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConvertedFile {
    width: f64,
    height: f64,
    conversion_file_url: String,
    preview: Option<String>,
}

/// Snapshot of a polled conversion task.
#[derive(Debug, PartialEq)]
enum TaskState {
    Pending { fraction: f64 },
    Finished { fraction: f64, scenes: Vec<Scene> },
    Failed { reason: String },
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_created(json: &str) -> Result<String, ConvertError> {
    let created: CreateTaskResponse = serde_json::from_str(json).map_err(|e| ConvertError::Parse(e.to_string()))?;
    Ok(created.uuid)
}

fn parse_task(json: &str) -> Result<TaskState, ConvertError> {
    let task: TaskResponse = serde_json::from_str(json).map_err(|e| ConvertError::Parse(e.to_string()))?;
    let fraction = task
        .progress
        .as_ref()
        .and_then(|p| p.converted_percentage)
        .map_or(0.0, |pct| pct / 100.0);

    match task.status.as_str() {
        "Waiting" | "Converting" => Ok(TaskState::Pending { fraction }),
        "Finished" => {
            let files = task.progress.map(|p| p.converted_file_list).unwrap_or_default();
            Ok(TaskState::Finished { fraction, scenes: scenes_from_files(files) })
        }
        "Fail" => Ok(TaskState::Failed { reason: task.failed_reason.unwrap_or_else(|| "unknown".into()) }),
        other => Err(ConvertError::Parse(format!("unknown task status '{other}'"))),
    }
}

/// Scenes are named `1..=n` in the order the service listed the pages.
fn scenes_from_files(files: Vec<ConvertedFile>) -> Vec<Scene> {
    files
        .into_iter()
        .enumerate()
        .map(|(i, file)| {
            let mut render = serde_json::json!({
                "src": file.conversion_file_url,
                "width": file.width,
                "height": file.height,
            });
            if let Some(preview) = file.preview {
                render["previewURL"] = serde_json::Value::String(preview);
            }
            Scene { name: (i + 1).to_string(), render_data: render }
        })
        .collect()
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;

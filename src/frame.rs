//! Frame: the message envelope emitted to the board session.
//!
//! ARCHITECTURE
//! ============
//! Every canvas mutation the pipeline performs leaves the process as a
//! Frame: a request carrying a syscall name ("object:create", "scene:put")
//! and a flat data map. The CLI wraps a whole ingestion run in one root
//! request and answers it with item/done/error frames, so a consumer can
//! correlate every mutation with the run that produced it.
//!
//! Mutations and replies both point at the run through `parent_id`.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Data keys carried by an error frame.
pub const ERROR_CODE_KEY: &str = "code";
pub const ERROR_MESSAGE_KEY: &str = "message";
pub const ERROR_RETRYABLE_KEY: &str = "retryable";

pub type Data = HashMap<String, Value>;

/// Where a frame sits in a run: one request, then items and a done, or a
/// single error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Request,
    Item,
    Done,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    /// Creation time, Unix milliseconds.
    pub ts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_id: Option<Uuid>,
    pub from: Option<String>,
    pub syscall: String,
    pub status: Status,
    pub data: Data,
}

/// Stable error code and retry hint attached to error frames.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

fn unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|elapsed| i64::try_from(elapsed.as_millis()).ok())
        .unwrap_or(0)
}

impl Frame {
    pub fn request(syscall: impl Into<String>, data: Data) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id: None,
            ts: unix_ms(),
            board_id: None,
            from: None,
            syscall: syscall.into(),
            status: Status::Request,
            data,
        }
    }

    /// Result payload for this run.
    #[must_use]
    pub fn item(&self, data: Data) -> Self {
        self.answer(Status::Item, data)
    }

    #[must_use]
    pub fn done(&self) -> Self {
        self.answer(Status::Done, Data::new())
    }

    /// Error answer carrying the code, message, and retry hint of `err`.
    #[must_use]
    pub fn error_from(&self, err: &(impl ErrorCode + ?Sized)) -> Self {
        let data = Data::from([
            (ERROR_CODE_KEY.to_string(), Value::from(err.error_code())),
            (ERROR_MESSAGE_KEY.to_string(), Value::from(err.to_string())),
            (ERROR_RETRYABLE_KEY.to_string(), Value::from(err.retryable())),
        ]);
        self.answer(Status::Error, data)
    }

    /// Answers keep the request's board and syscall and point back at it.
    fn answer(&self, status: Status, data: Data) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id: Some(self.id),
            ts: unix_ms(),
            board_id: self.board_id,
            from: None,
            syscall: self.syscall.clone(),
            status,
            data,
        }
    }

    #[must_use]
    pub fn with_board_id(mut self, board_id: Uuid) -> Self {
        self.board_id = Some(board_id);
        self
    }

    #[must_use]
    pub fn with_parent_id(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    #[must_use]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;

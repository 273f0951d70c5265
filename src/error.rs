// Error taxonomy shared by every operation in the crate. The CLI layer
// pattern-matches on these to decide how to report a failure.

use std::path::PathBuf;

use thiserror::Error;

use crate::attachments::ATTACHMENT_MAX_SIZE;

const MIB: u64 = 1024 * 1024;

pub type Result<T, E = TodoError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum TodoError {
    /// The attachment source path does not name a regular file.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("cannot attach an empty file: {}", .0.display())]
    EmptyFile(PathBuf),

    #[error(
        "file size ({}) exceeds the maximum attachment size of {} MB",
        megabytes(.size),
        ATTACHMENT_MAX_SIZE / MIB
    )]
    AttachmentTooLarge { size: u64 },

    #[error("attachment with index {index} could not be found for task '{task_name}'")]
    AttachmentNotFoundByIndex { index: usize, task_name: String },

    #[error("list '{0}' could not be found")]
    ListNotFound(String),

    #[error("task '{task_name}' could not be found in list '{list_name}'")]
    TaskNotFound { task_name: String, list_name: String },

    /// More than one list or task carries exactly the requested name.
    #[error("{kind} name '{name}' is ambiguous ({count} matches); use an ID instead")]
    AmbiguousName {
        kind: &'static str,
        name: String,
        count: usize,
    },

    /// The server answered with a non-success status.
    #[error("request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },

    /// The server answered successfully but not in a shape we understand.
    #[error("unexpected response from server: {0}")]
    UnexpectedResponse(String),

    #[error("not signed in; run `todo login` first")]
    NotAuthenticated,

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Renders a byte count as megabytes with one decimal, e.g. `30.0 MB`.
pub fn megabytes(bytes: &u64) -> String {
    format!("{:.1} MB", *bytes as f64 / MIB as f64)
}

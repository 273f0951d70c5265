// Library root
// -----------
// This crate exposes the library surface behind the `todo` binary. The
// binary (`main.rs`) only wires configuration, the session and the CLI
// together.
//
// Module responsibilities:
// - `session`: the `Session` seam plus the reqwest-backed `GraphSession`.
// - `auth`: OAuth sign-in, token storage and refresh (`get_oauth_session`).
// - `api`: `TodoClient`, endpoint layout, list and task calls.
// - `resolver`: list/task names to IDs.
// - `attachments`: upload (direct or chunked), list, download, delete.
// - `notes`: show, set and clear a task's note.
// - `update`: daily best-effort update notice.
// - `cli` / `ui`: argument parsing, dispatch and output formatting.
//
// Keeping the network behind `Session` lets every operation be tested with
// `MockSession` instead of a live account.
pub mod api;
pub mod attachments;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
#[cfg(test)]
mod mock_session;
pub mod model;
pub mod notes;
pub mod resolver;
pub mod session;
pub mod ui;
pub mod update;

pub use api::TodoClient;
pub use error::{Result, TodoError};
pub use resolver::{ListRef, TaskRef};
pub use session::{ApiRequest, ApiResponse, GraphSession, Method, Session};

// API client module: `TodoClient` owns a `Session` and the base URL of the
// To Do lists collection. It knows the endpoint layout and the list/task
// calls; name resolution, attachments and notes add further `impl` blocks in
// their own modules.

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::Result;
use crate::model::{Collection, NewTask, Task, TodoList};
use crate::session::{ApiRequest, ApiResponse, Session};

/// Default Microsoft Graph root.
pub const GRAPH_URL: &str = "https://graph.microsoft.com/v1.0";

/// Builds the lists collection URL (`{graph}/me/todo/lists`) for a Graph root.
pub fn lists_base_url(graph_url: &str) -> String {
    format!("{}/me/todo/lists", graph_url.trim_end_matches('/'))
}

pub struct TodoClient<S> {
    session: S,
    base_url: String,
}

impl<S: Session> TodoClient<S> {
    /// `base_url` is the lists collection, e.g.
    /// `https://graph.microsoft.com/v1.0/me/todo/lists`.
    pub fn new(session: S, base_url: &str) -> Self {
        Self {
            session,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -- Endpoints --

    pub fn tasks_url(&self, list_id: &str) -> String {
        format!("{}/{list_id}/tasks", self.base_url)
    }

    pub fn task_url(&self, list_id: &str, task_id: &str) -> String {
        format!("{}/{list_id}/tasks/{task_id}", self.base_url)
    }

    pub fn attachments_url(&self, list_id: &str, task_id: &str) -> String {
        format!("{}/attachments", self.task_url(list_id, task_id))
    }

    pub fn attachment_url(&self, list_id: &str, task_id: &str, attachment_id: &str) -> String {
        format!("{}/{attachment_id}", self.attachments_url(list_id, task_id))
    }

    // -- Transport helpers --

    /// Sends a request and fails with `RequestFailed` on a non-success status.
    pub(crate) fn call(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.session.send(request)?.error_for_status()
    }

    pub(crate) fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.call(ApiRequest::get(url))?.json()
    }

    /// Fetches every page of a collection, preserving server order.
    pub(crate) fn get_collection<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(url.to_string());
        while let Some(page_url) = next {
            let page: Collection<T> = self.get_json(&page_url)?;
            items.extend(page.value);
            next = page.next_link;
            if next.is_some() {
                debug!(fetched = items.len(), "following @odata.nextLink");
            }
        }
        Ok(items)
    }

    // -- Lists & tasks --

    pub fn get_lists(&self) -> Result<Vec<TodoList>> {
        self.get_collection(&self.base_url)
    }

    pub fn get_tasks(&self, list_id: &str) -> Result<Vec<Task>> {
        self.get_collection(&self.tasks_url(list_id))
    }

    pub fn get_task(&self, list_id: &str, task_id: &str) -> Result<Task> {
        self.get_json(&self.task_url(list_id, task_id))
    }

    pub fn create_task(&self, list_id: &str, title: &str) -> Result<Task> {
        let body = NewTask {
            title: title.to_string(),
        };
        let task: Task = self
            .call(ApiRequest::post_json(self.tasks_url(list_id), &body)?)?
            .json()?;
        info!(task_id = %task.id, "created task");
        Ok(task)
    }
}

// Note manager: a task's note is its plain-text `body`.

use tracing::info;

use crate::api::TodoClient;
use crate::error::Result;
use crate::model::{ItemBody, Task, TaskUpdate};
use crate::resolver::{ListRef, TaskRef};
use crate::session::{ApiRequest, Session};

impl<S: Session> TodoClient<S> {
    /// Replaces the note and returns the updated task.
    pub fn set_note(&self, list: &ListRef, task: &TaskRef, content: &str) -> Result<Task> {
        let (list, task) = self.resolve(list, task)?;
        let update = TaskUpdate {
            body: ItemBody::text(content),
        };
        let request = ApiRequest::patch_json(self.task_url(&list.id, &task.id), &update)?;
        let response = self.call(request)?;
        info!(task_id = %task.id, chars = content.len(), "note updated");
        // Graph echoes the task; keep the resolved one if the body is empty.
        Ok(response.json().unwrap_or(task))
    }

    pub fn clear_note(&self, list: &ListRef, task: &TaskRef) -> Result<Task> {
        self.set_note(list, task, "")
    }

    /// Returns the task together with its note (empty when unset).
    pub fn show_note(&self, list: &ListRef, task: &TaskRef) -> Result<Task> {
        let (list, task) = self.resolve(list, task)?;
        match task.body {
            // A task addressed by id was already fetched whole.
            Some(_) => Ok(task),
            None => self.get_task(&list.id, &task.id),
        }
    }
}

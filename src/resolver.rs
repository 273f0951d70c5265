// Name resolution: turns the list/task references a user typed into the
// service's identifiers. Nothing is cached; every call queries live.

use tracing::debug;

use crate::api::TodoClient;
use crate::error::{Result, TodoError};
use crate::model::{Task, TodoList};
use crate::session::Session;

/// Name of the default list when the service does not flag one.
pub const DEFAULT_LIST_NAME: &str = "Tasks";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListRef {
    /// The list flagged as the user's default.
    Default,
    Name(String),
    Id(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRef {
    Name(String),
    Id(String),
}

impl ListRef {
    pub fn from_name(name: Option<String>) -> Self {
        name.map(ListRef::Name).unwrap_or(ListRef::Default)
    }
}

/// Exactly one exact match, or the matching error.
fn single_match<'a, T>(
    items: &'a [T],
    name: &str,
    kind: &'static str,
    label: impl Fn(&T) -> &str,
) -> Result<Option<&'a T>> {
    let mut matches = items.iter().filter(|item| label(*item) == name);
    let first = matches.next();
    let rest = matches.count();
    if rest > 0 {
        return Err(TodoError::AmbiguousName {
            kind,
            name: name.to_string(),
            count: rest + 1,
        });
    }
    Ok(first)
}

impl<S: Session> TodoClient<S> {
    pub fn resolve_list(&self, list: &ListRef) -> Result<TodoList> {
        match list {
            ListRef::Id(id) => Ok(TodoList {
                id: id.clone(),
                display_name: id.clone(),
                wellknown_list_name: None,
            }),
            ListRef::Name(name) => {
                let lists = self.get_lists()?;
                single_match(&lists, name, "list", |l| l.display_name.as_str())?
                    .cloned()
                    .ok_or_else(|| TodoError::ListNotFound(name.clone()))
            }
            ListRef::Default => {
                let lists = self.get_lists()?;
                if let Some(list) = lists.iter().find(|l| l.is_default()) {
                    return Ok(list.clone());
                }
                single_match(&lists, DEFAULT_LIST_NAME, "list", |l| l.display_name.as_str())?
                    .cloned()
                    .ok_or_else(|| TodoError::ListNotFound(DEFAULT_LIST_NAME.to_string()))
            }
        }
    }

    pub fn resolve_task(&self, list: &TodoList, task: &TaskRef) -> Result<Task> {
        match task {
            TaskRef::Id(id) => self.get_task(&list.id, id),
            TaskRef::Name(name) => {
                let tasks = self.get_tasks(&list.id)?;
                single_match(&tasks, name, "task", |t| t.title.as_str())?
                    .cloned()
                    .ok_or_else(|| TodoError::TaskNotFound {
                        task_name: name.clone(),
                        list_name: list.display_name.clone(),
                    })
            }
        }
    }

    /// Resolves both references, list first.
    pub fn resolve(&self, list: &ListRef, task: &TaskRef) -> Result<(TodoList, Task)> {
        let list = self.resolve_list(list)?;
        let task = self.resolve_task(&list, task)?;
        debug!(list_id = %list.id, task_id = %task.id, "resolved task");
        Ok((list, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_session::MockSession;
    use crate::session::Method;
    use serde_json::json;

    const BASE: &str = "https://graph.test/lists";

    fn client_with_lists(lists: serde_json::Value) -> (MockSession, TodoClient<MockSession>) {
        let mock = MockSession::new();
        mock.respond_json(Method::Get, BASE, 200, json!({ "value": lists }));
        (mock.clone(), TodoClient::new(mock, BASE))
    }

    #[test]
    fn resolves_list_by_exact_name() {
        let (_, client) = client_with_lists(json!([
            {"id": "l1", "displayName": "Tasks"},
            {"id": "l2", "displayName": "Shopping"},
            {"id": "l3", "displayName": "shopping"}
        ]));
        let list = client.resolve_list(&ListRef::Name("Shopping".into())).unwrap();
        assert_eq!(list.id, "l2");
    }

    #[test]
    fn missing_list_is_list_not_found() {
        let (_, client) = client_with_lists(json!([{"id": "l1", "displayName": "Tasks"}]));
        match client.resolve_list(&ListRef::Name("Work".into())) {
            Err(TodoError::ListNotFound(name)) => assert_eq!(name, "Work"),
            other => panic!("expected ListNotFound, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_list_names_are_ambiguous() {
        let (_, client) = client_with_lists(json!([
            {"id": "l1", "displayName": "Work"},
            {"id": "l2", "displayName": "Work"}
        ]));
        assert!(matches!(
            client.resolve_list(&ListRef::Name("Work".into())),
            Err(TodoError::AmbiguousName { kind: "list", count: 2, .. })
        ));
    }

    #[test]
    fn default_list_prefers_wellknown_marker() {
        let (_, client) = client_with_lists(json!([
            {"id": "l1", "displayName": "Tasks"},
            {"id": "l2", "displayName": "Aufgaben", "wellknownListName": "defaultList"}
        ]));
        assert_eq!(client.resolve_list(&ListRef::Default).unwrap().id, "l2");
    }

    #[test]
    fn default_list_falls_back_to_tasks_name() {
        let (_, client) = client_with_lists(json!([
            {"id": "l1", "displayName": "Shopping"},
            {"id": "l2", "displayName": "Tasks"}
        ]));
        assert_eq!(client.resolve_list(&ListRef::Default).unwrap().id, "l2");
    }

    #[test]
    fn default_list_missing_is_list_not_found() {
        let (_, client) = client_with_lists(json!([
            {"id": "l1", "displayName": "Shopping"},
            {"id": "l2", "displayName": "tasks"}
        ]));
        match client.resolve_list(&ListRef::Default) {
            Err(TodoError::ListNotFound(name)) => assert_eq!(name, DEFAULT_LIST_NAME),
            other => panic!("expected ListNotFound, got {other:?}"),
        }
    }

    #[test]
    fn list_id_needs_no_lookup() {
        let (mock, client) = client_with_lists(json!([]));
        let list = client.resolve_list(&ListRef::Id("list-id".into())).unwrap();
        assert_eq!(list.id, "list-id");
        assert_eq!(mock.total(), 0);
    }

    #[test]
    fn resolves_task_within_list() {
        let (mock, client) = client_with_lists(json!([{"id": "l1", "displayName": "Shopping"}]));
        mock.respond_json(
            Method::Get,
            format!("{BASE}/l1/tasks"),
            200,
            json!({"value": [
                {"id": "t1", "title": "Buy milk"},
                {"id": "t2", "title": "Buy groceries"}
            ]}),
        );
        let (list, task) = client
            .resolve(&ListRef::Name("Shopping".into()), &TaskRef::Name("Buy groceries".into()))
            .unwrap();
        assert_eq!(list.id, "l1");
        assert_eq!(task.id, "t2");
    }

    #[test]
    fn missing_task_names_task_and_list() {
        let (mock, client) = client_with_lists(json!([{"id": "l1", "displayName": "Shopping"}]));
        mock.respond_json(Method::Get, format!("{BASE}/l1/tasks"), 200, json!({"value": []}));
        match client.resolve(&ListRef::Name("Shopping".into()), &TaskRef::Name("Eggs".into())) {
            Err(TodoError::TaskNotFound { task_name, list_name }) => {
                assert_eq!(task_name, "Eggs");
                assert_eq!(list_name, "Shopping");
            }
            other => panic!("expected TaskNotFound, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_task_titles_are_ambiguous() {
        let (mock, client) = client_with_lists(json!([{"id": "l1", "displayName": "Shopping"}]));
        mock.respond_json(
            Method::Get,
            format!("{BASE}/l1/tasks"),
            200,
            json!({"value": [
                {"id": "t1", "title": "Buy milk"},
                {"id": "t2", "title": "Buy milk"},
                {"id": "t3", "title": "Buy milk"}
            ]}),
        );
        match client.resolve(&ListRef::Name("Shopping".into()), &TaskRef::Name("Buy milk".into())) {
            Err(TodoError::AmbiguousName { kind, name, count }) => {
                assert_eq!(kind, "task");
                assert_eq!(name, "Buy milk");
                assert_eq!(count, 3);
            }
            other => panic!("expected AmbiguousName, got {other:?}"),
        }
    }

    #[test]
    fn task_id_is_fetched_directly() {
        let mock = MockSession::new();
        mock.respond_json(
            Method::Get,
            format!("{BASE}/lid/tasks/tid"),
            200,
            json!({"id": "tid", "title": "My Task"}),
        );
        let client = TodoClient::new(mock.clone(), BASE);
        let (_, task) = client
            .resolve(&ListRef::Id("lid".into()), &TaskRef::Id("tid".into()))
            .unwrap();
        assert_eq!(task.title, "My Task");
        assert_eq!(mock.total(), 1);
    }
}

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use crate::error::Result;
use crate::session::{ApiRequest, ApiResponse, Method, Session};

struct Route {
    method: Method,
    url: String,
    responses: VecDeque<ApiResponse>,
}

/// A recording `Session` for tests.
///
/// Responses are registered per method and exact URL. When several
/// responses are queued for one route they are served in order and the last
/// one repeats. Unrouted requests get a Graph-style 404. Every request is
/// recorded for assertions; clones share the same state.
///
/// # Example
///
/// ```ignore
/// let mock = MockSession::new();
/// mock.respond_json(Method::Get, "https://graph.test/lists", 200, json!({"value": []}));
/// let client = TodoClient::new(mock.clone(), "https://graph.test/lists");
/// client.get_lists()?;
/// assert_eq!(mock.count(Method::Get), 1);
/// ```
#[derive(Clone, Default)]
pub struct MockSession {
    routes: Arc<Mutex<Vec<Route>>>,
    requests: Arc<Mutex<Vec<ApiRequest>>>,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, method: Method, url: impl Into<String>, response: ApiResponse) {
        let url = url.into();
        let mut routes = self.routes.lock().unwrap();
        match routes.iter_mut().find(|r| r.method == method && r.url == url) {
            Some(route) => route.responses.push_back(response),
            None => routes.push(Route {
                method,
                url,
                responses: VecDeque::from([response]),
            }),
        }
    }

    pub fn respond_json(&self, method: Method, url: impl Into<String>, status: u16, body: Value) {
        self.respond(method, url, ApiResponse::with_json(status, &body));
    }

    /// Returns all requests sent so far, in order.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_with(&self, method: Method) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }

    pub fn count(&self, method: Method) -> usize {
        self.requests_with(method).len()
    }

    pub fn total(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Session for MockSession {
    fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let mut routes = self.routes.lock().unwrap();
        let response = match routes
            .iter_mut()
            .find(|r| r.method == request.method && r.url == request.url)
        {
            Some(route) if route.responses.len() > 1 => route.responses.pop_front().unwrap(),
            Some(route) => route.responses.front().cloned().unwrap_or_default(),
            None => ApiResponse::with_json(
                404,
                &json!({"error": {"code": "NotFound", "message": format!("no route for {}", request.url)}}),
            ),
        };
        self.requests.lock().unwrap().push(request);
        Ok(response)
    }
}

// Session module: the single seam between the To Do operations and the
// network. Operations build an `ApiRequest`, hand it to a `Session`, and get
// back an `ApiResponse`. `GraphSession` does this over a blocking reqwest
// client with the bearer token applied; tests swap in `MockSession`.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_RANGE, CONTENT_TYPE, LOCATION};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{Result, TodoError};
use crate::model::GraphErrorEnvelope;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    /// One slice of a resumable upload.
    Chunk { data: Vec<u8>, content_range: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub body: RequestBody,
    /// Upload session URLs are pre-authorized and reject a bearer token.
    pub authenticated: bool,
}

impl ApiRequest {
    fn new(method: Method, url: impl Into<String>, body: RequestBody) -> Self {
        Self {
            method,
            url: url.into(),
            body,
            authenticated: true,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url, RequestBody::Empty)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url, RequestBody::Empty)
    }

    pub fn post_json<B: Serialize>(url: impl Into<String>, body: &B) -> Result<Self> {
        Ok(Self::new(
            Method::Post,
            url,
            RequestBody::Json(serde_json::to_value(body)?),
        ))
    }

    pub fn patch_json<B: Serialize>(url: impl Into<String>, body: &B) -> Result<Self> {
        Ok(Self::new(
            Method::Patch,
            url,
            RequestBody::Json(serde_json::to_value(body)?),
        ))
    }

    pub fn put_chunk(url: impl Into<String>, data: Vec<u8>, content_range: String) -> Self {
        let mut request = Self::new(Method::Put, url, RequestBody::Chunk { data, content_range });
        request.authenticated = false;
        request
    }

    pub fn json_body(&self) -> Option<&serde_json::Value> {
        match &self.body {
            RequestBody::Json(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub location: Option<String>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn with_json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            location: None,
            body: body.to_string().into_bytes(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Passes success responses through and turns everything else into
    /// `RequestFailed`, preferring Graph's own error message.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let message = match serde_json::from_slice::<GraphErrorEnvelope>(&self.body) {
            Ok(envelope) if !envelope.error.message.is_empty() => {
                format!("{} ({})", envelope.error.message, envelope.error.code)
            }
            _ => String::from_utf8_lossy(&self.body).trim().to_string(),
        };
        Err(TodoError::RequestFailed {
            status: self.status,
            message,
        })
    }
}

/// Anything able to carry an `ApiRequest` to the service.
pub trait Session {
    fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}

impl<S: Session + ?Sized> Session for &S {
    fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        (**self).send(request)
    }
}

/// Blocking HTTP session carrying an OAuth bearer token.
pub struct GraphSession {
    client: Client,
    token: String,
}

impl GraphSession {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            token: token.into(),
        })
    }
}

impl Session for GraphSession {
    fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        debug!(method = ?request.method, url = %request.url, "sending request");
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Patch => self.client.patch(&request.url),
            Method::Put => self.client.put(&request.url),
            Method::Delete => self.client.delete(&request.url),
        };
        if request.authenticated {
            builder = builder.bearer_auth(&self.token);
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Chunk {
                data,
                content_range,
            } => builder
                .header(CONTENT_RANGE, content_range)
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(data),
        };

        let res = builder.send()?;
        let status = res.status().as_u16();
        let location = res
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = res.bytes()?.to_vec();
        debug!(status, bytes = body.len(), "received response");
        Ok(ApiResponse {
            status,
            location,
            body,
        })
    }
}

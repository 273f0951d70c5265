// Typed request and response records for the To Do endpoints. Wire names
// follow Graph's camelCase; everything else stays snake_case in Rust.

use serde::{Deserialize, Serialize};

/// OData type tag for file attachments on a To Do task.
pub const FILE_ATTACHMENT_ODATA_TYPE: &str = "#microsoft.graph.taskFileAttachment";

/// `wellknownListName` of the list To Do treats as the default.
pub const DEFAULT_LIST_MARKER: &str = "defaultList";

/// Paged collection envelope returned by every listing endpoint.
#[derive(Deserialize, Debug)]
pub struct Collection<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TodoList {
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wellknown_list_name: Option<String>,
}

impl TodoList {
    pub fn is_default(&self) -> bool {
        self.wellknown_list_name.as_deref() == Some(DEFAULT_LIST_MARKER)
    }
}

/// Rich-text body attached to a task; we only ever write plain text.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemBody {
    #[serde(default)]
    pub content: String,
    #[serde(default = "ItemBody::text_content_type")]
    pub content_type: String,
}

impl ItemBody {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            content_type: Self::text_content_type(),
        }
    }

    fn text_content_type() -> String {
        "text".into()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_attachments: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<ItemBody>,
}

impl Task {
    /// Note text of the task, empty when the task carries no body.
    pub fn note(&self) -> &str {
        self.body.as_ref().map(|b| b.content.as_str()).unwrap_or("")
    }
}

/// Attachment metadata as listed on a task. `content_bytes` is only
/// populated when a single attachment is fetched.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_date_time: Option<String>,
    #[serde(default, skip_serializing)]
    pub content_bytes: Option<String>,
}

/// Body of a direct (inline, base64) attachment upload.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NewFileAttachment {
    #[serde(rename = "@odata.type")]
    pub odata_type: &'static str,
    pub name: String,
    pub content_bytes: String,
    pub size: u64,
}

impl NewFileAttachment {
    pub fn new(name: impl Into<String>, content_bytes: String, size: u64) -> Self {
        Self {
            odata_type: FILE_ATTACHMENT_ODATA_TYPE,
            name: name.into(),
            content_bytes,
            size,
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UploadSessionRequest {
    pub attachment_info: AttachmentInfo,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentInfo {
    pub attachment_type: &'static str,
    pub name: String,
    pub size: u64,
}

impl UploadSessionRequest {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            attachment_info: AttachmentInfo {
                attachment_type: "file",
                name: name.into(),
                size,
            },
        }
    }
}

/// Upload session handed out by `createUploadSession`, and the shape of
/// every intermediate response while chunks are still expected.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    #[serde(default)]
    pub upload_url: String,
    #[serde(default)]
    pub expiration_date_time: Option<String>,
    #[serde(default)]
    pub next_expected_ranges: Vec<String>,
}

#[derive(Serialize, Debug)]
pub struct NewTask {
    pub title: String,
}

#[derive(Serialize, Debug)]
pub struct TaskUpdate {
    pub body: ItemBody,
}

/// Graph error envelope: `{"error": {"code": "...", "message": "..."}}`.
#[derive(Deserialize, Debug)]
pub struct GraphErrorEnvelope {
    pub error: GraphError,
}

#[derive(Deserialize, Debug)]
pub struct GraphError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

// Attachment manager: list, upload, download and delete file attachments on
// a task.
//
// Uploads go through three stages: the size check on the local file, then
// either a direct upload (whole file base64-encoded into one POST) or a
// chunked upload (upload session plus ranged PUTs), and finally the created
// attachment. A failed request at any stage ends the operation; nothing is
// retried.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{debug, info, warn};

use crate::api::TodoClient;
use crate::error::{Result, TodoError};
use crate::model::{Attachment, NewFileAttachment, Task, UploadSession, UploadSessionRequest};
use crate::resolver::{ListRef, TaskRef};
use crate::session::{ApiRequest, ApiResponse, Session};

/// Files up to this size are uploaded inline in a single request.
pub const ATTACHMENT_DIRECT_UPLOAD_LIMIT: u64 = 3 * 1024 * 1024;

/// Largest attachment the service accepts.
pub const ATTACHMENT_MAX_SIZE: u64 = 25 * 1024 * 1024;

/// Bytes per PUT in a chunked upload; the service wants multiples of 320 KiB.
pub const UPLOAD_CHUNK_SIZE: u64 = 10 * 320 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStrategy {
    Direct,
    Chunked,
}

impl UploadStrategy {
    pub fn for_size(size: u64) -> Self {
        if size <= ATTACHMENT_DIRECT_UPLOAD_LIMIT {
            UploadStrategy::Direct
        } else {
            UploadStrategy::Chunked
        }
    }
}

/// A local file that passed the attachment preconditions.
#[derive(Debug, Clone)]
pub struct AttachmentSource {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
}

impl AttachmentSource {
    /// Checks the file exists, is non-empty and fits the size ceiling. Only
    /// metadata is read here.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = match fs::metadata(path) {
            Ok(m) if m.is_file() => m,
            _ => return Err(TodoError::FileNotFound(path.to_path_buf())),
        };
        let size = metadata.len();
        if size == 0 {
            return Err(TodoError::EmptyFile(path.to_path_buf()));
        }
        if size > ATTACHMENT_MAX_SIZE {
            return Err(TodoError::AttachmentTooLarge { size });
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| TodoError::FileNotFound(path.to_path_buf()))?;
        Ok(Self {
            path: path.to_path_buf(),
            name,
            size,
        })
    }

    pub fn strategy(&self) -> UploadStrategy {
        UploadStrategy::for_size(self.size)
    }

    fn read(&self) -> Result<Vec<u8>> {
        Ok(fs::read(&self.path)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedAttachment {
    pub attachment_id: String,
    pub file_name: String,
    pub task_id: String,
    pub task_title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedAttachments {
    pub task_id: String,
    pub task_title: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedAttachment {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Picks the attachment at `index` or fails with `AttachmentNotFoundByIndex`.
fn select_by_index(attachments: Vec<Attachment>, index: usize, task: &Task) -> Result<Attachment> {
    attachments
        .into_iter()
        .nth(index)
        .ok_or_else(|| TodoError::AttachmentNotFoundByIndex {
            index,
            task_name: task.title.clone(),
        })
}

/// First offset of a `nextExpectedRanges` entry such as `"3276800-"`.
fn range_start(range: &str) -> Option<u64> {
    range.split('-').next()?.trim().parse().ok()
}

/// Extracts the attachment id from an upload session's final response.
/// The `Location` header ends in `/attachments/{id}` or `/attachments('{id}')`.
fn created_attachment_id(response: &ApiResponse) -> Result<String> {
    if let Some(location) = &response.location {
        let tail = location
            .trim_end_matches('/')
            .rsplit_once("attachments")
            .map(|(_, tail)| tail)
            .unwrap_or_default();
        let id = tail
            .trim_start_matches('/')
            .trim_start_matches("('")
            .trim_end_matches("')");
        if !id.is_empty() {
            return Ok(id.to_string());
        }
    }
    #[derive(serde::Deserialize)]
    struct Created {
        id: String,
    }
    response
        .json::<Created>()
        .map(|c| c.id)
        .map_err(|_| TodoError::UnexpectedResponse("upload finished without an attachment id".into()))
}

/// Only the final path component of a server-provided name is used.
fn local_file_name(name: &str, index: usize) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("attachment-{index}"))
}

/// Returns `name`, or `stem (n).ext` when an earlier file in the same batch
/// already took it. Comparison ignores case.
fn unique_file_name(name: String, taken: &mut HashSet<String>) -> String {
    let path = Path::new(&name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.clone());
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());
    let mut candidate = name.clone();
    let mut n = 1;
    while !taken.insert(candidate.to_lowercase()) {
        candidate = match &extension {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        n += 1;
    }
    candidate
}

impl<S: Session> TodoClient<S> {
    /// Lists a task's attachments in server order.
    pub fn get_attachments(&self, list: &ListRef, task: &TaskRef) -> Result<Vec<Attachment>> {
        let (list, task) = self.resolve(list, task)?;
        self.list_attachments(&list.id, &task.id)
    }

    pub fn list_attachments(&self, list_id: &str, task_id: &str) -> Result<Vec<Attachment>> {
        self.get_collection(&self.attachments_url(list_id, task_id))
    }

    /// Fetches one attachment including its `contentBytes`.
    pub fn get_attachment(&self, list_id: &str, task_id: &str, attachment_id: &str) -> Result<Attachment> {
        self.get_json(&self.attachment_url(list_id, task_id, attachment_id))
    }

    pub fn create_attachment(
        &self,
        file_path: impl AsRef<Path>,
        list: &ListRef,
        task: &TaskRef,
    ) -> Result<CreatedAttachment> {
        self.create_attachment_with_progress(file_path, list, task, &mut |_, _| {})
    }

    /// Like `create_attachment`, reporting `(bytes_sent, total)` as the
    /// upload advances.
    pub fn create_attachment_with_progress(
        &self,
        file_path: impl AsRef<Path>,
        list: &ListRef,
        task: &TaskRef,
        progress: &mut dyn FnMut(u64, u64),
    ) -> Result<CreatedAttachment> {
        // File checks run before any request.
        let source = AttachmentSource::open(file_path)?;
        let (list, task) = self.resolve(list, task)?;
        self.upload(&source, &list.id, &task, progress)
    }

    /// Uploads an already validated file to a resolved task.
    pub fn upload(
        &self,
        source: &AttachmentSource,
        list_id: &str,
        task: &Task,
        progress: &mut dyn FnMut(u64, u64),
    ) -> Result<CreatedAttachment> {
        let data = source.read()?;
        let strategy = source.strategy();
        debug!(file = %source.name, size = source.size, ?strategy, "uploading attachment");
        let attachment_id = match strategy {
            UploadStrategy::Direct => self.upload_direct(list_id, &task.id, &source.name, &data)?,
            UploadStrategy::Chunked => {
                self.upload_chunked(list_id, &task.id, &source.name, &data, progress)?
            }
        };
        progress(data.len() as u64, data.len() as u64);
        info!(%attachment_id, task_id = %task.id, "attachment created");
        Ok(CreatedAttachment {
            attachment_id,
            file_name: source.name.clone(),
            task_id: task.id.clone(),
            task_title: task.title.clone(),
        })
    }

    fn upload_direct(&self, list_id: &str, task_id: &str, name: &str, data: &[u8]) -> Result<String> {
        let payload = NewFileAttachment::new(name, STANDARD.encode(data), data.len() as u64);
        let request = ApiRequest::post_json(self.attachments_url(list_id, task_id), &payload)?;
        let created: Attachment = self.call(request)?.json()?;
        Ok(created.id)
    }

    fn upload_chunked(
        &self,
        list_id: &str,
        task_id: &str,
        name: &str,
        data: &[u8],
        progress: &mut dyn FnMut(u64, u64),
    ) -> Result<String> {
        let total = data.len() as u64;
        let url = format!("{}/createUploadSession", self.attachments_url(list_id, task_id));
        let request = ApiRequest::post_json(url, &UploadSessionRequest::file(name, total))?;
        let session: UploadSession = self.call(request)?.json()?;
        if session.upload_url.is_empty() {
            return Err(TodoError::UnexpectedResponse("upload session without uploadUrl".into()));
        }
        debug!(expires = ?session.expiration_date_time, "upload session created");

        let mut offset = 0u64;
        loop {
            let end = (offset + UPLOAD_CHUNK_SIZE).min(total);
            let content_range = format!("bytes {}-{}/{}", offset, end - 1, total);
            let chunk = data[offset as usize..end as usize].to_vec();
            debug!(%content_range, "uploading chunk");
            let response = self.call(ApiRequest::put_chunk(&session.upload_url, chunk, content_range))?;
            progress(end, total);
            if end >= total {
                return created_attachment_id(&response);
            }

            let next = response
                .json::<UploadSession>()
                .ok()
                .and_then(|s| s.next_expected_ranges.first().and_then(|r| range_start(r)))
                .unwrap_or(end);
            if next <= offset || next >= total {
                return Err(TodoError::UnexpectedResponse(format!(
                    "server expects bytes from {next} after sending {offset}-{}",
                    end - 1
                )));
            }
            if next != end {
                warn!(expected = next, sent_until = end, "server requested a different range");
            }
            offset = next;
        }
    }

    /// Deletes every attachment (no index) or the one at `index`.
    pub fn delete_attachment(
        &self,
        list: &ListRef,
        task: &TaskRef,
        attachment_index: Option<usize>,
    ) -> Result<DeletedAttachments> {
        let (list, task) = self.resolve(list, task)?;
        let attachments = self.list_attachments(&list.id, &task.id)?;
        let targets = match attachment_index {
            Some(index) => vec![select_by_index(attachments, index, &task)?],
            None => attachments,
        };

        let mut count = 0;
        for attachment in &targets {
            let url = self.attachment_url(&list.id, &task.id, &attachment.id);
            self.call(ApiRequest::delete(url))?;
            info!(attachment_id = %attachment.id, name = %attachment.name, "attachment deleted");
            count += 1;
        }
        Ok(DeletedAttachments {
            task_id: task.id,
            task_title: task.title,
            count,
        })
    }

    /// Downloads the attachment at `index`, or all of them, into `output_dir`.
    pub fn download_attachment(
        &self,
        list: &ListRef,
        task: &TaskRef,
        attachment_index: Option<usize>,
        output_dir: impl AsRef<Path>,
    ) -> Result<Vec<DownloadedAttachment>> {
        let output_dir = output_dir.as_ref();
        let (list, task) = self.resolve(list, task)?;
        let attachments = self.list_attachments(&list.id, &task.id)?;
        let targets: Vec<(usize, Attachment)> = match attachment_index {
            Some(index) => vec![(index, select_by_index(attachments, index, &task)?)],
            None => attachments.into_iter().enumerate().collect(),
        };

        if !targets.is_empty() {
            fs::create_dir_all(output_dir)?;
        }
        let mut downloaded = Vec::with_capacity(targets.len());
        let mut taken = HashSet::new();
        for (index, attachment) in targets {
            let bytes = self.attachment_content(&list.id, &task.id, &attachment.id)?;
            let base = local_file_name(&attachment.name, index);
            let name = unique_file_name(base.clone(), &mut taken);
            if name != base {
                warn!(attachment_id = %attachment.id, saved_as = %name, "duplicate attachment name");
            }
            let path = output_dir.join(&name);
            fs::write(&path, &bytes)?;
            info!(path = %path.display(), bytes = bytes.len(), "attachment downloaded");
            downloaded.push(DownloadedAttachment {
                name,
                path,
                size: bytes.len() as u64,
            });
        }
        Ok(downloaded)
    }

    /// Decoded content of one attachment, via `contentBytes` or the raw
    /// `$value` endpoint when the former is absent.
    fn attachment_content(&self, list_id: &str, task_id: &str, attachment_id: &str) -> Result<Vec<u8>> {
        let attachment = self.get_attachment(list_id, task_id, attachment_id)?;
        match attachment.content_bytes {
            Some(encoded) => STANDARD
                .decode(encoded.as_bytes())
                .map_err(|e| TodoError::UnexpectedResponse(format!("invalid contentBytes: {e}"))),
            None => {
                let url = format!("{}/$value", self.attachment_url(list_id, task_id, attachment_id));
                Ok(self.call(ApiRequest::get(url))?.body)
            }
        }
    }
}

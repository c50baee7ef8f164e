use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const OCTET_STREAM: &str = "application/octet-stream";

/// File extensions the server accepts as run attachments.
///
/// Not enforced by the upload pipeline itself; callers that want to reject
/// files up front can use [`is_allowed_extension`].
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "bmp", "csv", "gif", "htm", "html", "jpeg", "jpg", "json", "log", "md", "mp4", "pdf",
    "png", "svg", "txt", "webp", "xls", "xlsx", "xml", "yaml", "yml", "zip",
];

pub fn is_allowed_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Infer a MIME type from the file extension, falling back to
/// `application/octet-stream`.
pub fn content_type_for_path(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(OCTET_STREAM)
        .to_string()
}

/// A local file to be attached to a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    pub path: PathBuf,
    /// Byte size, resolved by the validator. `None` when the file could not
    /// be stat'ed; the read in the store phase reports the real error.
    pub size: Option<u64>,
}

impl FileAttachment {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            size: None,
        }
    }

    /// Base name sent to the initialize endpoint.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }

    pub fn content_type(&self) -> String {
        content_type_for_path(&self.path)
    }
}

/// An attachment whose bytes are already in memory, e.g. one embedded in an
/// OpenHTF report.
#[derive(Clone, PartialEq, Eq)]
pub struct InlineAttachment {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl fmt::Debug for InlineAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineAttachment")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("len", &self.data.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    File(FileAttachment),
    Inline(InlineAttachment),
}

impl Attachment {
    /// Name sent to the initialize endpoint.
    pub fn name(&self) -> String {
        match self {
            Attachment::File(file) => file.file_name(),
            Attachment::Inline(inline) => inline.name.clone(),
        }
    }

    /// Human-readable label for log lines: the full path for files.
    pub fn label(&self) -> String {
        match self {
            Attachment::File(file) => file.path.display().to_string(),
            Attachment::Inline(inline) => inline.name.clone(),
        }
    }

    pub fn content_type(&self) -> String {
        match self {
            Attachment::File(file) => file.content_type(),
            Attachment::Inline(inline) => inline.content_type.clone(),
        }
    }

    /// Known size in bytes, if it has been resolved.
    pub fn size(&self) -> Option<u64> {
        match self {
            Attachment::File(file) => file.size,
            Attachment::Inline(inline) => Some(inline.data.len() as u64),
        }
    }
}

impl From<FileAttachment> for Attachment {
    fn from(file: FileAttachment) -> Self {
        Attachment::File(file)
    }
}

impl From<InlineAttachment> for Attachment {
    fn from(inline: InlineAttachment) -> Self {
        Attachment::Inline(inline)
    }
}

/// Opaque identifier of a created run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body of `POST /uploads/initialize`.
#[derive(Debug, Clone, Serialize)]
pub struct InitializeUpload {
    pub name: String,
}

/// Result of initializing an upload: where to PUT the bytes and the id the
/// server tracks them under.
///
/// Deliberately not `Clone`: the store phase takes it by value, so one handle
/// carries exactly one file.
#[derive(Debug, PartialEq, Eq, Deserialize)]
pub struct UploadHandle {
    pub id: String,
    #[serde(rename = "uploadUrl")]
    pub upload_url: String,
}

/// Body of `POST /uploads/sync`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkRecord<'a> {
    pub upload_id: &'a str,
    pub run_id: &'a str,
}

/// An attachment that made it through all three phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedAttachment {
    pub name: String,
    pub upload_id: String,
}

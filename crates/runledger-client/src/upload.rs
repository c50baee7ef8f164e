//! Three-phase upload of a single attachment.
//!
//! 1. `POST /uploads/initialize` with the base name → upload id + URL
//! 2. `PUT` the bytes to that URL (200 only)
//! 3. `POST /uploads/sync` with `{upload_id, run_id}` (200 only)
//!
//! A failure in phase 3 leaves the bytes stored but unlinked. Nothing here
//! retries; that is left to the caller.

use std::fs::File;

use reqwest::blocking::Body;
use reqwest::StatusCode;
use runledger_core::attachment::{InitializeUpload, LinkRecord};
use runledger_core::{Attachment, LinkedAttachment, RunId, UploadHandle};

use crate::error::UploadError;
use crate::http::HttpClient;

const INITIALIZE_PATH: &str = "/uploads/initialize";
const SYNC_PATH: &str = "/uploads/sync";

pub struct UploadSession<'a> {
    http: &'a HttpClient,
}

impl<'a> UploadSession<'a> {
    pub fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }

    /// Phase 1: reserve an upload slot for `name`.
    pub fn initialize(&self, name: &str) -> Result<UploadHandle, UploadError> {
        let body = InitializeUpload {
            name: name.to_string(),
        };
        self.http
            .post_json::<_, UploadHandle>(INITIALIZE_PATH, &body)
            .map(|envelope| envelope.data)
            .map_err(|e| UploadError::Initialize {
                name: name.to_string(),
                source: Box::new(e),
            })
    }

    /// Phase 2: PUT the attachment body to the handle's URL. Consumes the
    /// handle and returns the upload id the bytes are stored under.
    ///
    /// A file is opened here and closed when the request finishes, whatever
    /// the outcome.
    pub fn store(
        &self,
        handle: UploadHandle,
        attachment: &Attachment,
    ) -> Result<String, UploadError> {
        let name = attachment.name();
        let body = match attachment {
            Attachment::File(file) => {
                let f = File::open(&file.path).map_err(|source| UploadError::Read {
                    name: name.clone(),
                    source,
                })?;
                Body::from(f)
            }
            Attachment::Inline(inline) => Body::from(inline.data.clone()),
        };

        let resp = self
            .http
            .put_raw(&handle.upload_url, body, &attachment.content_type())
            .map_err(|e| UploadError::Transfer {
                name: name.clone(),
                source: Box::new(e),
            })?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().unwrap_or_default();
            return Err(UploadError::Store {
                name,
                status: status.as_u16(),
                body,
            });
        }
        Ok(handle.id)
    }

    /// Phase 3: attach a stored upload to a run.
    pub fn link(&self, name: &str, upload_id: &str, run_id: &RunId) -> Result<(), UploadError> {
        let record = LinkRecord {
            upload_id,
            run_id: run_id.as_str(),
        };
        self.http
            .post_expect_ok(SYNC_PATH, &record)
            .map_err(|e| UploadError::Notify {
                name: name.to_string(),
                upload_id: upload_id.to_string(),
                source: Box::new(e),
            })
    }

    /// Phases 1 and 2 only. Used for files that are consumed by another
    /// endpoint (report import) rather than linked to a run.
    pub fn upload(&self, attachment: &Attachment) -> Result<String, UploadError> {
        let handle = self.initialize(&attachment.name())?;
        self.store(handle, attachment)
    }

    pub fn upload_and_link(
        &self,
        attachment: &Attachment,
        run_id: &RunId,
    ) -> Result<LinkedAttachment, UploadError> {
        let name = attachment.name();
        let upload_id = self.upload(attachment)?;
        self.link(&name, &upload_id, run_id)?;
        Ok(LinkedAttachment { name, upload_id })
    }
}

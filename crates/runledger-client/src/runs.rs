use std::path::PathBuf;

use runledger_core::{
    validate_files, Attachment, AttachmentLimits, CreateRun, CreatedRun, Diagnostics, RunId,
};

use crate::batch::{AttachmentBatchUploader, BatchOutcome};
use crate::error::ClientError;
use crate::http::HttpClient;
use crate::upload::UploadSession;

pub(crate) const RUNS_PATH: &str = "/runs";

/// Result of creating a run (or importing a report that created one).
#[derive(Debug)]
pub struct RunCreated {
    pub id: RunId,
    pub url: Option<String>,
    pub message: Option<String>,
    pub warnings: Vec<String>,
    /// How the attachment batch went, if there was one. A failed batch does
    /// not make the run creation a failure.
    pub attachments: Option<BatchOutcome>,
}

impl RunCreated {
    pub(crate) fn new(
        created: CreatedRun,
        message: Option<String>,
        warnings: Option<Vec<String>>,
    ) -> Self {
        Self {
            id: created.id,
            url: created.url,
            message,
            warnings: warnings.unwrap_or_default(),
            attachments: None,
        }
    }
}

/// Creates a run and then uploads its attachments.
pub struct RunSubmitter<'a> {
    http: &'a HttpClient,
    diagnostics: &'a dyn Diagnostics,
    limits: AttachmentLimits,
}

impl<'a> RunSubmitter<'a> {
    pub fn new(
        http: &'a HttpClient,
        diagnostics: &'a dyn Diagnostics,
        limits: AttachmentLimits,
    ) -> Self {
        Self {
            http,
            diagnostics,
            limits,
        }
    }

    /// Validate attachments, create the run, then upload and link the
    /// attachments to it.
    ///
    /// Attachment limits are checked before any request: on violation no run
    /// is created. If creation fails no upload is attempted. Once the run
    /// exists, this returns `Ok` whatever happens to the attachments.
    pub fn create_run(
        &self,
        run: &CreateRun,
        attachments: &[PathBuf],
    ) -> Result<RunCreated, ClientError> {
        let files = validate_files(attachments, &self.limits).map_err(|e| {
            self.diagnostics.error(&format!("Run not created: {e}"));
            ClientError::from(e)
        })?;

        self.diagnostics.info(&format!(
            "Creating run for unit {}...",
            run.unit_under_test.serial_number
        ));
        let envelope = self
            .http
            .post_json::<_, CreatedRun>(RUNS_PATH, run)
            .map_err(|e| {
                self.diagnostics.error(&format!("Run creation failed: {e}"));
                e
            })?;

        let mut created = RunCreated::new(envelope.data, envelope.message, envelope.warnings);
        match &created.url {
            Some(url) => self.diagnostics.success(&format!("Run created: {url}")),
            None => self.diagnostics.success(&format!("Run created: {}", created.id)),
        }

        if !files.is_empty() {
            let uploader = AttachmentBatchUploader::new(
                UploadSession::new(self.http),
                self.diagnostics,
                self.limits,
            );
            let outcome =
                uploader.upload_all(&created.id, files.into_iter().map(Attachment::File));
            created.attachments = Some(outcome);
        }
        Ok(created)
    }
}

use std::path::Path;

use runledger_core::openhtf::OpenHtfReport;
use runledger_core::run::{ImportReport, Importer};
use runledger_core::{validate_files, Attachment, AttachmentLimits, CreatedRun, Diagnostics};

use crate::batch::AttachmentBatchUploader;
use crate::error::ClientError;
use crate::http::HttpClient;
use crate::runs::RunCreated;
use crate::upload::UploadSession;

const IMPORT_PATH: &str = "/import";
pub const CLIENT_NAME: &str = "rust";

/// Creates a run from an OpenHTF JSON report.
///
/// The report file is uploaded (without linking), imported server-side, and
/// the attachments embedded in its phases are then streamed through the
/// batch uploader onto the new run.
pub struct ReportImporter<'a> {
    http: &'a HttpClient,
    diagnostics: &'a dyn Diagnostics,
    limits: AttachmentLimits,
}

impl<'a> ReportImporter<'a> {
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

    pub fn import_openhtf(&self, report_path: &Path) -> Result<RunCreated, ClientError> {
        // the report is not a run attachment, only its size is capped
        let report_limits = AttachmentLimits {
            max_count: 1,
            ..self.limits
        };
        let report_file = validate_files(&[report_path.to_path_buf()], &report_limits)
            .map_err(|e| {
                self.diagnostics.error(&format!("Report not imported: {e}"));
                ClientError::from(e)
            })?
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::Config("no report file given".into()))?;

        let session = UploadSession::new(self.http);
        self.diagnostics
            .info(&format!("Uploading report {}...", report_path.display()));
        let upload_id = session
            .upload(&Attachment::File(report_file))
            .map_err(|e| {
                self.diagnostics.error(&format!("Report upload failed: {e}"));
                ClientError::from(e)
            })?;

        let body = ImportReport {
            upload_id: &upload_id,
            importer: Importer::Openhtf,
            client: CLIENT_NAME,
            client_version: env!("CARGO_PKG_VERSION"),
        };
        let envelope = self
            .http
            .post_json::<_, CreatedRun>(IMPORT_PATH, &body)
            .map_err(|e| {
                self.diagnostics.error(&format!("Report import failed: {e}"));
                e
            })?;
        let mut created = RunCreated::new(envelope.data, envelope.message, envelope.warnings);
        self.diagnostics
            .success(&format!("Run {} imported from report", created.id));

        let report = match OpenHtfReport::from_path(report_path) {
            Ok(report) => report,
            Err(e) => {
                self.diagnostics.warn(&format!(
                    "Run {} imported, but its attachments could not be read: {e}",
                    created.id
                ));
                return Ok(created);
            }
        };
        if report.attachment_count() == 0 {
            return Ok(created);
        }

        let diagnostics = self.diagnostics;
        let attachments = report
            .into_attachments()
            .filter_map(move |item| match item {
                Ok(inline) => Some(Attachment::Inline(inline)),
                Err(e) => {
                    diagnostics.warn(&format!("Skipping attachment: {e}"));
                    None
                }
            });
        let uploader = AttachmentBatchUploader::new(session, self.diagnostics, self.limits);
        created.attachments = Some(uploader.upload_all(&created.id, attachments));
        Ok(created)
    }
}

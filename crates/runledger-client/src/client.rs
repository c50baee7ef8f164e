use std::path::{Path, PathBuf};
use std::sync::Arc;

use runledger_core::envelope::Empty;
use runledger_core::run::RunList;
use runledger_core::unit::UpdateUnit;
use runledger_core::{
    validate_files, Attachment, CreateRun, Diagnostics, Run, RunId, SubUnit, TracingDiagnostics,
};

use crate::batch::{AttachmentBatchUploader, BatchOutcome};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::http::{segment_path, HttpClient};
use crate::import::ReportImporter;
use crate::runs::{RunCreated, RunSubmitter, RUNS_PATH};
use crate::upload::UploadSession;

const UNITS_PATH: &str = "/units";

/// Blocking client for the test-management API.
pub struct Client {
    http: HttpClient,
    config: ClientConfig,
    diagnostics: Arc<dyn Diagnostics>,
}

impl Client {
    /// Client that reports through `tracing`.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        Self::with_diagnostics(config, Arc::new(TracingDiagnostics))
    }

    pub fn with_diagnostics(
        config: ClientConfig,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Result<Self, ClientError> {
        let http = HttpClient::new(&config, diagnostics.clone())?;
        Ok(Self {
            http,
            config,
            diagnostics,
        })
    }

    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn submitter(&self) -> RunSubmitter<'_> {
        RunSubmitter::new(&self.http, self.diagnostics.as_ref(), self.config.limits())
    }

    // -- Runs --

    /// Create a run and attach `attachments` to it. See [`RunSubmitter::create_run`].
    pub fn create_run(
        &self,
        run: &CreateRun,
        attachments: &[PathBuf],
    ) -> Result<RunCreated, ClientError> {
        self.submitter().create_run(run, attachments)
    }

    /// Attach files to an existing run.
    pub fn upload_attachments(
        &self,
        run_id: &RunId,
        paths: &[PathBuf],
    ) -> Result<BatchOutcome, ClientError> {
        let files = validate_files(paths, &self.config.limits()).map_err(|e| {
            self.diagnostics.error(&format!("No attachments uploaded: {e}"));
            ClientError::from(e)
        })?;
        let uploader = AttachmentBatchUploader::new(
            UploadSession::new(&self.http),
            self.diagnostics.as_ref(),
            self.config.limits(),
        );
        Ok(uploader.upload_all(run_id, files.into_iter().map(Attachment::File)))
    }

    pub fn import_openhtf_report(&self, report_path: &Path) -> Result<RunCreated, ClientError> {
        ReportImporter::new(&self.http, self.diagnostics.as_ref(), self.config.limits())
            .import_openhtf(report_path)
    }

    pub fn get_run(&self, id: &RunId) -> Result<Run, ClientError> {
        segment_path(RUNS_PATH, id.as_str())
            .and_then(|path| self.http.get_json::<Run>(&path, &[]))
            .map(|envelope| envelope.data)
            .map_err(|e| self.log_failure(&format!("Could not fetch run {id}"), e))
    }

    pub fn list_runs(&self, serial_number: &str) -> Result<Vec<Run>, ClientError> {
        self.http
            .get_json::<RunList>(RUNS_PATH, &[("serial_number", serial_number)])
            .map(|envelope| envelope.data.runs)
            .map_err(|e| self.log_failure(&format!("Could not list runs for {serial_number}"), e))
    }

    pub fn delete_runs(&self, ids: &[RunId]) -> Result<(), ClientError> {
        let query: Vec<(&str, &str)> = ids.iter().map(|id| ("ids", id.as_str())).collect();
        self.http
            .delete_json::<_, Empty>(RUNS_PATH, &query)
            .map(|_| {
                self.diagnostics.success(&format!("Deleted {} run(s)", ids.len()));
            })
            .map_err(|e| self.log_failure("Could not delete runs", e))
    }

    // -- Units --

    /// Replace the sub-units of a unit.
    pub fn update_unit(
        &self,
        serial_number: &str,
        sub_units: Vec<SubUnit>,
    ) -> Result<(), ClientError> {
        let body = UpdateUnit { sub_units };
        segment_path(UNITS_PATH, serial_number)
            .and_then(|path| self.http.patch_json::<_, Empty>(&path, &body))
            .map(|_| {
                self.diagnostics.success(&format!("Unit {serial_number} updated"));
            })
            .map_err(|e| self.log_failure(&format!("Could not update unit {serial_number}"), e))
    }

    pub fn delete_units(&self, serial_numbers: &[String]) -> Result<(), ClientError> {
        let query: Vec<(&str, &str)> = serial_numbers
            .iter()
            .map(|sn| ("serial_numbers", sn.as_str()))
            .collect();
        self.http
            .delete_json::<_, Empty>(UNITS_PATH, &query)
            .map(|_| {
                self.diagnostics
                    .success(&format!("Deleted {} unit(s)", serial_numbers.len()));
            })
            .map_err(|e| self.log_failure("Could not delete units", e))
    }

    fn log_failure(&self, context: &str, err: ClientError) -> ClientError {
        self.diagnostics.error(&format!("{context}: {err}"));
        err
    }
}

use runledger_core::{Attachment, AttachmentLimits, Diagnostics, LinkedAttachment, RunId};

use crate::error::UploadError;
use crate::upload::UploadSession;

/// What happened to the attachments of one run.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Attachments linked to the run, in upload order.
    pub linked: Vec<LinkedAttachment>,
    /// The failure that stopped the batch. Later attachments were not tried.
    pub failure: Option<UploadError>,
    /// Attachments skipped for exceeding the size limit.
    pub skipped: Vec<String>,
    /// The attachment cap was reached with attachments left over.
    pub truncated: bool,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && self.skipped.is_empty() && !self.truncated
    }
}

/// Uploads and links the attachments of one run, in order, stopping at the
/// first failure.
///
/// Works the same for a pre-validated list of files and for attachments
/// discovered lazily from a report: the cap is enforced on a running count,
/// and items whose known size exceeds the limit are skipped.
pub struct AttachmentBatchUploader<'a> {
    session: UploadSession<'a>,
    diagnostics: &'a dyn Diagnostics,
    limits: AttachmentLimits,
}

impl<'a> AttachmentBatchUploader<'a> {
    pub fn new(
        session: UploadSession<'a>,
        diagnostics: &'a dyn Diagnostics,
        limits: AttachmentLimits,
    ) -> Self {
        Self {
            session,
            diagnostics,
            limits,
        }
    }

    pub fn upload_all<I>(&self, run_id: &RunId, attachments: I) -> BatchOutcome
    where
        I: IntoIterator<Item = Attachment>,
    {
        let mut outcome = BatchOutcome::default();
        let mut attempted = 0usize;
        let mut pending = attachments.into_iter();

        loop {
            if attempted >= self.limits.max_count {
                if let Some(extra) = pending.next() {
                    self.diagnostics.warn(&format!(
                        "Attachment limit of {} reached for run {run_id}; {} and any later attachments were not uploaded",
                        self.limits.max_count,
                        extra.label()
                    ));
                    outcome.truncated = true;
                }
                break;
            }
            let Some(attachment) = pending.next() else {
                break;
            };
            let label = attachment.label();

            if let Some(size) = attachment.size() {
                if size > self.limits.max_file_size {
                    self.diagnostics.warn(&format!(
                        "Skipping {label}: {size} bytes exceeds the {} byte limit",
                        self.limits.max_file_size
                    ));
                    outcome.skipped.push(label);
                    continue;
                }
            }

            attempted += 1;
            self.diagnostics.info(&format!("Uploading {label}..."));
            match self.session.upload_and_link(&attachment, run_id) {
                Ok(linked) => {
                    self.diagnostics
                        .success(&format!("Uploaded and linked {label} to run {run_id}"));
                    outcome.linked.push(linked);
                }
                Err(e) => {
                    self.diagnostics.error(&describe_failure(&e, &label, run_id));
                    self.diagnostics.error(&format!(
                        "Stopping attachment upload for run {run_id}; remaining attachments were not attempted"
                    ));
                    outcome.failure = Some(e);
                    break;
                }
            }
        }
        outcome
    }
}

fn describe_failure(err: &UploadError, label: &str, run_id: &RunId) -> String {
    match err {
        UploadError::Initialize { source, .. } => {
            format!("Could not initialize upload for {label}: {source}")
        }
        UploadError::Read { source, .. } => format!("Could not read {label}: {source}"),
        UploadError::Store { status, body, .. } => {
            format!("Could not store {label}: upload returned HTTP {status}: {body}")
        }
        UploadError::Transfer { source, .. } => format!("Could not store {label}: {source}"),
        UploadError::Notify {
            upload_id, source, ..
        } => format!(
            "Could not notify server of {label}: stored as upload {upload_id} but not linked to run {run_id}: {source}"
        ),
    }
}

pub mod attachment;
pub mod diagnostics;
pub mod envelope;
pub mod error;
pub mod limits;
pub mod openhtf;
pub mod run;
pub mod unit;
pub mod validate;

pub use attachment::{
    Attachment, FileAttachment, InlineAttachment, LinkedAttachment, RunId, UploadHandle,
};
pub use diagnostics::{Diagnostics, Level, SilentDiagnostics, TracingDiagnostics};
pub use envelope::{Envelope, FailureEnvelope};
pub use error::{LimitExceeded, LimitKind, ReportError};
pub use limits::AttachmentLimits;
pub use run::{CreateRun, CreatedRun, Run, RunAttachment};
pub use unit::{SubUnit, UnitUnderTest};
pub use validate::validate_files;

use runledger_core::{FailureEnvelope, LimitExceeded, ReportError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Limit(#[from] LimitExceeded),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        warnings: Option<Vec<String>>,
    },

    /// No response was received: connection refused, DNS, timeout.
    #[error("network error: {0}")]
    Network(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A success status whose body could not be decoded.
    #[error("json decode (HTTP {status}): {message}")]
    Decode { status: u16, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl ClientError {
    /// HTTP status of the failing response, `None` if none was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } | ClientError::Decode { status, .. } => Some(*status),
            ClientError::Upload(e) => e.status_code(),
            _ => None,
        }
    }

    /// Convert into the `{success: false, ...}` shape.
    pub fn to_failure(&self) -> FailureEnvelope {
        match self {
            ClientError::Http {
                status,
                message,
                warnings,
            } => FailureEnvelope::new(message.clone(), warnings.clone(), Some(*status)),
            other => FailureEnvelope::new(other.to_string(), None, other.status_code()),
        }
    }

    pub(crate) fn network(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Network(format!("request timed out: {err}"))
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Initialize,
    Store,
    Notify,
}

/// One attachment failed somewhere in initialize → store → notify.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("could not initialize upload of {name}: {source}")]
    Initialize {
        name: String,
        #[source]
        source: Box<ClientError>,
    },

    #[error("could not read {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The PUT got a response other than 200. The body is kept as text.
    #[error("could not store {name}: HTTP {status}: {body}")]
    Store { name: String, status: u16, body: String },

    /// The PUT never got a response.
    #[error("could not store {name}: {source}")]
    Transfer {
        name: String,
        #[source]
        source: Box<ClientError>,
    },

    /// Bytes are stored under `upload_id` but not linked to the run.
    #[error("could not notify server of upload {upload_id} for {name}: {source}")]
    Notify {
        name: String,
        upload_id: String,
        #[source]
        source: Box<ClientError>,
    },
}

impl UploadError {
    pub fn phase(&self) -> UploadPhase {
        match self {
            UploadError::Initialize { .. } => UploadPhase::Initialize,
            UploadError::Read { .. } | UploadError::Store { .. } | UploadError::Transfer { .. } => {
                UploadPhase::Store
            }
            UploadError::Notify { .. } => UploadPhase::Notify,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            UploadError::Initialize { name, .. }
            | UploadError::Read { name, .. }
            | UploadError::Store { name, .. }
            | UploadError::Transfer { name, .. }
            | UploadError::Notify { name, .. } => name,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            UploadError::Store { status, .. } => Some(*status),
            UploadError::Initialize { source, .. }
            | UploadError::Transfer { source, .. }
            | UploadError::Notify { source, .. } => source.status_code(),
            UploadError::Read { .. } => None,
        }
    }
}

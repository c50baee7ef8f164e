use std::path::PathBuf;

use thiserror::Error;

/// A precondition on a batch of attachments was violated. Raised before any
/// network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitExceeded {
    #[error("too many attachments: {actual} given, at most {max} allowed")]
    Count { max: usize, actual: usize },

    #[error("attachment {} is {size} bytes, larger than the {max_size} byte limit", .path.display())]
    Size {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },
}

impl LimitExceeded {
    pub fn kind(&self) -> LimitKind {
        match self {
            LimitExceeded::Count { .. } => LimitKind::Count,
            LimitExceeded::Size { .. } => LimitKind::Size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    Count,
    Size,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("read report: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse report: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("attachment {name} in phase {phase}: {reason}")]
    Attachment {
        phase: String,
        name: String,
        reason: String,
    },
}

use std::time::Duration;

pub const DEFAULT_MAX_ATTACHMENTS: usize = 100;
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-run attachment limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentLimits {
    pub max_count: usize,
    pub max_file_size: u64,
}

impl Default for AttachmentLimits {
    fn default() -> Self {
        Self {
            max_count: DEFAULT_MAX_ATTACHMENTS,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

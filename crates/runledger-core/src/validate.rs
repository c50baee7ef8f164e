use std::path::PathBuf;

use crate::attachment::FileAttachment;
use crate::error::LimitExceeded;
use crate::limits::AttachmentLimits;

/// Check attachment count and per-file size before anything touches the
/// network.
///
/// Sizes are resolved from file metadata here. A path that cannot be stat'ed
/// passes with `size: None`; opening it in the store phase reports the I/O
/// error instead.
pub fn validate_files(
    paths: &[PathBuf],
    limits: &AttachmentLimits,
) -> Result<Vec<FileAttachment>, LimitExceeded> {
    if paths.len() > limits.max_count {
        return Err(LimitExceeded::Count {
            max: limits.max_count,
            actual: paths.len(),
        });
    }

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let size = std::fs::metadata(path).ok().map(|m| m.len());
        if let Some(size) = size {
            if size > limits.max_file_size {
                return Err(LimitExceeded::Size {
                    path: path.clone(),
                    size,
                    max_size: limits.max_file_size,
                });
            }
        }
        files.push(FileAttachment {
            path: path.clone(),
            size,
        });
    }
    Ok(files)
}

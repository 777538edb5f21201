//! Error types

use std::path::PathBuf;

use thiserror::Error;

use crate::diff::Side;

/// Errors raised while validating input or configuration.
///
/// Rendering itself never fails with these: problems found mid-render are
/// logged and the affected rows are skipped or repaired.
#[derive(Debug, Error)]
pub enum DiffError {
    #[error("invalid context setting {0}: must be -1 (whole file) or greater")]
    InvalidContext(i32),

    #[error("tab size must be greater than zero")]
    InvalidTabSize,

    #[error("line length must be greater than zero")]
    InvalidLineLength,

    #[error("malformed diff chunk {index}: {reason}")]
    MalformedChunk { index: usize, reason: String },

    #[error("comment thread {thread_id} on {side} line {line} is outside the file")]
    StaleThread {
        thread_id: String,
        side: Side,
        line: u32,
    },

    #[error("comment thread {thread_id} on {side} line {line} is in a skipped range")]
    SkippedThread {
        thread_id: String,
        side: Side,
        line: u32,
    },

    #[error("failed to access config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

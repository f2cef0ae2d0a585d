use std::path::PathBuf;
use thiserror::Error;

/// Failures the pipeline can run into while handling a single source path.
///
/// None of these escape the reconciliation boundary: the pipeline turns each
/// one into an [`Outcome`](crate::Outcome) and keeps going.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{} is not under input root {}", path.display(), root.display())]
    InvalidPath { path: PathBuf, root: PathBuf },

    #[error("transcoding {} failed: {reason}", source_path.display())]
    Transcode { source_path: PathBuf, reason: String },

    #[error("giving up on {} after {attempts} attempts: {reason}", source_path.display())]
    RetriesExhausted {
        source_path: PathBuf,
        attempts: u32,
        reason: String,
    },

    #[error("source disappeared: {}", .0.display())]
    SourceVanished(PathBuf),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

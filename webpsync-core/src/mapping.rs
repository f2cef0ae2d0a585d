use crate::error::{Result, SyncError};
use std::path::{Path, PathBuf};

pub const WEBP_EXTENSION: &str = "webp";

/// Mirror `source` from `input_root` into `output_root`, swapping the final
/// extension for `.webp`.
///
/// Purely lexical; creating the parent directory is left to the caller.
pub fn map_destination(source: &Path, input_root: &Path, output_root: &Path) -> Result<PathBuf> {
    let rel = source
        .strip_prefix(input_root)
        .map_err(|_| SyncError::InvalidPath {
            path: source.to_path_buf(),
            root: input_root.to_path_buf(),
        })?;
    if rel.file_name().is_none() {
        return Err(SyncError::InvalidPath {
            path: source.to_path_buf(),
            root: input_root.to_path_buf(),
        });
    }
    let mut dest = output_root.join(rel);
    dest.set_extension(WEBP_EXTENSION);
    Ok(dest)
}

/// Hidden sibling the engine writes into before the result is renamed into place.
///
/// Keeps the `.webp` extension so the engine still picks the right encoder.
pub fn staging_path(destination: &Path) -> PathBuf {
    let stem = destination
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!(".{stem}.partial.{WEBP_EXTENSION}"))
}

use std::io::ErrorKind;
use std::path::Path;

/// How a destination relates to its source, judged from mtimes alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// No destination yet.
    Missing,
    /// Source modified after the destination was written.
    Stale,
    /// Destination at least as new as the source.
    UpToDate,
    /// Source vanished between discovery and now.
    SourceGone,
}

impl Freshness {
    pub fn needs_conversion(self) -> bool {
        matches!(self, Freshness::Missing | Freshness::Stale)
    }
}

/// Compare the two files' metadata.
///
/// Equal mtimes count as up to date, which keeps coarse-resolution
/// filesystems from converting the same file twice.
pub async fn check(source: &Path, destination: &Path) -> std::io::Result<Freshness> {
    let src_meta = match tokio::fs::metadata(source).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Freshness::SourceGone),
        Err(e) => return Err(e),
    };
    let dest_meta = match tokio::fs::metadata(destination).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Freshness::Missing),
        Err(e) => return Err(e),
    };
    if src_meta.modified()? > dest_meta.modified()? {
        Ok(Freshness::Stale)
    } else {
        Ok(Freshness::UpToDate)
    }
}

pub async fn needs_conversion(source: &Path, destination: &Path) -> std::io::Result<bool> {
    Ok(check(source, destination).await?.needs_conversion())
}

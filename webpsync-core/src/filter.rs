use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;

/// File names the mirror converts.
const SOURCE_PATTERNS: &[&str] = &["*.jpg", "*.jpeg"];

/// File names that are hidden, temporary, or left behind by a transfer
/// that has not finished (or a delete that has not completed).
const TRANSIENT_PATTERNS: &[&str] = &[
    ".*",
    "~*",
    "*.smbdelete*",
    "*.part",
    "*.partial",
    "*.crdownload",
    "*.download",
    "*.tmp",
];

/// Decides from the file name alone whether a path is a JPEG worth mirroring.
#[derive(Debug, Clone)]
pub struct PathClassifier {
    sources: GlobSet,
    transient: GlobSet,
}

impl Default for PathClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl PathClassifier {
    pub fn new() -> Self {
        Self {
            sources: compile(SOURCE_PATTERNS),
            transient: compile(TRANSIENT_PATTERNS),
        }
    }

    /// `true` for a `.jpg`/`.jpeg` (any case) whose name carries no temp marker.
    ///
    /// Never touches the filesystem, so it is fine to call on paths that are
    /// already gone.
    pub fn is_candidate<P: AsRef<Path>>(&self, path: P) -> bool {
        let Some(name) = path.as_ref().file_name() else {
            return false;
        };
        !self.is_transient_name(name) && self.sources.is_match(name)
    }

    /// `true` when the file name marks a hidden or in-flight file.
    pub fn is_transient<P: AsRef<Path>>(&self, path: P) -> bool {
        path.as_ref()
            .file_name()
            .map(|name| self.is_transient_name(name))
            .unwrap_or(false)
    }

    fn is_transient_name(&self, name: &std::ffi::OsStr) -> bool {
        self.transient.is_match(name)
    }
}

// patterns are matched against bare file names, case-insensitively
fn compile(patterns: &[&str]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        if let Ok(g) = GlobBuilder::new(pat).case_insensitive(true).build() {
            builder.add(g);
        }
    }
    builder.build().unwrap_or_else(|_| GlobSet::empty())
}

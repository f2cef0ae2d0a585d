use notify::{
    event::{AccessKind, AccessMode, CreateKind, ModifyKind, RenameMode},
    EventKind,
};
use std::path::{Path, PathBuf};

/// A change notification the pipeline cares about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FsEvent {
    Created(PathBuf),
    Modified(PathBuf),
}

impl FsEvent {
    pub fn path(&self) -> &Path {
        match self {
            FsEvent::Created(p) | FsEvent::Modified(p) => p,
        }
    }

    pub fn into_path(self) -> PathBuf {
        match self {
            FsEvent::Created(p) | FsEvent::Modified(p) => p,
        }
    }
}

/// Convert a notify::Event into zero or more FsEvent.
///
/// A file renamed into place (the usual "write temp, then rename" pattern)
/// counts as created. Removals and folder creation produce nothing: deleted
/// sources leave their mirror alone.
pub fn event_to_ops(event: notify::Event) -> Vec<FsEvent> {
    match event.kind {
        EventKind::Create(CreateKind::File) | EventKind::Create(CreateKind::Any) => {
            event.paths.into_iter().map(FsEvent::Created).collect()
        }
        EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Metadata(_))
        | EventKind::Modify(ModifyKind::Any)
        | EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
            event.paths.into_iter().map(FsEvent::Modified).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.into_iter().map(FsEvent::Created).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            // (from, to): only the new name matters
            event.paths.into_iter().nth(1).map(FsEvent::Created).into_iter().collect()
        }
        _ => Vec::new(),
    }
}

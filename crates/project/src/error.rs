use std::io;
use std::path::{Path, PathBuf};

use projectpages_core::{EditorError, FileMonitorError, NoteError};
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::control::ControlError;
use crate::paths::PathSetError;

/// Errors surfaced by project lifecycle, page and batch operations.
/// 專案生命週期、頁面與批次作業的錯誤。
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("name conflict: {0} already exists")]
    NameConflict(PathBuf),
    #[error("{path} is not a project archive: {reason}")]
    InvalidArchive { path: PathBuf, reason: String },
    #[error("{} tracked page(s) are open in the editor", open.len())]
    EditConflict { open: Vec<PathBuf> },
    #[error("the selected page has no note")]
    NotPaired,
    #[error("a project is already active")]
    AlreadyActive,
    #[error("no project is active")]
    NotActive,
    #[error("notes are locked while a batch export runs")]
    NotesLocked,
    #[error("row {row} is out of range for {len} page(s)")]
    RowOutOfRange { row: usize, len: usize },
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Path(#[from] PathSetError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Control(#[from] ControlError),
    #[error(transparent)]
    Editor(#[from] EditorError),
    #[error(transparent)]
    Note(#[from] NoteError),
    #[error(transparent)]
    Monitor(#[from] FileMonitorError),
}

impl ProjectError {
    /// Builds a `map_err` adapter tagging an I/O error with `path`.
    pub(crate) fn io_at(path: &Path) -> impl FnOnce(io::Error) -> ProjectError + '_ {
        move |source| ProjectError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type ProjectResult<T> = Result<T, ProjectError>;

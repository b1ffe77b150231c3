use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// 宿主編輯器回報的錯誤。 / Errors reported by the host editor.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("editor could not open {path}: {reason}")]
    Open { path: PathBuf, reason: String },
    #[error("editor could not create a document: {0}")]
    Create(String),
    #[error("editor could not save to {path}: {reason}")]
    Save { path: PathBuf, reason: String },
    #[error("editor could not render {path}: {reason}")]
    Render { path: PathBuf, reason: String },
    #[error("unknown document handle {0}")]
    UnknownHandle(DocumentHandle),
}

/// 編輯器內部文件的不透明代號。 / Opaque identifier of a document living inside the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Pixel rectangle requested for thumbnails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn square(size: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width: size,
            height: size,
        }
    }
}

/// 建立新文件時使用的樣板參數。 / Template parameters used when the editor creates a new document.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub colorspace: String,
    pub bitdepth: String,
    pub dpi: u32,
}

/// 扁平化匯出的描述。 / Describes a single flattened render request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlatRender {
    /// Animation frame to render; `None` renders the static image.
    pub frame: Option<u32>,
    /// Longest edge in pixels; `None` keeps the native resolution.
    pub max_edge: Option<u32>,
}

/// 編輯器推播的通知事件。 / Notifications pushed by the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    DocumentSaved(PathBuf),
    DocumentClosed,
    DocumentCreated,
}

/// 專案引擎透過此介面呼叫宿主編輯器。 / Narrow interface through which the engine drives the host editor.
///
/// Implementations are called from a single thread of control. Paths handed to
/// the editor always live inside the active project's working directory, except
/// for export destinations.
pub trait EditorService {
    /// Paths of every document currently open in the editor.
    fn list_open_documents(&self) -> BTreeSet<PathBuf>;

    /// Renders the file at `path` into PNG bytes fitting `rect`.
    fn render_thumbnail(&self, path: &Path, rect: Rect) -> Result<Vec<u8>, EditorError>;

    fn create_document(&mut self, template: &NewDocument) -> Result<DocumentHandle, EditorError>;

    fn open_document(&mut self, path: &Path) -> Result<DocumentHandle, EditorError>;

    fn save_document_as(&mut self, handle: DocumentHandle, path: &Path)
        -> Result<(), EditorError>;

    /// Releases a document opened by the engine for batch work.
    fn close_document(&mut self, handle: DocumentHandle) -> Result<(), EditorError>;

    /// Animation frame range of the document, or `None` for a still image.
    fn animation_frames(&self, handle: DocumentHandle) -> Option<RangeInclusive<u32>>;

    /// Flattens the document into an image file at `destination`.
    fn export_flat(
        &mut self,
        handle: DocumentHandle,
        destination: &Path,
        render: FlatRender,
    ) -> Result<(), EditorError>;
}

/// 回報指定路徑中哪些目前在編輯器中開啟。 / Returns which of `tracked` the editor currently has open.
pub fn open_among<'a, I>(editor: &dyn EditorService, tracked: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = &'a PathBuf>,
{
    let open: BTreeSet<PathBuf> = editor
        .list_open_documents()
        .iter()
        .map(|path| normalize_path(path))
        .collect();
    if open.is_empty() {
        return Vec::new();
    }
    tracked
        .into_iter()
        .filter(|path| open.contains(&normalize_path(path)))
        .cloned()
        .collect()
}

/// 以字面方式移除 `.` 與 `..`，不存取磁碟。 / Lexically drops `.` and folds `..` without touching the disk.
///
/// A leading `..` on a relative path is kept; `..` directly under the root is dropped.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

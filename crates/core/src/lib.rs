//! Host-facing primitives for Project Pages: the editor collaborator seam,
//! note text decoding, directory monitoring and logging bootstrap.
//! Project Pages 的宿主介面：編輯器協作介面、筆記解碼、資料夾監看與日誌。

pub mod editor;
pub mod file_monitor;
pub mod logging;
pub mod note;

pub use editor::{
    normalize_path, open_among, DocumentHandle, EditorError, EditorEvent, EditorService,
    FlatRender, NewDocument, Rect,
};
pub use file_monitor::{FileEvent, FileMonitor, FileMonitorError, FileMonitorEventKind};
pub use logging::{default_log_level, flush_logs, init_logging, logging_status, LoggingError};
pub use note::{decode_note, read_note, write_note, NoteEncoding, NoteError, NoteText};

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use notify::event::{EventKind, ModifyKind, RemoveKind};
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;

/// 監控專案資料夾時可能回傳的錯誤。 / Error type for project directory monitoring.
#[derive(Debug, Error)]
pub enum FileMonitorError {
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
    #[error("monitor channel disconnected")]
    ChannelDisconnected,
}

/// 監控到的事件種類。 / Classifies observed file system changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileMonitorEventKind {
    Modified,
    Removed,
    Created,
    Renamed { from: PathBuf, to: PathBuf },
    Other,
}

/// 檔案事件的詳細資料。 / File event payload with resolved path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub kind: FileMonitorEventKind,
}

impl FileEvent {
    /// 事件是否會改變資料夾的檔案清單。 / Whether the event changes a directory listing.
    pub fn changes_listing(&self) -> bool {
        matches!(
            self.kind,
            FileMonitorEventKind::Created
                | FileMonitorEventKind::Removed
                | FileMonitorEventKind::Renamed { .. }
        )
    }
}

/// 監看專案內的圖片、筆記與垃圾桶資料夾，捕捉宿主編輯器在外部造成的變更。
/// / Watches a project's artifact directories for host-originated changes.
pub struct FileMonitor {
    watcher: RecommendedWatcher,
    rx: Receiver<FileEvent>,
    watched: Vec<PathBuf>,
}

impl FileMonitor {
    /// 建立新的監視器實例。 / Creates a new monitor instance.
    pub fn new() -> Result<Self, FileMonitorError> {
        let (tx, rx) = mpsc::channel();
        let watcher = RecommendedWatcher::new(
            move |res| {
                if let Ok(event) = res {
                    if let Some(mapped) = map_event(event) {
                        let _ = tx.send(mapped);
                    }
                }
            },
            Config::default(),
        )?;

        Ok(Self {
            watcher,
            rx,
            watched: Vec::new(),
        })
    }

    /// 開始監看指定資料夾（不遞迴）。 / Starts watching the provided directory, non-recursively.
    pub fn watch(&mut self, path: impl AsRef<Path>) -> Result<(), FileMonitorError> {
        let path = path.as_ref();
        self.watcher.watch(path, RecursiveMode::NonRecursive)?;
        self.watched.push(path.to_path_buf());
        Ok(())
    }

    /// 停止監看所有資料夾。 / Stops watching every registered directory.
    pub fn unwatch_all(&mut self) {
        for path in self.watched.drain(..) {
            let _ = self.watcher.unwatch(&path);
        }
    }

    /// 目前監看中的資料夾。 / Directories currently being watched.
    pub fn watched(&self) -> &[PathBuf] {
        &self.watched
    }

    /// 取出所有待處理事件（非阻塞）。 / Drains every pending event without blocking.
    pub fn drain(&self) -> Vec<FileEvent> {
        self.rx.try_iter().collect()
    }

    /// 在期限內等待事件，逾時回傳 `None`。 / Waits for an event until the timeout, returning `None` on timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<FileEvent>, FileMonitorError> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(FileMonitorError::ChannelDisconnected),
        }
    }
}

fn map_event(event: notify::Event) -> Option<FileEvent> {
    if event.paths.is_empty() {
        return None;
    }

    let primary = event.paths[0].clone();
    let kind = match event.kind {
        EventKind::Modify(ModifyKind::Name(_)) if event.paths.len() >= 2 => {
            FileMonitorEventKind::Renamed {
                from: primary.clone(),
                to: event.paths[1].clone(),
            }
        }
        // Single-path renames arrive as one half of the move; the listing changed either way.
        EventKind::Modify(ModifyKind::Name(_)) => FileMonitorEventKind::Removed,
        EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Metadata(_))
        | EventKind::Modify(ModifyKind::Any) => FileMonitorEventKind::Modified,
        EventKind::Create(_) => FileMonitorEventKind::Created,
        EventKind::Remove(RemoveKind::File) | EventKind::Remove(RemoveKind::Any) => {
            FileMonitorEventKind::Removed
        }
        _ => FileMonitorEventKind::Other,
    };

    let path = match &kind {
        FileMonitorEventKind::Renamed { to, .. } => to.clone(),
        _ => primary,
    };

    Some(FileEvent { path, kind })
}

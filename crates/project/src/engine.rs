//! Project lifecycle: `Closed -> Active -> Closed`.
//! 專案生命週期管理。
//!
//! The working directory is the live copy; the archive is a snapshot that
//! [`SyncEngine::save`] refreshes. At most one project is active at a time.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use projectpages_core::{EditorEvent, EditorService, FileMonitor, Rect};
use projectpages_settings::RecentProjectsStore;

use crate::archive::{self, Validation};
use crate::control::{ControlDocument, ControlStore};
use crate::error::{ProjectError, ProjectResult};
use crate::index::PageIndex;
use crate::paths::{self, PathSet};
use crate::thumbnail::{blank_thumbnail_png, THUMBNAIL_SIZE};
use crate::trash;
use crate::util::write_atomic;

/// State of the active project.
/// 作用中專案的狀態。
#[derive(Debug)]
pub struct Project {
    pub(crate) paths: PathSet,
    pub(crate) archive_path: PathBuf,
    pub(crate) control: ControlStore,
    pub(crate) index: PageIndex,
}

impl Project {
    pub fn paths(&self) -> &PathSet {
        &self.paths
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn control(&self) -> &ControlDocument {
        self.control.document()
    }

    pub fn index(&self) -> &PageIndex {
        &self.index
    }

    /// Rescans pages and tags any untagged trash entries.
    pub(crate) fn rescan(&mut self) -> ProjectResult<()> {
        trash::tag_untagged_entries(self.paths.trash_dir())?;
        self.index.refresh()
    }
}

/// Outcome of [`SyncEngine::close`]. Deletion failures never fail the close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReport {
    pub archive_path: PathBuf,
    pub working_dir: PathBuf,
    pub deleted: bool,
    pub delete_error: Option<String>,
}

/// Drives project lifecycle transitions against a host editor.
/// 透過宿主編輯器驅動專案生命週期。
pub struct SyncEngine<E: EditorService> {
    pub(crate) editor: E,
    pub(crate) recent: RecentProjectsStore,
    pub(crate) active: Option<Project>,
}

impl<E: EditorService> SyncEngine<E> {
    pub fn new(editor: E, recent: RecentProjectsStore) -> Self {
        Self {
            editor,
            recent,
            active: None,
        }
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut E {
        &mut self.editor
    }

    pub fn recent(&self) -> &RecentProjectsStore {
        &self.recent
    }

    pub fn recent_mut(&mut self) -> &mut RecentProjectsStore {
        &mut self.recent
    }

    pub fn project(&self) -> Option<&Project> {
        self.active.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub(crate) fn active_mut(&mut self) -> ProjectResult<&mut Project> {
        self.active.as_mut().ok_or(ProjectError::NotActive)
    }

    pub(crate) fn active_ref(&self) -> ProjectResult<&Project> {
        self.active.as_ref().ok_or(ProjectError::NotActive)
    }

    /// Creates `<dir>/<name>.project_pages` and its archive, then activates it.
    ///
    /// Fails with `NameConflict` before touching the disk when either path exists.
    /// 建立新專案並設為作用中。
    pub fn new_project(&mut self, dir: &Path, name: &str) -> ProjectResult<&Project> {
        if self.active.is_some() {
            return Err(ProjectError::AlreadyActive);
        }
        let dir = paths::resolve(dir)?;
        let (root, archive_path) = paths::new_project_paths(&dir, name)?;
        for candidate in [&root, &archive_path] {
            if candidate.exists() {
                return Err(ProjectError::NameConflict(candidate.clone()));
            }
        }
        let paths = PathSet::derive(&root)?;

        let control = match create_layout(&paths, &archive_path) {
            Ok(control) => control,
            Err(err) => {
                discard_working_dir(&root);
                return Err(err);
            }
        };

        self.remember(&archive_path);
        let index = PageIndex::rescan(paths.images_dir(), paths.texts_dir())?;
        info!(
            "event=project_new module=project status=ok archive={}",
            archive_path.display()
        );
        Ok(self.active.insert(Project {
            paths,
            archive_path,
            control,
            index,
        }))
    }

    /// Validates and unpacks `archive_path` next to itself, then activates it.
    ///
    /// An invalid archive is dropped from the recent list and nothing is unpacked.
    /// 驗證並解壓縮專案。
    pub fn open(&mut self, archive_path: &Path) -> ProjectResult<&Project> {
        if self.active.is_some() {
            return Err(ProjectError::AlreadyActive);
        }
        let archive_path = paths::resolve(archive_path)?;
        let root = paths::working_dir_for_archive(&archive_path);
        if root.exists() {
            return Err(ProjectError::NameConflict(root));
        }

        if let Validation::Invalid(reason) = archive::validate(&archive_path) {
            warn!(
                "event=project_open module=project status=invalid archive={} reason={}",
                archive_path.display(),
                reason
            );
            if let Err(err) = self.recent.remove(&archive_path) {
                warn!(
                    "event=recent_remove module=project status=failed error={}",
                    err
                );
            }
            return Err(ProjectError::InvalidArchive {
                path: archive_path,
                reason,
            });
        }

        let paths = PathSet::derive(&root)?;
        let loaded = archive::unpack_into(&archive_path, &root)
            .map_err(ProjectError::from)
            .and_then(|_| ControlStore::load(paths.control_file()).map_err(ProjectError::from))
            .and_then(|control| {
                trash::tag_untagged_entries(paths.trash_dir())?;
                let index = PageIndex::rescan(paths.images_dir(), paths.texts_dir())?;
                Ok((control, index))
            });
        let (control, index) = match loaded {
            Ok(loaded) => loaded,
            Err(err) => {
                discard_working_dir(&root);
                return Err(err);
            }
        };

        self.remember(&archive_path);
        info!(
            "event=project_open module=project status=ok archive={} pages={}",
            archive_path.display(),
            index.images().len()
        );
        Ok(self.active.insert(Project {
            paths,
            archive_path,
            control,
            index,
        }))
    }

    /// Writes the control file, refreshes the thumbnail, repacks the archive and rescans.
    ///
    /// Safe to call at any time while active.
    /// 儲存：重新封裝壓縮檔並重新掃描。
    pub fn save(&mut self) -> ProjectResult<()> {
        let project = self.active.as_mut().ok_or(ProjectError::NotActive)?;
        project.control.save()?;

        if let Some(first) = project.index.images().first() {
            match self
                .editor
                .render_thumbnail(first, Rect::square(THUMBNAIL_SIZE))
            {
                Ok(bytes) => {
                    let target = project.paths.thumbnail_file();
                    write_atomic(target, &bytes).map_err(ProjectError::io_at(target))?;
                }
                Err(err) => warn!(
                    "event=thumbnail_render module=project status=failed error={}",
                    err
                ),
            }
        }

        let packed = archive::pack_directory(project.paths.root(), &project.archive_path)?;
        project.rescan()?;
        info!(
            "event=project_save module=project status=ok entries={} skipped={} archive={}",
            packed.entries,
            packed.skipped.len(),
            project.archive_path.display()
        );
        Ok(())
    }

    /// Deactivates the project, optionally deleting the working directory.
    ///
    /// The archive is not repacked; call [`save`](Self::save) first to keep changes.
    /// 關閉專案；刪除工作資料夾失敗不會阻止關閉。
    pub fn close(&mut self, delete_working_dir: bool) -> ProjectResult<CloseReport> {
        let project = self.active.take().ok_or(ProjectError::NotActive)?;
        let working_dir = project.paths.root().to_path_buf();
        let mut report = CloseReport {
            archive_path: project.archive_path,
            working_dir,
            deleted: false,
            delete_error: None,
        };
        if delete_working_dir {
            match fs::remove_dir_all(&report.working_dir) {
                Ok(()) => report.deleted = true,
                Err(err) => {
                    warn!(
                        "event=project_close module=project status=delete_failed path={} error={}",
                        report.working_dir.display(),
                        err
                    );
                    report.delete_error = Some(err.to_string());
                }
            }
        }
        info!(
            "event=project_close module=project status=ok deleted={}",
            report.deleted
        );
        Ok(report)
    }

    /// Best-effort cleanup when the host terminates with a project still active.
    /// 宿主結束時盡力清除工作資料夾。
    pub fn abort_on_host_shutdown(&mut self) {
        if let Some(project) = self.active.take() {
            let root = project.paths.root();
            if let Err(err) = fs::remove_dir_all(root) {
                warn!(
                    "event=host_shutdown module=project status=delete_failed path={} error={}",
                    root.display(),
                    err
                );
            } else {
                info!("event=host_shutdown module=project status=ok");
            }
        }
    }

    /// Reacts to editor notifications; ignored while no project is active.
    /// 處理編輯器通知。
    pub fn handle_event(&mut self, event: EditorEvent) -> ProjectResult<()> {
        let Some(project) = self.active.as_mut() else {
            return Ok(());
        };
        match event {
            EditorEvent::DocumentSaved(path) => {
                if project.paths.contains(&path) {
                    debug!("event=editor_saved module=project status=repack");
                    self.save()?;
                }
            }
            EditorEvent::DocumentCreated | EditorEvent::DocumentClosed => project.rescan()?,
        }
        Ok(())
    }

    /// Registers the active project's artifact directories with `monitor`.
    pub fn watch(&self, monitor: &mut FileMonitor) -> ProjectResult<()> {
        let project = self.active_ref()?;
        for dir in project.paths.artifact_dirs() {
            monitor.watch(dir)?;
        }
        Ok(())
    }

    /// Drains `monitor` and rescans when a change touched the active project.
    /// Returns whether a rescan happened.
    /// 處理外部檔案變更。
    pub fn poll_monitor(&mut self, monitor: &FileMonitor) -> ProjectResult<bool> {
        let events = monitor.drain();
        let Some(project) = self.active.as_mut() else {
            return Ok(false);
        };
        let relevant = events
            .iter()
            .any(|event| event.changes_listing() && project.paths.contains(&event.path));
        if relevant {
            project.rescan()?;
        }
        Ok(relevant)
    }

    /// Selects the page at `row`.
    pub fn select_page(&mut self, row: usize) -> ProjectResult<()> {
        self.active_mut()?.index.set_cursor_by_image_row(row)
    }

    /// Note of the selected page.
    pub fn read_note(&self) -> ProjectResult<String> {
        self.active_ref()?.index.read_note()
    }

    pub fn write_note(&mut self, text: &str) -> ProjectResult<()> {
        self.active_ref()?.index.write_note(text)
    }

    /// Trash listing of the active project, tagging new arrivals first.
    pub fn trash_entries(&self) -> ProjectResult<Vec<PathBuf>> {
        trash::list_trash(self.active_ref()?.paths.trash_dir())
    }

    /// Edits the control document and writes it back immediately.
    /// 修改控制文件並立即寫回。
    pub fn update_control<F>(&mut self, op: F) -> ProjectResult<()>
    where
        F: FnOnce(&mut ControlDocument),
    {
        self.active_mut()?.control.update(op)?;
        Ok(())
    }

    fn remember(&mut self, archive_path: &Path) {
        if let Err(err) = self.recent.add(archive_path) {
            warn!(
                "event=recent_add module=project status=failed path={} error={}",
                self.recent.path().display(),
                err
            );
        }
    }
}

fn create_layout(paths: &PathSet, archive_path: &Path) -> ProjectResult<ControlStore> {
    for dir in [
        paths.root(),
        paths.images_dir(),
        paths.texts_dir(),
        paths.trash_dir(),
    ] {
        fs::create_dir_all(dir).map_err(ProjectError::io_at(dir))?;
    }
    let control = ControlStore::new(paths.control_file(), ControlDocument::default());
    control.save()?;

    let thumbnail = blank_thumbnail_png().map_err(|err| ProjectError::Io {
        path: paths.thumbnail_file().to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::Other, err),
    })?;
    write_atomic(paths.thumbnail_file(), &thumbnail)
        .map_err(ProjectError::io_at(paths.thumbnail_file()))?;

    archive::pack_directory(paths.root(), archive_path)?;
    Ok(control)
}

fn discard_working_dir(root: &Path) {
    if let Err(err) = fs::remove_dir_all(root) {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(
                "event=working_dir_cleanup module=project status=failed path={} error={}",
                root.display(),
                err
            );
        }
    }
}

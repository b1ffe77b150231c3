//! Page operations on the active project.
//! 作用中專案的頁面操作。

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};
use projectpages_core::{DocumentHandle, EditorService};

use crate::engine::SyncEngine;
use crate::error::{ProjectError, ProjectResult};
use crate::index::{base_name, is_image, NATIVE_NOTE_EXTENSION};
use crate::paths::validate_name;
use crate::trash::{self, QuarantineReport};

/// Native document format for pages created or sourced from the editor.
pub const NATIVE_IMAGE_EXTENSION: &str = "kra";

/// Why an import candidate was left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSkip {
    Unsupported,
    ImageExists(PathBuf),
    NoteExists(PathBuf),
    Failed(String),
}

/// Outcome of [`SyncEngine::import_pages`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Destination image paths inside the project.
    pub imported: Vec<PathBuf>,
    pub skipped: Vec<(PathBuf, ImportSkip)>,
}

/// Backup written next to an image by the editor.
/// 編輯器在圖片旁產生的備份檔。
pub fn backup_path(image: &Path) -> PathBuf {
    let mut name = image.as_os_str().to_os_string();
    name.push("~");
    PathBuf::from(name)
}

fn note_path(texts_dir: &Path, base: &str) -> PathBuf {
    texts_dir.join(format!("{base}.{NATIVE_NOTE_EXTENSION}"))
}

/// Creates an empty note, refusing to replace an existing one.
fn create_empty_note(path: &Path) -> io::Result<()> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map(|_| ())
}

impl<E: EditorService> SyncEngine<E> {
    /// Creates the next `<basename>_NNNN` page from the control template.
    /// 依樣板建立下一個頁面。
    pub fn new_page(&mut self) -> ProjectResult<PathBuf> {
        let project = self.active.as_mut().ok_or(ProjectError::NotActive)?;
        let basename = project.control.document().basename.clone();
        let images_dir = project.paths.images_dir().to_path_buf();
        let texts_dir = project.paths.texts_dir().to_path_buf();

        let (name, image, note) = (1..=9999u32)
            .map(|number| format!("{basename}_{number:04}"))
            .map(|name| {
                let image = images_dir.join(format!("{name}.{NATIVE_IMAGE_EXTENSION}"));
                let note = note_path(&texts_dir, &name);
                (name, image, note)
            })
            .find(|(_, image, note)| !image.exists() && !note.exists())
            .ok_or_else(|| ProjectError::NameConflict(images_dir.join(&basename)))?;

        let template = project.control.document().new_document(&name);
        let handle = self.editor.create_document(&template)?;
        self.editor.save_document_as(handle, &image)?;
        create_empty_note(&note).map_err(ProjectError::io_at(&note))?;

        project.rescan()?;
        if let Some(row) = project.index.images().iter().position(|p| p == &image) {
            project.index.set_cursor_by_image_row(row)?;
        }
        info!("event=page_new module=project status=ok name={}", name);
        Ok(image)
    }

    /// Copies supported images into the project with an empty note each.
    ///
    /// Existing images or notes are never overwritten; such sources are skipped.
    /// 匯入圖片；不覆寫既有檔案。
    pub fn import_pages(&mut self, files: &[PathBuf]) -> ProjectResult<ImportReport> {
        let project = self.active_mut()?;
        let mut report = ImportReport::default();
        for source in files {
            if !is_image(source) || !source.is_file() {
                report.skipped.push((source.clone(), ImportSkip::Unsupported));
                continue;
            }
            let (Some(file_name), Some(base)) = (source.file_name(), base_name(source)) else {
                report.skipped.push((source.clone(), ImportSkip::Unsupported));
                continue;
            };
            let image = project.paths.images_dir().join(file_name);
            let note = note_path(project.paths.texts_dir(), &base);
            if image.exists() {
                report
                    .skipped
                    .push((source.clone(), ImportSkip::ImageExists(image)));
                continue;
            }
            if note.exists() {
                report
                    .skipped
                    .push((source.clone(), ImportSkip::NoteExists(note)));
                continue;
            }

            let copied = fs::copy(source, &image).and_then(|_| create_empty_note(&note));
            match copied {
                Ok(()) => report.imported.push(image),
                Err(err) => {
                    warn!(
                        "event=page_import module=project status=failed source={} error={}",
                        source.display(),
                        err
                    );
                    report
                        .skipped
                        .push((source.clone(), ImportSkip::Failed(err.to_string())));
                }
            }
        }
        project.rescan()?;
        info!(
            "event=page_import module=project status=ok imported={} skipped={}",
            report.imported.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Saves an already open editor document into the project as `<name>.kra`.
    /// 將編輯器中已開啟的文件加入專案。
    pub fn source_page(&mut self, handle: DocumentHandle, name: &str) -> ProjectResult<PathBuf> {
        let name = validate_name(name)?.to_string();
        let project = self.active.as_mut().ok_or(ProjectError::NotActive)?;
        let image = project
            .paths
            .images_dir()
            .join(format!("{name}.{NATIVE_IMAGE_EXTENSION}"));
        let note = note_path(project.paths.texts_dir(), &name);
        for candidate in [&image, &note] {
            if candidate.exists() {
                return Err(ProjectError::NameConflict(candidate.clone()));
            }
        }

        self.editor.save_document_as(handle, &image)?;
        create_empty_note(&note).map_err(ProjectError::io_at(&note))?;
        project.rescan()?;
        info!("event=page_source module=project status=ok name={}", name);
        Ok(image)
    }

    /// Moves the page at `row` (image, backup and note) into the trash.
    /// 將指定頁面移入垃圾桶。
    pub fn delete_page(&mut self, row: usize) -> ProjectResult<QuarantineReport> {
        let project = self.active_mut()?;
        project.index.set_cursor_by_image_row(row)?;
        let Some(image) = project.index.selected_image().map(Path::to_path_buf) else {
            return Err(ProjectError::RowOutOfRange {
                row,
                len: project.index.images().len(),
            });
        };
        let note = match project.index.selected_text() {
            Some(note) => note.to_path_buf(),
            None => note_path(
                project.paths.texts_dir(),
                &base_name(&image).unwrap_or_default(),
            ),
        };
        let backup = backup_path(&image);

        let report = trash::quarantine(
            project.paths.trash_dir(),
            &[image.as_path(), backup.as_path(), note.as_path()],
        )?;
        project.index.clear_cursor();
        project.rescan()?;
        let remaining = project.index.images().len();
        if remaining > 0 {
            project.index.set_cursor_by_image_row(row.min(remaining - 1))?;
        }
        info!(
            "event=page_delete module=project status=ok moved={} skipped={}",
            report.moved.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Opens the page at `row` in the editor.
    /// 在編輯器中開啟指定頁面。
    pub fn open_page(&mut self, row: usize) -> ProjectResult<DocumentHandle> {
        let project = self.active.as_mut().ok_or(ProjectError::NotActive)?;
        project.index.set_cursor_by_image_row(row)?;
        let image = project
            .index
            .selected_image()
            .map(Path::to_path_buf)
            .ok_or(ProjectError::RowOutOfRange {
                row,
                len: project.index.images().len(),
            })?;
        Ok(self.editor.open_document(&image)?)
    }
}

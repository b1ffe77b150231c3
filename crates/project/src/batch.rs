//! Rename-all and export-all over every page.
//! 全部重新命名與全部匯出。
//!
//! Both refuse to start while the editor has any tracked artifact open. Per-file
//! failures inside the loop are collected in the report and never abort the batch.

use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use log::{info, warn};
use projectpages_core::{open_among, EditorService, FlatRender};

use crate::engine::{Project, SyncEngine};
use crate::error::{ProjectError, ProjectResult};
use crate::index::base_name;
use crate::pages::backup_path;
use crate::paths::validate_name;

/// Outcome of [`SyncEngine::rename_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameReport {
    pub renamed: Vec<(PathBuf, PathBuf)>,
    /// `(source, destination)` pairs left alone because the destination already existed.
    pub skipped: Vec<(PathBuf, PathBuf)>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Export settings for [`SyncEngine::export_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub extension: String,
    pub max_edge: Option<u32>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            extension: "png".to_string(),
            max_edge: None,
        }
    }
}

/// Progress reported before each page is exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportProgress<'a> {
    pub done: usize,
    pub total: usize,
    pub page: &'a Path,
}

/// Outcome of [`SyncEngine::export_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub exported: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
    pub cancelled: bool,
}

/// Export file name for `stem`, with an optional animation frame.
/// 匯出檔名。
pub fn export_file_name(stem: &str, frame: Option<u32>, extension: &str) -> String {
    match frame {
        Some(frame) => format!("{stem}_f{frame:04}.{extension}"),
        None => format!("{stem}.{extension}"),
    }
}

struct RenamePlan {
    image: PathBuf,
    backup: Option<PathBuf>,
    note: Option<PathBuf>,
}

impl<E: EditorService> SyncEngine<E> {
    fn ensure_nothing_open(&self, project: &Project) -> ProjectResult<()> {
        let tracked = project.index.tracked_artifacts();
        let open = open_among(&self.editor, &tracked);
        if open.is_empty() {
            Ok(())
        } else {
            warn!(
                "event=batch_precheck module=project status=edit_conflict open={}",
                open.len()
            );
            Err(ProjectError::EditConflict { open })
        }
    }

    /// Renumbers every page as `<base>_NNNN` (1-based) in the current order.
    ///
    /// Image, backup and note of a page move together; a file whose destination
    /// already exists is skipped.
    /// 依目前順序重新編號所有頁面。
    pub fn rename_all(&mut self, new_base: &str) -> ProjectResult<RenameReport> {
        let new_base = validate_name(new_base)?.to_string();
        let project = self.active_ref()?;
        self.ensure_nothing_open(project)?;

        let project = self.active_mut()?;
        let cursor = project.index.cursor();
        let plans: Vec<RenamePlan> = project
            .index
            .images()
            .iter()
            .map(|image| {
                let backup = Some(backup_path(image)).filter(|path| path.is_file());
                let note = base_name(image).and_then(|base| {
                    project
                        .index
                        .texts()
                        .iter()
                        .find(|text| base_name(text).as_deref() == Some(base.as_str()))
                        .cloned()
                });
                RenamePlan {
                    image: image.clone(),
                    backup,
                    note,
                }
            })
            .collect();

        let mut report = RenameReport::default();
        for (position, plan) in plans.iter().enumerate() {
            let stem = format!("{new_base}_{:04}", position + 1);
            let image_name = with_stem(&plan.image, &stem);
            rename_guarded(&plan.image, &image_name, &mut report);
            if let Some(backup) = &plan.backup {
                rename_guarded(backup, &backup_path(&image_name), &mut report);
            }
            if let Some(note) = &plan.note {
                rename_guarded(note, &with_stem(note, &stem), &mut report);
            }
        }

        project.rescan()?;
        project.index.restore_cursor(cursor);
        info!(
            "event=batch_rename module=project status=ok renamed={} skipped={} failed={}",
            report.renamed.len(),
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Flattens every page into `destination`, one file per animation frame for
    /// animated documents.
    ///
    /// Notes are locked for the duration and the selection is restored afterwards.
    /// `progress` runs before each page; returning `Break` stops before that page.
    /// 將所有頁面匯出為平面圖片。
    pub fn export_all<F>(
        &mut self,
        destination: &Path,
        options: &ExportOptions,
        mut progress: F,
    ) -> ProjectResult<ExportReport>
    where
        F: FnMut(ExportProgress<'_>) -> ControlFlow<()>,
    {
        let project = self.active_ref()?;
        self.ensure_nothing_open(project)?;
        fs::create_dir_all(destination).map_err(ProjectError::io_at(destination))?;

        let project = self.active.as_mut().ok_or(ProjectError::NotActive)?;
        let cursor = project.index.cursor();
        let pages: Vec<PathBuf> = project.index.images().to_vec();
        project.index.lock_notes();

        let mut report = ExportReport::default();
        for (done, page) in pages.iter().enumerate() {
            let step = ExportProgress {
                done,
                total: pages.len(),
                page,
            };
            if progress(step).is_break() {
                report.cancelled = true;
                break;
            }
            export_page(&mut self.editor, page, destination, options, &mut report);
        }

        project.index.unlock_notes();
        project.index.restore_cursor(cursor);
        info!(
            "event=batch_export module=project status=ok exported={} failed={} cancelled={}",
            report.exported.len(),
            report.failed.len(),
            report.cancelled
        );
        Ok(report)
    }
}

fn export_page<E: EditorService>(
    editor: &mut E,
    page: &Path,
    destination: &Path,
    options: &ExportOptions,
    report: &mut ExportReport,
) {
    let stem = base_name(page).unwrap_or_default();
    let handle = match editor.open_document(page) {
        Ok(handle) => handle,
        Err(err) => {
            warn!(
                "event=batch_export module=project status=open_failed page={} error={}",
                page.display(),
                err
            );
            report.failed.push((page.to_path_buf(), err.to_string()));
            return;
        }
    };

    let frames: Vec<Option<u32>> = match editor.animation_frames(handle) {
        Some(range) => range.map(Some).collect(),
        None => vec![None],
    };
    for frame in frames {
        let target = destination.join(export_file_name(&stem, frame, &options.extension));
        let render = FlatRender {
            frame,
            max_edge: options.max_edge,
        };
        match editor.export_flat(handle, &target, render) {
            Ok(()) => report.exported.push(target),
            Err(err) => {
                warn!(
                    "event=batch_export module=project status=render_failed page={} error={}",
                    page.display(),
                    err
                );
                report.failed.push((target, err.to_string()));
            }
        }
    }

    if let Err(err) = editor.close_document(handle) {
        warn!(
            "event=batch_export module=project status=close_failed page={} error={}",
            page.display(),
            err
        );
    }
}

/// `path` with its stem replaced, keeping the directory and extension.
fn with_stem(path: &Path, stem: &str) -> PathBuf {
    match path.extension() {
        Some(ext) => path.with_file_name(format!("{stem}.{}", ext.to_string_lossy())),
        None => path.with_file_name(stem),
    }
}

fn rename_guarded(from: &Path, to: &Path, report: &mut RenameReport) {
    if from == to {
        return;
    }
    if to.exists() {
        report.skipped.push((from.to_path_buf(), to.to_path_buf()));
        return;
    }
    match fs::rename(from, to) {
        Ok(()) => report.renamed.push((from.to_path_buf(), to.to_path_buf())),
        Err(err) => {
            warn!(
                "event=batch_rename module=project status=failed path={} error={}",
                from.display(),
                err
            );
            report.failed.push((from.to_path_buf(), err.to_string()));
        }
    }
}

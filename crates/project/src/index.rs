//! Ordered image/note listing and the selected-page cursor.
//! 圖片與筆記的排序清單及目前選取的頁面。
//!
//! The filesystem is the source of truth: every listing comes from a fresh
//! directory scan, and the note for a row is re-resolved by base name on every
//! access because the host editor may add or remove images at any time.

use std::fs;
use std::io;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use icu_collator::{Collator, CollatorOptions};
use icu_locid::Locale;
use log::debug;
use projectpages_core::{read_note, write_note};

use crate::error::{ProjectError, ProjectResult};

/// Image formats listed as pages (compared case-insensitively).
/// 列為頁面的圖片格式。
pub const IMAGE_EXTENSIONS: [&str; 19] = [
    "kra", "krz", "ora", "bmp", "gif", "jpg", "jpeg", "png", "pbm", "pgm", "ppm", "xbm", "xpm",
    "tif", "tiff", "psd", "webp", "svg", "svgz",
];
/// Note formats; `eo` is the native one.
pub const TEXT_EXTENSIONS: [&str; 2] = ["eo", "txt"];
pub const NATIVE_NOTE_EXTENSION: &str = "eo";
/// Autosave copies written by the editor never show up as pages.
pub const AUTOSAVE_SUFFIX: &str = "-autosave.kra";

pub fn is_image(path: &Path) -> bool {
    has_extension(path, &IMAGE_EXTENSIONS) && !is_autosave(path)
}

pub fn is_text(path: &Path) -> bool {
    has_extension(path, &TEXT_EXTENSIONS)
}

fn is_autosave(path: &Path) -> bool {
    path.file_name()
        .map(|name| {
            name.to_string_lossy()
                .to_ascii_lowercase()
                .ends_with(AUTOSAVE_SUFFIX)
        })
        .unwrap_or(false)
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            allowed
                .iter()
                .any(|candidate| ext.eq_ignore_ascii_case(candidate))
        })
        .unwrap_or(false)
}

/// Base name shared by an image and its note: the file name without its final extension.
/// 圖片與筆記共用的基本名稱。
pub fn base_name(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
}

/// Locale-aware file-name ordering.
///
/// Uses root-locale collation and falls back to case-insensitive byte order
/// when the collator is unavailable.
pub(crate) fn sort_by_name(paths: &mut [PathBuf]) {
    let collator = Collator::try_new(&Locale::UND.into(), CollatorOptions::new()).ok();
    paths.sort_by(|a, b| {
        let a_name = file_name_lossy(a);
        let b_name = file_name_lossy(b);
        let primary = match &collator {
            Some(collator) => collator.compare(&a_name, &b_name),
            None => a_name.to_lowercase().cmp(&b_name.to_lowercase()),
        };
        primary.then_with(|| a_name.cmp(&b_name))
    });
}

fn file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Lists the files of `dir` accepted by `filter`, sorted by name. A missing
/// directory lists as empty.
pub(crate) fn list_sorted(dir: &Path, filter: fn(&Path) -> bool) -> ProjectResult<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(ProjectError::io_at(dir)(err)),
    };
    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(ProjectError::io_at(dir))?;
        let path = entry.path();
        if path.is_file() && filter(&path) {
            found.push(path);
        }
    }
    sort_by_name(&mut found);
    Ok(found)
}

/// Selected row and its resolved note.
/// 目前選取的列與對應的筆記。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub image_index: Option<usize>,
    pub text_index: Option<usize>,
}

/// Ordered listing of a project's images and notes.
/// 專案圖片與筆記的排序索引。
#[derive(Debug, Clone, Default)]
pub struct PageIndex {
    images_dir: PathBuf,
    texts_dir: PathBuf,
    found_images: Vec<PathBuf>,
    found_texts: Vec<PathBuf>,
    cursor: Cursor,
    notes_locked: bool,
}

impl PageIndex {
    /// Scans both directories.
    pub fn rescan(images_dir: &Path, texts_dir: &Path) -> ProjectResult<Self> {
        let mut index = Self {
            images_dir: images_dir.to_path_buf(),
            texts_dir: texts_dir.to_path_buf(),
            ..Self::default()
        };
        index.refresh()?;
        Ok(index)
    }

    /// Rescans in place, keeping the selection on the same image when it still exists.
    /// 重新掃描並盡量保留原本的選取。
    pub fn refresh(&mut self) -> ProjectResult<()> {
        let selected = self.selected_image().map(Path::to_path_buf);
        self.found_images = list_sorted(&self.images_dir, is_image)?;
        self.found_texts = list_sorted(&self.texts_dir, is_text)?;

        let image_index = selected.and_then(|path| {
            self.found_images
                .iter()
                .position(|candidate| candidate == &path)
        });
        self.cursor = Cursor {
            image_index,
            text_index: None,
        };
        self.cursor.text_index = self.resolve_text();
        debug!(
            "event=index_rescan module=project status=ok images={} texts={}",
            self.found_images.len(),
            self.found_texts.len()
        );
        Ok(())
    }

    pub fn images(&self) -> &[PathBuf] {
        &self.found_images
    }

    pub fn texts(&self) -> &[PathBuf] {
        &self.found_texts
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn texts_dir(&self) -> &Path {
        &self.texts_dir
    }

    /// Selects `row` and resolves its note by base name.
    /// 選取指定列並依基本名稱尋找筆記。
    pub fn set_cursor_by_image_row(&mut self, row: usize) -> ProjectResult<()> {
        if row >= self.found_images.len() {
            return Err(ProjectError::RowOutOfRange {
                row,
                len: self.found_images.len(),
            });
        }
        self.cursor.image_index = Some(row);
        self.cursor.text_index = self.resolve_text();
        Ok(())
    }

    pub fn clear_cursor(&mut self) {
        self.cursor = Cursor::default();
    }

    pub(crate) fn restore_cursor(&mut self, cursor: Cursor) {
        let image_index = cursor
            .image_index
            .filter(|index| *index < self.found_images.len());
        self.cursor = Cursor {
            image_index,
            text_index: None,
        };
        self.cursor.text_index = self.resolve_text();
    }

    pub fn selected_image(&self) -> Option<&Path> {
        self.cursor
            .image_index
            .and_then(|index| self.found_images.get(index))
            .map(PathBuf::as_path)
    }

    /// Note paired with the selected image, re-resolved against the current listing.
    pub fn selected_text(&self) -> Option<&Path> {
        self.resolve_text()
            .and_then(|index| self.found_texts.get(index))
            .map(PathBuf::as_path)
    }

    fn resolve_text(&self) -> Option<usize> {
        let base = base_name(self.selected_image()?)?;
        let matches = |path: &PathBuf| base_name(path).as_deref() == Some(base.as_str());
        let native = self.found_texts.iter().position(|path| {
            matches(path)
                && path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case(NATIVE_NOTE_EXTENSION))
                    .unwrap_or(false)
        });
        native.or_else(|| self.found_texts.iter().position(matches))
    }

    /// Reads the selected page's note; fails with `NotPaired` when none resolves.
    /// 讀取目前頁面的筆記。
    pub fn read_note(&self) -> ProjectResult<String> {
        let path = self.paired_text()?;
        Ok(read_note(path)?.text)
    }

    /// Replaces the selected page's note.
    /// 寫入目前頁面的筆記。
    pub fn write_note(&self, text: &str) -> ProjectResult<()> {
        if self.notes_locked {
            return Err(ProjectError::NotesLocked);
        }
        let path = self.paired_text()?;
        write_note(path, text)?;
        Ok(())
    }

    fn paired_text(&self) -> ProjectResult<&Path> {
        match self.selected_text() {
            Some(path) if path.is_file() => Ok(path),
            _ => Err(ProjectError::NotPaired),
        }
    }

    /// Selectable page numbers: `1..=n` only when image and note counts agree.
    /// 可選取的頁碼範圍；數量不一致時停用。
    pub fn index_range(&self) -> RangeInclusive<usize> {
        let images = self.found_images.len();
        if images > 0 && images == self.found_texts.len() {
            1..=images
        } else {
            0..=0
        }
    }

    pub fn lock_notes(&mut self) {
        self.notes_locked = true;
    }

    pub fn unlock_notes(&mut self) {
        self.notes_locked = false;
    }

    pub fn notes_locked(&self) -> bool {
        self.notes_locked
    }

    /// Every artifact an external editor might hold open.
    pub fn tracked_artifacts(&self) -> Vec<PathBuf> {
        self.found_images
            .iter()
            .chain(self.found_texts.iter())
            .cloned()
            .collect()
    }
}

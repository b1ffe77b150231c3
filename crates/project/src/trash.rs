//! Trash quarantine: removed artifacts are moved, never deleted.
//! 垃圾桶隔離區：移除的檔案只會被移動，不會被刪除。
//!
//! Every file observed in the trash directory carries a `[ Trash_NNNN ] `
//! prefix. The number is the file's position in the current listing, bumped
//! past numbers already in use so two tags never collide.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ProjectError, ProjectResult};
use crate::index::list_sorted;

static TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[ Trash_(\d{4,}) \] ").expect("valid trash tag regex"));

/// Prefix shared by every trash tag.
pub const TRASH_TAG_PREFIX: &str = "[ Trash_";

/// Formats the tag for `number`, e.g. `[ Trash_0007 ] `.
/// 產生垃圾桶標籤。
pub fn trash_tag(number: u32) -> String {
    format!("{TRASH_TAG_PREFIX}{number:04} ] ")
}

/// Tag number carried by `name`, if any.
pub fn tag_number(name: &str) -> Option<u32> {
    TAG_PATTERN
        .captures(name)
        .and_then(|captures| captures.get(1))
        .and_then(|digits| digits.as_str().parse().ok())
}

pub fn is_tagged(name: &str) -> bool {
    tag_number(name).is_some()
}

fn any_file(_: &Path) -> bool {
    true
}

fn name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Tags every untagged file in `trash_dir`; returns the `(from, to)` renames performed.
///
/// Idempotent: already-tagged files are never renamed, so a second call is a no-op.
/// 為尚未標記的檔案加上標籤。
pub fn tag_untagged_entries(trash_dir: &Path) -> ProjectResult<Vec<(PathBuf, PathBuf)>> {
    let entries = list_sorted(trash_dir, any_file)?;
    let mut used: BTreeSet<u32> = entries
        .iter()
        .filter_map(|path| tag_number(&name_of(path)))
        .collect();

    let mut renamed = Vec::new();
    for (position, path) in entries.iter().enumerate() {
        let name = name_of(path);
        if is_tagged(&name) {
            continue;
        }
        let mut number = u32::try_from(position).unwrap_or(u32::MAX);
        let destination = loop {
            let candidate = trash_dir.join(format!("{}{name}", trash_tag(number)));
            if !used.contains(&number) && !candidate.exists() {
                break candidate;
            }
            number = number.saturating_add(1);
        };
        match fs::rename(path, &destination) {
            Ok(()) => {
                used.insert(number);
                renamed.push((path.clone(), destination));
            }
            Err(err) => warn!(
                "event=trash_tag module=project status=failed path={} error={}",
                path.display(),
                err
            ),
        }
    }
    if !renamed.is_empty() {
        debug!(
            "event=trash_tag module=project status=ok tagged={}",
            renamed.len()
        );
    }
    Ok(renamed)
}

/// Tags pending entries and returns the trash listing.
/// 列出垃圾桶內容（先補上標籤）。
pub fn list_trash(trash_dir: &Path) -> ProjectResult<Vec<PathBuf>> {
    tag_untagged_entries(trash_dir)?;
    list_sorted(trash_dir, any_file)
}

/// Outcome of a quarantine request. Missing sources and failed moves are not errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuarantineReport {
    /// `(original, final trash path)` for each moved file.
    pub moved: Vec<(PathBuf, PathBuf)>,
    /// Sources that did not exist.
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Moves each existing path into `trash_dir`, then tags the new arrivals.
/// 將存在的檔案移入垃圾桶並加上標籤。
pub fn quarantine<P>(trash_dir: &Path, paths: &[P]) -> ProjectResult<QuarantineReport>
where
    P: AsRef<Path>,
{
    fs::create_dir_all(trash_dir).map_err(ProjectError::io_at(trash_dir))?;
    tag_untagged_entries(trash_dir)?;

    let mut report = QuarantineReport::default();
    for source in paths {
        let source: &Path = source.as_ref();
        if !source.is_file() {
            report.skipped.push(source.to_path_buf());
            continue;
        }
        let name = name_of(source);
        let mut destination = trash_dir.join(&name);
        if destination.exists() {
            // Name already looks like a tag; give it a fresh one directly.
            destination = free_tagged_destination(trash_dir, &name);
        }
        match fs::rename(source, &destination) {
            Ok(()) => report.moved.push((source.to_path_buf(), destination)),
            Err(err) => {
                warn!(
                    "event=trash_move module=project status=failed path={} error={}",
                    source.display(),
                    err
                );
                report.failed.push((source.to_path_buf(), err.to_string()));
            }
        }
    }

    for (from, to) in tag_untagged_entries(trash_dir)? {
        if let Some(entry) = report.moved.iter_mut().find(|(_, dest)| *dest == from) {
            entry.1 = to;
        }
    }
    Ok(report)
}

fn free_tagged_destination(trash_dir: &Path, name: &str) -> PathBuf {
    let mut number = 0u32;
    loop {
        let candidate = trash_dir.join(format!("{}{name}", trash_tag(number)));
        if !candidate.exists() || number == u32::MAX {
            return candidate;
        }
        number += 1;
    }
}

//! Project archive validation, packing and unpacking.
//! 專案壓縮檔的驗證、封裝與解壓。
//!
//! Validity is structural only: an archive is a project archive when it is a
//! readable zip whose member list contains every entry of
//! [`REQUIRED_MEMBERS`]. Member contents are never inspected here.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use thiserror::Error;
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::paths::{CONTROL_FILE, IMAGES_DIR, TEXTS_DIR, THUMBNAIL_FILE, TRASH_DIR};

/// Members every project archive must list.
/// 專案壓縮檔必須包含的項目。
pub const REQUIRED_MEMBERS: [&str; 5] = [
    CONTROL_FILE,
    THUMBNAIL_FILE,
    "IMAGES/",
    "TEXTS/",
    "TRASH/",
];

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("zip error in {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Outcome of a structural check.
/// 結構檢查結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid,
    Invalid(String),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }
}

/// Checks that `archive_path` is a readable zip listing every required member.
/// 檢查壓縮檔是否可讀且包含所有必要項目。
pub fn validate(archive_path: &Path) -> Validation {
    let file = match File::open(archive_path) {
        Ok(file) => file,
        Err(err) => return Validation::Invalid(format!("cannot open archive: {err}")),
    };
    let archive = match ZipArchive::new(file) {
        Ok(archive) => archive,
        Err(err) => return Validation::Invalid(format!("not a zip archive: {err}")),
    };

    let mut missing: Vec<&str> = REQUIRED_MEMBERS
        .iter()
        .copied()
        .filter(|required| !archive.file_names().any(|name| name == *required))
        .collect();
    if missing.is_empty() {
        Validation::Valid
    } else {
        missing.sort_unstable();
        Validation::Invalid(format!("missing members: {}", missing.join(", ")))
    }
}

/// Outcome of [`pack_directory`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackReport {
    pub entries: usize,
    /// Paths left out because their names are not valid UTF-8.
    pub skipped: Vec<PathBuf>,
}

/// Packs `root` into `archive_path`, replacing it atomically.
///
/// Entries are stored relative to `root` with `/` separators; directories get
/// explicit entries so empty `IMAGES/`, `TEXTS/` and `TRASH/` survive. Names
/// that are not valid UTF-8 cannot be stored unchanged and are skipped.
pub fn pack_directory(root: &Path, archive_path: &Path) -> Result<PackReport, ArchiveError> {
    let partial = partial_path(archive_path);
    let result = write_zip(root, &partial);
    match result {
        Ok(report) => {
            fs::rename(&partial, archive_path).map_err(|source| ArchiveError::Io {
                path: archive_path.to_path_buf(),
                source,
            })?;
            debug!(
                "event=archive_pack module=project status=ok entries={} skipped={} archive={}",
                report.entries,
                report.skipped.len(),
                archive_path.display()
            );
            Ok(report)
        }
        Err(err) => {
            if let Err(cleanup) = fs::remove_file(&partial) {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!(
                        "event=archive_pack module=project status=cleanup_failed path={} error={}",
                        partial.display(),
                        cleanup
                    );
                }
            }
            Err(err)
        }
    }
}

fn write_zip(root: &Path, destination: &Path) -> Result<PackReport, ArchiveError> {
    let file = File::create(destination).map_err(|source| ArchiveError::Io {
        path: destination.to_path_buf(),
        source,
    })?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let zip_err = |source| ArchiveError::Zip {
        path: destination.to_path_buf(),
        source,
    };

    let mut report = PackReport::default();
    let mut walker = WalkDir::new(root).min_depth(1).sort_by_file_name().into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|source| ArchiveError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let Some(name) = member_name(relative) else {
            warn!(
                "event=archive_pack module=project status=skipped_non_utf8 path={}",
                entry.path().display()
            );
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            report.skipped.push(entry.path().to_path_buf());
            continue;
        };
        if entry.file_type().is_dir() {
            writer
                .add_directory(format!("{name}/"), options)
                .map_err(zip_err)?;
        } else if entry.file_type().is_file() {
            writer.start_file(name, options).map_err(zip_err)?;
            let mut source = File::open(entry.path()).map_err(|source| ArchiveError::Io {
                path: entry.path().to_path_buf(),
                source,
            })?;
            io::copy(&mut source, &mut writer).map_err(|source| ArchiveError::Io {
                path: entry.path().to_path_buf(),
                source,
            })?;
        } else {
            continue;
        }
        report.entries += 1;
    }

    writer.finish().map_err(zip_err)?;
    Ok(report)
}

/// Extracts every member of `archive_path` under `destination`.
///
/// Members whose names would escape `destination` are skipped. Returns the
/// number of entries extracted.
pub fn unpack_into(archive_path: &Path, destination: &Path) -> Result<usize, ArchiveError> {
    let file = File::open(archive_path).map_err(|source| ArchiveError::Io {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let mut archive = ZipArchive::new(file).map_err(|source| ArchiveError::Zip {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ArchiveError::Io { path, source }
    };

    fs::create_dir_all(destination).map_err(io_err(destination))?;
    let mut count = 0;
    for index in 0..archive.len() {
        let mut member = archive.by_index(index).map_err(|source| ArchiveError::Zip {
            path: archive_path.to_path_buf(),
            source,
        })?;
        let Some(relative) = member.enclosed_name().map(|name| name.to_path_buf()) else {
            warn!(
                "event=archive_unpack module=project status=skipped_unsafe member={}",
                member.name()
            );
            continue;
        };
        let out_path = destination.join(relative);
        if member.is_dir() {
            fs::create_dir_all(&out_path).map_err(io_err(&out_path))?;
        } else {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent).map_err(io_err(parent))?;
            }
            let mut out_file = File::create(&out_path).map_err(io_err(&out_path))?;
            io::copy(&mut member, &mut out_file).map_err(io_err(&out_path))?;
        }
        count += 1;
    }

    // Older archives may omit directory entries for empty folders.
    for dir in [IMAGES_DIR, TEXTS_DIR, TRASH_DIR] {
        let path = destination.join(dir);
        fs::create_dir_all(&path).map_err(io_err(&path))?;
    }

    debug!(
        "event=archive_unpack module=project status=ok entries={} destination={}",
        count,
        destination.display()
    );
    Ok(count)
}

fn member_name(relative: &Path) -> Option<String> {
    let parts = relative
        .components()
        .map(|component| component.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}

fn partial_path(archive_path: &Path) -> PathBuf {
    let mut name: OsString = archive_path.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

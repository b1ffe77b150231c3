use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use projectpages_core::normalize_path;
use thiserror::Error;

/// Marker/control file at the project root.
/// 專案根目錄中的控制檔。
pub const CONTROL_FILE: &str = "control.eo";
pub const THUMBNAIL_FILE: &str = "thumbnail.png";
pub const IMAGES_DIR: &str = "IMAGES";
pub const TEXTS_DIR: &str = "TEXTS";
pub const TRASH_DIR: &str = "TRASH";

/// Suffix of an unpacked working directory.
/// 工作資料夾的後綴。
pub const WORKING_DIR_SUFFIX: &str = ".project_pages";
pub const ARCHIVE_EXTENSION: &str = "zip";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathSetError {
    #[error("project root is empty")]
    Empty,
    #[error("cannot resolve project root {0}")]
    Unresolvable(PathBuf),
    #[error("invalid project name `{0}`")]
    InvalidName(String),
}

/// Canonical paths of one project, all direct children of `root`.
/// 專案的標準路徑集合，皆為根目錄的直接子項。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSet {
    root: PathBuf,
    control_file: PathBuf,
    thumbnail_file: PathBuf,
    images_dir: PathBuf,
    texts_dir: PathBuf,
    trash_dir: PathBuf,
}

impl PathSet {
    /// Computes the path set for `root` without touching the disk.
    /// 依根目錄計算路徑集合，不存取磁碟。
    pub fn derive(root: impl AsRef<Path>) -> Result<Self, PathSetError> {
        let root = resolve(root.as_ref())?;
        Ok(Self {
            control_file: root.join(CONTROL_FILE),
            thumbnail_file: root.join(THUMBNAIL_FILE),
            images_dir: root.join(IMAGES_DIR),
            texts_dir: root.join(TEXTS_DIR),
            trash_dir: root.join(TRASH_DIR),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn control_file(&self) -> &Path {
        &self.control_file
    }

    pub fn thumbnail_file(&self) -> &Path {
        &self.thumbnail_file
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn texts_dir(&self) -> &Path {
        &self.texts_dir
    }

    pub fn trash_dir(&self) -> &Path {
        &self.trash_dir
    }

    /// Directories holding page artifacts.
    pub fn artifact_dirs(&self) -> [&Path; 3] {
        [&self.images_dir, &self.texts_dir, &self.trash_dir]
    }

    /// Whether `path` lies inside the project root.
    /// 路徑是否位於專案之內。
    pub fn contains(&self, path: &Path) -> bool {
        normalize_path(path).starts_with(&self.root)
    }
}

/// Makes `path` absolute against the current directory and folds `.`/`..`
/// segments, without touching the disk.
/// 將路徑轉為正規化的絕對路徑。
pub fn resolve(path: &Path) -> Result<PathBuf, PathSetError> {
    if path.as_os_str().is_empty() {
        return Err(PathSetError::Empty);
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(path))
            .map_err(|_| PathSetError::Unresolvable(path.to_path_buf()))?
    };
    Ok(normalize_path(&absolute))
}

/// Checks that `name` can be used as a single file-name component; returns it trimmed.
/// 檢查名稱可作為單一檔名使用。
pub fn validate_name(name: &str) -> Result<&str, PathSetError> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains(['/', '\\'])
    {
        return Err(PathSetError::InvalidName(name.to_string()));
    }
    Ok(trimmed)
}

/// Working directory and archive a new project named `name` would occupy in `dir`.
/// 新專案在 `dir` 中將使用的工作資料夾與壓縮檔路徑。
pub fn new_project_paths(dir: &Path, name: &str) -> Result<(PathBuf, PathBuf), PathSetError> {
    let trimmed = validate_name(name)?;
    let root = dir.join(format!("{trimmed}{WORKING_DIR_SUFFIX}"));
    let archive = dir.join(format!(
        "{trimmed}{WORKING_DIR_SUFFIX}.{ARCHIVE_EXTENSION}"
    ));
    Ok((root, archive))
}

/// Working directory used when unpacking `archive`: the archive path without its `.zip`
/// extension, or with `.project_pages` appended for any other name.
/// 解壓縮時使用的工作資料夾。
pub fn working_dir_for_archive(archive: &Path) -> PathBuf {
    let is_zip = archive
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
        .unwrap_or(false);
    if is_zip {
        return archive.with_extension("");
    }
    let mut name: OsString = archive.as_os_str().to_os_string();
    name.push(WORKING_DIR_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_places_everything_under_root() {
        let set = PathSet::derive("/tmp/Demo.project_pages").unwrap();
        for path in [
            set.control_file(),
            set.thumbnail_file(),
            set.images_dir(),
            set.texts_dir(),
            set.trash_dir(),
        ] {
            assert_eq!(path.parent(), Some(set.root()));
        }
        assert_eq!(set.control_file().file_name().unwrap(), "control.eo");
        assert!(set.contains(Path::new("/tmp/Demo.project_pages/IMAGES/a.kra")));
        assert!(!set.contains(Path::new("/tmp/Other/IMAGES/a.kra")));
    }

    #[test]
    fn derive_rejects_empty_and_resolves_relative() {
        assert_eq!(PathSet::derive("").unwrap_err(), PathSetError::Empty);
        let set = PathSet::derive("relative.project_pages").unwrap();
        assert!(set.root().is_absolute());
    }

    #[test]
    fn derive_folds_parent_segments() {
        let set = PathSet::derive("/tmp/sub/../Demo.project_pages").unwrap();
        assert_eq!(set.root(), Path::new("/tmp/Demo.project_pages"));
        assert!(set.contains(Path::new("/tmp/sub/../Demo.project_pages/IMAGES/a.kra")));
        assert!(!set.contains(Path::new("/tmp/Demo.project_pages/../Other/a.kra")));
    }

    #[test]
    fn new_project_paths_are_siblings() {
        let (root, archive) = new_project_paths(Path::new("/tmp"), "Demo").unwrap();
        assert_eq!(root, PathBuf::from("/tmp/Demo.project_pages"));
        assert_eq!(archive, PathBuf::from("/tmp/Demo.project_pages.zip"));
        assert!(matches!(
            new_project_paths(Path::new("/tmp"), "a/b"),
            Err(PathSetError::InvalidName(_))
        ));
        assert!(new_project_paths(Path::new("/tmp"), "  ").is_err());
    }

    #[test]
    fn working_dir_strips_zip_or_appends_suffix() {
        assert_eq!(
            working_dir_for_archive(Path::new("/tmp/Demo.project_pages.zip")),
            PathBuf::from("/tmp/Demo.project_pages")
        );
        assert_eq!(
            working_dir_for_archive(Path::new("/tmp/Demo.ZIP")),
            PathBuf::from("/tmp/Demo")
        );
        assert_eq!(
            working_dir_for_archive(Path::new("/tmp/Demo")),
            PathBuf::from("/tmp/Demo.project_pages")
        );
        assert_eq!(
            working_dir_for_archive(Path::new("/tmp/Demo.bak")),
            PathBuf::from("/tmp/Demo.bak.project_pages")
        );
    }
}

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::{info, warn};

use crate::RecentProjects;

/// 最近專案清單的持久化儲存。 / Persists the recent-projects list outside any project.
///
/// The file holds a `capacity=N` header followed by one base64 path per line.
/// A file that fails to decode is replaced with an empty list on load, and
/// entries whose archive no longer exists are dropped.
#[derive(Debug)]
pub struct RecentProjectsStore {
    path: PathBuf,
    history: RecentProjects,
}

impl RecentProjectsStore {
    /// 以既有清單建立儲存，不讀取檔案。 / Creates a store for `path` seeded with `history`, without reading it.
    pub fn new(path: impl Into<PathBuf>, history: RecentProjects) -> Self {
        Self {
            path: path.into(),
            history,
        }
    }

    /// 從指定路徑載入；檔案不存在時回傳空集合，內容損毀時重設並寫回。
    /// / Loads history, returning an empty list when missing and self-healing when corrupt.
    pub fn load(path: impl AsRef<Path>, default_capacity: usize) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Ok(Self {
                path,
                history: RecentProjects::new(default_capacity),
            });
        }

        let contents = fs::read(&path)?;
        let mut store = match parse_history(&contents, default_capacity) {
            Ok(history) => Self { path, history },
            Err(err) => {
                warn!(
                    "event=recent_load module=settings status=corrupt path={} error={}",
                    path.display(),
                    err
                );
                let store = Self {
                    path,
                    history: RecentProjects::new(default_capacity),
                };
                store.persist()?;
                return Ok(store);
            }
        };

        let dropped = store.history.prune_missing();
        if !dropped.is_empty() {
            info!(
                "event=recent_prune module=settings status=ok dropped={}",
                dropped.len()
            );
            store.persist()?;
        }
        Ok(store)
    }

    pub fn history(&self) -> &RecentProjects {
        &self.history
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.history.iter()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 新增或提升項目並立即寫回檔案。 / Adds or promotes an entry and persists it.
    pub fn add(&mut self, path: impl Into<PathBuf>) -> io::Result<()> {
        self.history.add(path);
        self.persist()
    }

    /// 移除項目並同步儲存。 / Removes an entry and persists the change.
    pub fn remove(&mut self, path: &Path) -> io::Result<bool> {
        let removed = self.history.remove(path);
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn clear(&mut self) -> io::Result<()> {
        self.history.clear();
        self.persist()
    }

    pub fn set_capacity(&mut self, capacity: usize) -> io::Result<()> {
        self.history.set_capacity(capacity);
        self.persist()
    }

    fn persist(&self) -> io::Result<()> {
        let mut payload = format!("capacity={}\n", self.history.capacity());
        for entry in self.history.iter() {
            payload.push_str(&encode_path(entry));
            payload.push('\n');
        }
        write_atomic(&self.path, payload.as_bytes())
    }
}

fn parse_history(contents: &[u8], default_capacity: usize) -> io::Result<RecentProjects> {
    let text = std::str::from_utf8(contents)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    let mut lines = text.lines();
    let mut capacity = default_capacity;
    let mut entries = Vec::new();

    if let Some(first_line) = lines.next() {
        let first_line = first_line.trim();
        match first_line.strip_prefix("capacity=") {
            Some(value) => {
                capacity = value
                    .parse::<usize>()
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
            }
            None if first_line.is_empty() => {}
            None => entries.push(decode_path(first_line)?),
        }
    }

    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        entries.push(decode_path(trimmed)?);
    }

    Ok(RecentProjects::with_entries(capacity, entries))
}

pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, data)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn encode_path(path: &Path) -> String {
    BASE64.encode(path_to_bytes(path))
}

fn decode_path(encoded: &str) -> io::Result<PathBuf> {
    let bytes = BASE64
        .decode(encoded.as_bytes())
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    bytes_to_path(bytes)
}

#[cfg(unix)]
fn path_to_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(unix)]
fn bytes_to_path(bytes: Vec<u8>) -> io::Result<PathBuf> {
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;
    Ok(PathBuf::from(OsString::from_vec(bytes)))
}

#[cfg(windows)]
fn path_to_bytes(path: &Path) -> Vec<u8> {
    use std::os::windows::ffi::OsStrExt;
    path.as_os_str()
        .encode_wide()
        .flat_map(|unit| unit.to_le_bytes())
        .collect()
}

#[cfg(windows)]
fn bytes_to_path(bytes: Vec<u8>) -> io::Result<PathBuf> {
    use std::ffi::OsString;
    use std::os::windows::ffi::OsStringExt;

    if bytes.len() % 2 != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "encoded path payload has an odd length",
        ));
    }

    let wide: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
        .collect();
    Ok(PathBuf::from(OsString::from_wide(&wide)))
}

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// 預設保留的最近專案數量。 / Default number of remembered projects.
pub const DEFAULT_RECENT_CAPACITY: usize = 10;
/// 容量上限。 / Upper bound accepted for the capacity.
pub const MAX_RECENT_CAPACITY: usize = 100;

/// 管理最近開啟的專案壓縮檔清單（最新在前）。 / Bounded most-recent-first list of project archives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentProjects {
    capacity: usize,
    entries: VecDeque<PathBuf>,
}

impl Default for RecentProjects {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_CAPACITY)
    }
}

impl RecentProjects {
    /// 建立指定容量的清單。 / Creates a list with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let capacity = clamp_capacity(capacity);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// 依序列化資料還原清單，重複項目只保留第一次出現。
    /// / Rebuilds the list from persisted entries, keeping only the first occurrence of duplicates.
    pub fn with_entries(capacity: usize, entries: Vec<PathBuf>) -> Self {
        let mut recent = Self::new(capacity);
        for path in entries {
            if !recent.entries.contains(&path) {
                recent.entries.push_back(path);
            }
        }
        recent.entries.truncate(recent.capacity);
        recent
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 調整容量並修剪超出的紀錄。 / Adjusts capacity and trims the oldest excess entries.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = clamp_capacity(capacity);
        self.entries.truncate(self.capacity);
    }

    /// 加入或提升專案至清單頂端。 / Inserts or promotes a path to the front of the list.
    pub fn add(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.entries.retain(|existing| existing != &path);
        self.entries.push_front(path);
        self.entries.truncate(self.capacity);
    }

    /// 移除指定路徑；若存在則回傳 `true`。 / Removes the given path and returns `true` if it existed.
    pub fn remove(&mut self, path: &Path) -> bool {
        let initial_len = self.entries.len();
        self.entries.retain(|existing| existing.as_path() != path);
        initial_len != self.entries.len()
    }

    /// 移除已不存在於磁碟上的項目，回傳被移除的路徑。
    /// / Drops entries whose file no longer exists, returning the dropped paths.
    pub fn prune_missing(&mut self) -> Vec<PathBuf> {
        let mut dropped = Vec::new();
        self.entries.retain(|existing| {
            let keep = existing.is_file();
            if !keep {
                dropped.push(existing.clone());
            }
            keep
        });
        dropped
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.iter().any(|existing| existing.as_path() == path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

fn clamp_capacity(capacity: usize) -> usize {
    capacity.clamp(1, MAX_RECENT_CAPACITY)
}

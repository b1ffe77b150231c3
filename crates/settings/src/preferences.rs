use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::write_atomic;

const SETTINGS_VERSION: u32 = 1;
/// 重新命名範本歷史的上限。 / Maximum remembered rename templates.
pub const MAX_RENAME_HISTORY: usize = 10;
/// 預設重新命名範本。 / Template used when nothing has been remembered yet.
pub const DEFAULT_RENAME_TEMPLATE: &str = "page";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize settings {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write settings {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// 存放於專案之外的外掛設定。 / Plugin settings persisted outside any project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSettings {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub rename: RenameSettings,
    #[serde(default)]
    pub export: ExportSettings,
    #[serde(default)]
    pub close: CloseSettings,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            rename: RenameSettings::default(),
            export: ExportSettings::default(),
            close: CloseSettings::default(),
        }
    }
}

impl PluginSettings {
    pub fn sanitize(&mut self) {
        if self.version == 0 || self.version > SETTINGS_VERSION {
            self.version = SETTINGS_VERSION;
        }
        self.rename.sanitize();
        self.export.sanitize();
    }
}

/// 最近使用的重新命名範本（最新在前）。 / Rename templates, most recent first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameSettings {
    #[serde(default = "default_history")]
    pub history: Vec<String>,
}

fn default_history() -> Vec<String> {
    vec![DEFAULT_RENAME_TEMPLATE.to_string()]
}

impl Default for RenameSettings {
    fn default() -> Self {
        Self {
            history: default_history(),
        }
    }
}

impl RenameSettings {
    /// 目前的預設範本。 / Template offered first in a rename prompt.
    pub fn last_template(&self) -> &str {
        self.history
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_RENAME_TEMPLATE)
    }

    /// 記錄範本並提升至最前。 / Records a template at the front of the history.
    pub fn remember(&mut self, template: &str) {
        let template = template.trim();
        if template.is_empty() {
            return;
        }
        self.history.retain(|existing| existing != template);
        self.history.insert(0, template.to_string());
        self.history.truncate(MAX_RENAME_HISTORY);
    }

    fn sanitize(&mut self) {
        let mut cleaned: Vec<String> = Vec::with_capacity(self.history.len());
        for entry in self.history.drain(..) {
            let entry = entry.trim().to_string();
            if !entry.is_empty() && !cleaned.contains(&entry) {
                cleaned.push(entry);
            }
        }
        cleaned.truncate(MAX_RENAME_HISTORY);
        if cleaned.is_empty() {
            cleaned = default_history();
        }
        self.history = cleaned;
    }
}

/// 批次匯出偏好。 / Batch export preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSettings {
    #[serde(default = "default_extension")]
    pub extension: String,
    /// 最長邊像素上限；`None` 代表原始解析度。 / Longest-edge cap in pixels; `None` keeps native size.
    #[serde(default)]
    pub max_edge: Option<u32>,
}

fn default_extension() -> String {
    "png".to_string()
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            max_edge: None,
        }
    }
}

impl ExportSettings {
    fn sanitize(&mut self) {
        let extension = self
            .extension
            .trim()
            .trim_start_matches('.')
            .to_ascii_lowercase();
        self.extension = if !extension.is_empty()
            && extension.chars().all(|ch| ch.is_ascii_alphanumeric())
        {
            extension
        } else {
            default_extension()
        };
        if self.max_edge == Some(0) {
            self.max_edge = None;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseSettings {
    #[serde(default = "default_true")]
    pub delete_working_dir: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CloseSettings {
    fn default() -> Self {
        Self {
            delete_working_dir: true,
        }
    }
}

/// 讀寫 `settings.json`；內容無法解析時回復預設並寫回。
/// / Reads and writes `settings.json`, falling back to defaults (and rewriting) when unreadable.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    data: PluginSettings,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>, settings: PluginSettings) -> Self {
        Self {
            path: path.into(),
            data: settings,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Ok(Self {
                path,
                data: PluginSettings::default(),
            });
        }

        let contents = fs::read_to_string(&path).map_err(|source| SettingsError::Read {
            path: path.clone(),
            source,
        })?;
        match serde_json::from_str::<PluginSettings>(&contents) {
            Ok(mut data) => {
                let original = data.clone();
                data.sanitize();
                let store = Self { path, data };
                if store.data != original {
                    store.save()?;
                }
                Ok(store)
            }
            Err(err) => {
                warn!(
                    "event=settings_load module=settings status=corrupt path={} error={}",
                    path.display(),
                    err
                );
                let store = Self {
                    path,
                    data: PluginSettings::default(),
                };
                store.save()?;
                Ok(store)
            }
        }
    }

    pub fn settings(&self) -> &PluginSettings {
        &self.data
    }

    pub fn update<F>(&mut self, mut op: F) -> Result<(), SettingsError>
    where
        F: FnMut(&mut PluginSettings),
    {
        op(&mut self.data);
        self.data.sanitize();
        self.save()
    }

    /// 記住最近使用的重新命名範本並儲存。 / Remembers a rename template and persists it.
    pub fn remember_rename_template(&mut self, template: &str) -> Result<(), SettingsError> {
        self.update(|settings| settings.rename.remember(template))
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        let payload = serde_json::to_string_pretty(&self.data).map_err(|source| {
            SettingsError::Serialize {
                path: self.path.clone(),
                source,
            }
        })?;
        write_atomic(&self.path, payload.as_bytes()).map_err(|source| SettingsError::Write {
            path: self.path.clone(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remember_promotes_and_bounds_history() {
        let mut rename = RenameSettings::default();
        for index in 0..12 {
            rename.remember(&format!("scene{index}"));
        }
        rename.remember("scene5");
        assert_eq!(rename.last_template(), "scene5");
        assert_eq!(rename.history.len(), MAX_RENAME_HISTORY);
        assert_eq!(
            rename.history.iter().filter(|t| t.as_str() == "scene5").count(),
            1
        );
    }

    #[test]
    fn blank_template_is_ignored() {
        let mut rename = RenameSettings::default();
        rename.remember("   ");
        assert_eq!(rename.history, vec!["page".to_string()]);
    }

    #[test]
    fn sanitize_repairs_export_and_history() {
        let mut settings = PluginSettings {
            version: 0,
            rename: RenameSettings {
                history: vec![" ".into(), "cover".into(), "cover".into()],
            },
            export: ExportSettings {
                extension: ".PNG".into(),
                max_edge: Some(0),
            },
            close: CloseSettings::default(),
        };
        settings.sanitize();
        assert_eq!(settings.version, SETTINGS_VERSION);
        assert_eq!(settings.rename.history, vec!["cover".to_string()]);
        assert_eq!(settings.export.extension, "png");
        assert_eq!(settings.export.max_edge, None);

        settings.export.extension = "p/n g".into();
        settings.sanitize();
        assert_eq!(settings.export.extension, "png");
    }
}

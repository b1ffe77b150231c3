pub mod preferences;
pub mod recent;
pub mod storage;

pub use preferences::{
    CloseSettings, ExportSettings, PluginSettings, RenameSettings, SettingsError, SettingsStore,
    DEFAULT_RENAME_TEMPLATE, MAX_RENAME_HISTORY,
};
pub use recent::{RecentProjects, DEFAULT_RECENT_CAPACITY, MAX_RECENT_CAPACITY};
pub use storage::RecentProjectsStore;

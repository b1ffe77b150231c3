//! Project archive synchronization for Project Pages.
//! Project Pages 的專案壓縮檔同步引擎。
//!
//! A project is a working directory of paired images and notes mirrored into a
//! single `.project_pages.zip` archive. [`SyncEngine`] owns the lifecycle; the
//! other modules are the pieces it is built from.

mod util;

pub mod archive;
pub mod batch;
pub mod control;
pub mod engine;
pub mod error;
pub mod index;
pub mod pages;
pub mod paths;
pub mod thumbnail;
pub mod trash;

pub use archive::{
    pack_directory, unpack_into, validate, ArchiveError, PackReport, Validation,
    REQUIRED_MEMBERS,
};
pub use batch::{export_file_name, ExportOptions, ExportProgress, ExportReport, RenameReport};
pub use control::{
    parse_control, ControlDocument, ControlError, ControlIssue, ControlStore, ParsedControl,
    CONTROL_MARKER,
};
pub use engine::{CloseReport, Project, SyncEngine};
pub use error::{ProjectError, ProjectResult};
pub use index::{base_name, is_image, is_text, Cursor, PageIndex};
pub use pages::{backup_path, ImportReport, ImportSkip, NATIVE_IMAGE_EXTENSION};
pub use paths::{new_project_paths, working_dir_for_archive, PathSet, PathSetError};
pub use trash::{
    is_tagged, list_trash, quarantine, tag_untagged_entries, trash_tag, QuarantineReport,
};

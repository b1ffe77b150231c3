#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use projectpages_core::{
    DocumentHandle, EditorError, EditorService, FlatRender, NewDocument, Rect,
};
use projectpages_project::SyncEngine;
use projectpages_settings::RecentProjectsStore;
use tempfile::TempDir;

/// In-memory editor double recording every call.
#[derive(Default)]
pub struct FakeEditor {
    pub open: BTreeSet<PathBuf>,
    pub frames: HashMap<PathBuf, RangeInclusive<u32>>,
    pub created: Vec<NewDocument>,
    pub calls: Vec<String>,
    pub fail_render: bool,
    next: u64,
    docs: HashMap<DocumentHandle, Option<PathBuf>>,
}

impl FakeEditor {
    pub fn live_documents(&self) -> usize {
        self.docs.len()
    }

    fn allocate(&mut self, path: Option<PathBuf>) -> DocumentHandle {
        self.next += 1;
        let handle = DocumentHandle::new(self.next);
        self.docs.insert(handle, path);
        handle
    }
}

impl EditorService for FakeEditor {
    fn list_open_documents(&self) -> BTreeSet<PathBuf> {
        self.open.clone()
    }

    fn render_thumbnail(&self, path: &Path, rect: Rect) -> Result<Vec<u8>, EditorError> {
        if self.fail_render {
            return Err(EditorError::Render {
                path: path.to_path_buf(),
                reason: "render disabled".into(),
            });
        }
        Ok(format!("thumb {}x{}", rect.width, rect.height).into_bytes())
    }

    fn create_document(&mut self, template: &NewDocument) -> Result<DocumentHandle, EditorError> {
        self.calls.push(format!("create {}", template.name));
        self.created.push(template.clone());
        Ok(self.allocate(None))
    }

    fn open_document(&mut self, path: &Path) -> Result<DocumentHandle, EditorError> {
        self.calls.push(format!("open {}", path.display()));
        if !path.is_file() {
            return Err(EditorError::Open {
                path: path.to_path_buf(),
                reason: "missing".into(),
            });
        }
        Ok(self.allocate(Some(path.to_path_buf())))
    }

    fn save_document_as(&mut self, handle: DocumentHandle, path: &Path) -> Result<(), EditorError> {
        if !self.docs.contains_key(&handle) {
            return Err(EditorError::UnknownHandle(handle));
        }
        fs::write(path, b"fake kra").map_err(|err| EditorError::Save {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        self.docs.insert(handle, Some(path.to_path_buf()));
        Ok(())
    }

    fn close_document(&mut self, handle: DocumentHandle) -> Result<(), EditorError> {
        self.docs
            .remove(&handle)
            .map(|_| ())
            .ok_or(EditorError::UnknownHandle(handle))
    }

    fn animation_frames(&self, handle: DocumentHandle) -> Option<RangeInclusive<u32>> {
        let path = self.docs.get(&handle)?.as_ref()?;
        self.frames.get(path).cloned()
    }

    fn export_flat(
        &mut self,
        handle: DocumentHandle,
        destination: &Path,
        render: FlatRender,
    ) -> Result<(), EditorError> {
        if !self.docs.contains_key(&handle) {
            return Err(EditorError::UnknownHandle(handle));
        }
        fs::write(destination, format!("{render:?}")).map_err(|err| EditorError::Save {
            path: destination.to_path_buf(),
            reason: err.to_string(),
        })
    }
}

/// Temporary workspace with an engine whose recent list lives in `settings/`.
pub fn engine() -> (TempDir, SyncEngine<FakeEditor>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let recent = RecentProjectsStore::load(dir.path().join("settings").join("recent.db"), 10)
        .expect("recent store");
    (dir, SyncEngine::new(FakeEditor::default(), recent))
}

pub fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use category_importer::store::{CategoryStore, JsonStore};
use category_importer::record::CategoryRecord;
use tempfile::{TempDir, tempdir};

/// Application root in a scratch directory, removed on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh application root for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` to `relative` under the root, creating directories.
    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    /// Default catalog store location inside the root.
    pub fn store_path(&self) -> PathBuf {
        self.temp_dir.path().join("var").join("catalog.json")
    }

    /// Every category in the default store, in internal id order.
    pub fn categories(&self) -> Vec<CategoryRecord> {
        JsonStore::open(&self.store_path())
            .expect("open store")
            .all()
            .expect("list categories")
    }

    /// The stored category carrying `old_category_id == external_id`.
    pub fn category(&self, external_id: &str) -> Option<CategoryRecord> {
        JsonStore::open(&self.store_path())
            .expect("open store")
            .find_by_external_id(external_id)
            .expect("query store")
    }
}

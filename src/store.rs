//! Catalog store collaborator.
//!
//! The importer only talks to [`CategoryStore`]. Two implementations ship with
//! the crate: [`MemoryStore`] for tests and benches, and [`JsonStore`], a
//! single JSON document on disk that is rewritten after every successful save
//! so each row commits on its own.
//!
//! Both keep an in-memory index from `old_category_id` to internal ids, so a
//! lookup does not scan the catalog.
//!
//! Neither store takes a lock. Two import runs against the same document race
//! on the read-modify-write of a category and the later write wins.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::{CategoryId, CategoryRecord, DEFAULT_ROOT_PARENT_ID, ROOT_CATALOG_ID};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("category {0} does not exist")]
    NotFound(CategoryId),
    #[error("parent category {0} does not exist")]
    UnknownParent(CategoryId),
    #[error("category name must not be empty")]
    EmptyName,
    #[error("category {id} cannot be moved under {parent}, which is itself or one of its descendants")]
    ParentCycle { id: CategoryId, parent: CategoryId },
    #[error("catalog store io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("catalog store json error at {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub trait CategoryStore {
    /// First category (by internal id) whose `old_category_id` equals `external_id`.
    fn find_by_external_id(&self, external_id: &str)
    -> Result<Option<CategoryRecord>, StoreError>;

    fn create(&self) -> CategoryRecord {
        CategoryRecord::blank()
    }

    fn load(&self, id: CategoryId) -> Result<CategoryRecord, StoreError>;

    /// Creates or updates `record` and returns its internal id.
    fn save(&mut self, record: CategoryRecord) -> Result<CategoryId, StoreError>;

    fn all(&self) -> Result<Vec<CategoryRecord>, StoreError>;
}

#[derive(Debug, Clone)]
struct Catalog {
    next_id: CategoryId,
    categories: BTreeMap<CategoryId, CategoryRecord>,
    by_external_id: BTreeMap<String, BTreeSet<CategoryId>>,
}

/// What a save replaced, so it can be taken back.
#[derive(Debug)]
struct Applied {
    id: CategoryId,
    previous: Option<CategoryRecord>,
    next_id: CategoryId,
}

impl Catalog {
    fn new(next_id: CategoryId, categories: BTreeMap<CategoryId, CategoryRecord>) -> Self {
        let mut by_external_id = BTreeMap::<String, BTreeSet<CategoryId>>::new();
        for (id, record) in &categories {
            if let Some(external_id) = record.external_id() {
                by_external_id
                    .entry(external_id.to_string())
                    .or_default()
                    .insert(*id);
            }
        }
        Catalog {
            next_id,
            categories,
            by_external_id,
        }
    }

    fn bootstrap(now: DateTime<Utc>) -> Self {
        let mut categories = BTreeMap::new();
        for (id, parent_id, name) in [
            (ROOT_CATALOG_ID, None, "Root Catalog"),
            (DEFAULT_ROOT_PARENT_ID, Some(ROOT_CATALOG_ID), "Default Category"),
        ] {
            let mut record = CategoryRecord::blank();
            record.id = Some(id);
            record.parent_id = parent_id;
            record.name = name.to_string();
            record.created_at = Some(now);
            record.updated_at = Some(now);
            categories.insert(id, record);
        }
        Catalog::new(DEFAULT_ROOT_PARENT_ID + 1, categories)
    }

    fn find_by_external_id(&self, external_id: &str) -> Option<&CategoryRecord> {
        self.by_external_id
            .get(external_id)
            .and_then(BTreeSet::first)
            .and_then(|id| self.categories.get(id))
    }

    fn load(&self, id: CategoryId) -> Result<CategoryRecord, StoreError> {
        self.categories
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    fn save(
        &mut self,
        record: CategoryRecord,
        now: DateTime<Utc>,
    ) -> Result<CategoryId, StoreError> {
        self.apply(record, now).map(|applied| applied.id)
    }

    fn validate(&self, record: &CategoryRecord) -> Result<(), StoreError> {
        if record.name.trim().is_empty() {
            return Err(StoreError::EmptyName);
        }
        if let Some(id) = record.id {
            if !self.categories.contains_key(&id) {
                return Err(StoreError::NotFound(id));
            }
        }
        if let Some(parent) = record.parent_id {
            if !self.categories.contains_key(&parent) {
                return Err(StoreError::UnknownParent(parent));
            }
            if let Some(id) = record.id {
                if self.is_self_or_descendant(parent, id) {
                    return Err(StoreError::ParentCycle { id, parent });
                }
            }
        }
        Ok(())
    }

    /// Validates `record`, then writes it in place. Nothing changes on error.
    fn apply(
        &mut self,
        mut record: CategoryRecord,
        now: DateTime<Utc>,
    ) -> Result<Applied, StoreError> {
        self.validate(&record)?;
        let next_id = self.next_id;
        let id = match record.id {
            Some(id) => id,
            None => {
                self.next_id += 1;
                record.id = Some(next_id);
                next_id
            }
        };
        if record.created_at.is_none() {
            record.created_at = Some(now);
        }
        record.updated_at = Some(now);
        let previous = self.replace(id, Some(record));
        Ok(Applied {
            id,
            previous,
            next_id,
        })
    }

    fn undo(&mut self, applied: Applied) {
        self.replace(applied.id, applied.previous);
        self.next_id = applied.next_id;
    }

    /// Puts `record` at `id` (or removes the entry) and keeps the index in step.
    fn replace(
        &mut self,
        id: CategoryId,
        record: Option<CategoryRecord>,
    ) -> Option<CategoryRecord> {
        let previous = match record {
            Some(record) => {
                if let Some(external_id) = record.external_id() {
                    self.by_external_id
                        .entry(external_id.to_string())
                        .or_default()
                        .insert(id);
                }
                self.categories.insert(id, record)
            }
            None => self.categories.remove(&id),
        };
        let stale = previous.as_ref().and_then(CategoryRecord::external_id);
        let current = self.categories.get(&id).and_then(CategoryRecord::external_id);
        if let Some(stale) = stale.filter(|stale| Some(*stale) != current) {
            if let Some(ids) = self.by_external_id.get_mut(stale) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.by_external_id.remove(stale);
                }
            }
        }
        previous
    }

    /// Walks the ancestors of `candidate`; bounded by the catalog size so a
    /// corrupt document cannot loop forever.
    fn is_self_or_descendant(&self, candidate: CategoryId, ancestor: CategoryId) -> bool {
        let mut current = Some(candidate);
        for _ in 0..=self.categories.len() {
            match current {
                Some(id) if id == ancestor => return true,
                Some(id) => current = self.categories.get(&id).and_then(|r| r.parent_id),
                None => return false,
            }
        }
        false
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CatalogDocument {
    next_id: CategoryId,
    categories: Vec<CategoryRecord>,
}

impl From<&Catalog> for CatalogDocument {
    fn from(catalog: &Catalog) -> Self {
        CatalogDocument {
            next_id: catalog.next_id,
            categories: catalog.categories.values().cloned().collect(),
        }
    }
}

impl From<CatalogDocument> for Catalog {
    fn from(document: CatalogDocument) -> Self {
        let categories = document
            .categories
            .into_iter()
            .filter_map(|record| record.id.map(|id| (id, record)))
            .collect::<BTreeMap<_, _>>();
        let max_id = categories.keys().next_back().copied().unwrap_or(0);
        Catalog::new(document.next_id.max(max_id + 1), categories)
    }
}

/// In-process store holding a bootstrapped catalog.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    catalog: Catalog,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            catalog: Catalog::bootstrap(Utc::now()),
        }
    }

    pub fn len(&self) -> usize {
        self.catalog.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.categories.is_empty()
    }
}

impl CategoryStore for MemoryStore {
    fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<CategoryRecord>, StoreError> {
        Ok(self.catalog.find_by_external_id(external_id).cloned())
    }

    fn load(&self, id: CategoryId) -> Result<CategoryRecord, StoreError> {
        self.catalog.load(id)
    }

    fn save(&mut self, record: CategoryRecord) -> Result<CategoryId, StoreError> {
        self.catalog.save(record, Utc::now())
    }

    fn all(&self) -> Result<Vec<CategoryRecord>, StoreError> {
        Ok(self.catalog.categories.values().cloned().collect())
    }
}

/// Catalog persisted as a pretty-printed JSON document.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    catalog: Catalog,
}

impl JsonStore {
    /// Loads `path`, or starts from a bootstrapped catalog when it does not
    /// exist yet. Nothing is written until the first save.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let catalog = if path.exists() {
            let file = File::open(path).map_err(|source| StoreError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let document: CatalogDocument = serde_json::from_reader(BufReader::new(file))
                .map_err(|source| StoreError::Json {
                    path: path.to_path_buf(),
                    source,
                })?;
            debug!(
                "Loaded {} categor(ies) from {:?}",
                document.categories.len(),
                path
            );
            Catalog::from(document)
        } else {
            debug!("Catalog store {:?} not found, starting from bootstrap", path);
            Catalog::bootstrap(Utc::now())
        };
        Ok(JsonStore {
            path: path.to_path_buf(),
            catalog,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let staging = self.path.with_extension("json.tmp");
        let file = File::create(&staging).map_err(|e| self.io_error(e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &CatalogDocument::from(&self.catalog)).map_err(
            |source| StoreError::Json {
                path: self.path.clone(),
                source,
            },
        )?;
        writer.flush().map_err(|e| self.io_error(e))?;
        drop(writer);
        fs::rename(&staging, &self.path).map_err(|e| self.io_error(e))
    }
}

impl CategoryStore for JsonStore {
    fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<CategoryRecord>, StoreError> {
        Ok(self.catalog.find_by_external_id(external_id).cloned())
    }

    fn load(&self, id: CategoryId) -> Result<CategoryRecord, StoreError> {
        self.catalog.load(id)
    }

    fn save(&mut self, record: CategoryRecord) -> Result<CategoryId, StoreError> {
        let applied = self.catalog.apply(record, Utc::now())?;
        if let Err(err) = self.persist() {
            debug!("Persisting category {} failed, rolling back", applied.id);
            self.catalog.undo(applied);
            return Err(err);
        }
        Ok(applied.id)
    }

    fn all(&self) -> Result<Vec<CategoryRecord>, StoreError> {
        Ok(self.catalog.categories.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::OLD_CATEGORY_ID;
    use tempfile::tempdir;

    fn named(name: &str, parent: CategoryId, external: &str) -> CategoryRecord {
        let mut record = CategoryRecord::blank();
        record.name = name.to_string();
        record.parent_id = Some(parent);
        record.set_attribute(OLD_CATEGORY_ID, external);
        record
    }

    #[test]
    fn bootstrap_contains_root_catalog_and_default_category() {
        let store = MemoryStore::new();
        let all = store.all().expect("all");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, Some(ROOT_CATALOG_ID));
        assert_eq!(all[0].parent_id, None);
        assert_eq!(all[1].id, Some(DEFAULT_ROOT_PARENT_ID));
        assert_eq!(all[1].parent_id, Some(ROOT_CATALOG_ID));
    }

    #[test]
    fn save_assigns_sequential_ids_and_timestamps() {
        let mut store = MemoryStore::new();
        let first = store
            .save(named("Shoes", DEFAULT_ROOT_PARENT_ID, "1"))
            .expect("save");
        let second = store.save(named("Sneakers", first, "2")).expect("save");
        assert_eq!(first, 3);
        assert_eq!(second, 4);
        let loaded = store.load(second).expect("load");
        assert!(loaded.created_at.is_some());
        assert!(loaded.updated_at.is_some());
    }

    #[test]
    fn find_returns_lowest_id_when_external_ids_collide() {
        let mut store = MemoryStore::new();
        let first = store
            .save(named("A", DEFAULT_ROOT_PARENT_ID, "7"))
            .expect("save");
        store
            .save(named("B", DEFAULT_ROOT_PARENT_ID, "7"))
            .expect("save");
        let found = store.find_by_external_id("7").expect("find").expect("match");
        assert_eq!(found.id, Some(first));
        assert!(store.find_by_external_id("8").expect("find").is_none());
    }

    #[test]
    fn save_rejects_invalid_records() {
        let mut store = MemoryStore::new();
        let err = store
            .save(named("  ", DEFAULT_ROOT_PARENT_ID, "1"))
            .expect_err("empty name");
        assert!(matches!(err, StoreError::EmptyName));

        let err = store.save(named("X", 99, "1")).expect_err("unknown parent");
        assert!(matches!(err, StoreError::UnknownParent(99)));

        let mut ghost = named("Ghost", DEFAULT_ROOT_PARENT_ID, "1");
        ghost.id = Some(42);
        let err = store.save(ghost).expect_err("unknown id");
        assert!(matches!(err, StoreError::NotFound(42)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn save_rejects_parent_cycles() {
        let mut store = MemoryStore::new();
        let top = store
            .save(named("Top", DEFAULT_ROOT_PARENT_ID, "1"))
            .expect("save");
        let child = store.save(named("Child", top, "2")).expect("save");

        let mut moved = store.load(top).expect("load");
        moved.parent_id = Some(child);
        let err = store.save(moved).expect_err("cycle");
        assert!(matches!(err, StoreError::ParentCycle { id, parent } if id == top && parent == child));

        let mut own = store.load(top).expect("load");
        own.parent_id = Some(top);
        assert!(store.save(own).is_err());
    }

    #[test]
    fn update_keeps_created_at() {
        let mut store = MemoryStore::new();
        let id = store
            .save(named("Shoes", DEFAULT_ROOT_PARENT_ID, "1"))
            .expect("save");
        let created = store.load(id).expect("load").created_at;
        let mut record = store.load(id).expect("load");
        record.name = "Footwear".to_string();
        store.save(record).expect("update");
        let reloaded = store.load(id).expect("load");
        assert_eq!(reloaded.created_at, created);
        assert_eq!(reloaded.name, "Footwear");
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn json_store_writes_on_save_and_reloads() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("var").join("catalog.json");

        let mut store = JsonStore::open(&path).expect("open");
        assert!(!path.exists(), "nothing written before first save");
        let id = store
            .save(named("Shoes", DEFAULT_ROOT_PARENT_ID, "1"))
            .expect("save");
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let reopened = JsonStore::open(&path).expect("reopen");
        let found = reopened
            .find_by_external_id("1")
            .expect("find")
            .expect("persisted");
        assert_eq!(found.id, Some(id));
        assert_eq!(found.name, "Shoes");
        assert_eq!(reopened.all().expect("all").len(), 3);
    }

    #[test]
    fn json_store_failed_save_leaves_state_untouched() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("catalog.json");
        let mut store = JsonStore::open(&path).expect("open");
        assert!(store.save(named("", DEFAULT_ROOT_PARENT_ID, "1")).is_err());
        assert!(!path.exists());
        assert_eq!(store.all().expect("all").len(), 2);
    }

    #[test]
    fn lookup_follows_changed_external_ids() {
        let mut store = MemoryStore::new();
        let id = store
            .save(named("Shoes", DEFAULT_ROOT_PARENT_ID, "1"))
            .expect("save");
        let mut record = store.load(id).expect("load");
        record.set_attribute(OLD_CATEGORY_ID, "100");
        store.save(record).expect("update");

        assert!(store.find_by_external_id("1").expect("find").is_none());
        let found = store.find_by_external_id("100").expect("find").expect("moved key");
        assert_eq!(found.id, Some(id));
    }

    #[test]
    fn json_store_rolls_back_when_the_document_cannot_be_written() {
        let dir = tempdir().expect("temp dir");
        let var = dir.path().join("var");
        let path = var.join("catalog.json");
        let mut store = JsonStore::open(&path).expect("open");
        let shoes = store
            .save(named("Shoes", DEFAULT_ROOT_PARENT_ID, "1"))
            .expect("save");

        fs::remove_dir_all(&var).expect("remove var");
        fs::write(&var, "not a directory").expect("block var");

        let err = store
            .save(named("Sneakers", shoes, "2"))
            .expect_err("parent of the store is a file");
        assert!(matches!(err, StoreError::Io { .. }));
        let mut renamed = store.load(shoes).expect("load");
        renamed.name = "Footwear".to_string();
        renamed.set_attribute(OLD_CATEGORY_ID, "10");
        assert!(store.save(renamed).is_err());

        assert_eq!(store.all().expect("all").len(), 3);
        assert!(store.find_by_external_id("2").expect("find").is_none());
        assert!(store.find_by_external_id("10").expect("find").is_none());
        let kept = store.find_by_external_id("1").expect("find").expect("kept");
        assert_eq!(kept.name, "Shoes");

        fs::remove_file(&var).expect("unblock var");
        let sneakers = store
            .save(named("Sneakers", shoes, "2"))
            .expect("save after recovery");
        assert_eq!(sneakers, shoes + 1, "failed save does not burn an id");
        let reopened = JsonStore::open(&path).expect("reopen");
        assert_eq!(reopened.all().expect("all").len(), 4);
        assert_eq!(
            reopened.find_by_external_id("2").expect("find").and_then(|r| r.id),
            Some(sneakers)
        );
    }

    #[test]
    fn reloaded_documents_rebuild_the_lookup() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("catalog.json");
        let mut store = JsonStore::open(&path).expect("open");
        let first = store
            .save(named("A", DEFAULT_ROOT_PARENT_ID, "7"))
            .expect("save");
        store
            .save(named("B", DEFAULT_ROOT_PARENT_ID, "7"))
            .expect("save");

        let reopened = JsonStore::open(&path).expect("reopen");
        let found = reopened.find_by_external_id("7").expect("find").expect("match");
        assert_eq!(found.id, Some(first));
        assert!(reopened.find_by_external_id("").expect("find").is_none());
    }

    #[test]
    fn json_store_reports_corrupt_documents() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("catalog.json");
        fs::write(&path, "{ not json").expect("write");
        let err = JsonStore::open(&path).expect_err("corrupt");
        assert!(matches!(err, StoreError::Json { .. }));
    }
}

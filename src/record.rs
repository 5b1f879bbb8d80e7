use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type CategoryId = u64;

/// Internal id of the top-level "Root Catalog" in a bootstrapped store.
pub const ROOT_CATALOG_ID: CategoryId = 1;
/// Internal id of the "Default Category" that imported root rows hang under.
pub const DEFAULT_ROOT_PARENT_ID: CategoryId = 2;

/// Custom attribute carrying the import file's `id`, used as the reconciliation key.
pub const OLD_CATEGORY_ID: &str = "old_category_id";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryRecord {
    /// Assigned by the store on first save.
    pub id: Option<CategoryId>,
    pub parent_id: Option<CategoryId>,
    pub name: String,
    pub is_active: bool,
    pub include_in_menu: bool,
    pub is_anchor: bool,
    pub custom_use_parent_settings: bool,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CategoryRecord {
    pub fn blank() -> Self {
        CategoryRecord {
            id: None,
            parent_id: None,
            name: String::new(),
            is_active: true,
            include_in_menu: true,
            is_anchor: true,
            custom_use_parent_settings: true,
            attributes: BTreeMap::new(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn external_id(&self) -> Option<&str> {
        self.attributes.get(OLD_CATEGORY_ID).map(String::as_str)
    }

    pub fn attribute(&self, code: &str) -> Option<&str> {
        self.attributes.get(code).map(String::as_str)
    }

    pub fn set_attribute(&mut self, code: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(code.into(), value.into());
    }
}

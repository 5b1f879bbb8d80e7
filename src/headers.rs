//! Header row mapping.
//!
//! Every recognised column is described up front by [`FieldKind`]: the three
//! required reconciliation fields, the boolean flags that default to `true`,
//! and free-form string attributes. The additional attribute set starts from
//! [`DEFAULT_ADDITIONAL_FIELDS`] and can be extended per run through
//! [`HeaderConfig::with_additional`]. Matching is exact and case-sensitive on
//! the header cell value, so columns may appear in any order.

use std::collections::BTreeMap;

use itertools::Itertools;

use crate::{error::ImportError, record::OLD_CATEGORY_ID};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RequiredField {
    Id,
    Name,
    ParentId,
}

impl RequiredField {
    pub const ALL: [RequiredField; 3] = [
        RequiredField::Id,
        RequiredField::Name,
        RequiredField::ParentId,
    ];

    pub fn code(self) -> &'static str {
        match self {
            RequiredField::Id => "id",
            RequiredField::Name => "name",
            RequiredField::ParentId => "parent_id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FlagField {
    IsActive,
    IsAnchor,
    IncludeInMenu,
    CustomUseParentSettings,
}

impl FlagField {
    pub const ALL: [FlagField; 4] = [
        FlagField::IsActive,
        FlagField::IsAnchor,
        FlagField::IncludeInMenu,
        FlagField::CustomUseParentSettings,
    ];

    pub fn code(self) -> &'static str {
        match self {
            FlagField::IsActive => "is_active",
            FlagField::IsAnchor => "is_anchor",
            FlagField::IncludeInMenu => "include_in_menu",
            FlagField::CustomUseParentSettings => "custom_use_parent_settings",
        }
    }
}

pub const DEFAULT_ADDITIONAL_FIELDS: &[&str] = &[
    "description",
    "meta_title",
    "meta_keywords",
    "meta_description",
    "url_key",
    "url_path",
    "position",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Required(RequiredField),
    Flag(FlagField),
    Additional(String),
}

/// The set of column names recognised for one import run.
#[derive(Debug, Clone)]
pub struct HeaderConfig {
    additional: Vec<String>,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        HeaderConfig {
            additional: DEFAULT_ADDITIONAL_FIELDS
                .iter()
                .map(|code| code.to_string())
                .collect(),
        }
    }
}

impl HeaderConfig {
    /// Extends the built-in additional attributes with user supplied codes.
    ///
    /// Codes are trimmed; blanks, duplicates, and codes that collide with a
    /// required field, a flag, or `old_category_id` are dropped.
    pub fn with_additional<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extra = codes
            .into_iter()
            .map(|code| code.as_ref().trim().to_string())
            .filter(|code| !code.is_empty())
            .filter(|code| !is_reserved(code))
            .collect::<Vec<_>>();
        let additional = DEFAULT_ADDITIONAL_FIELDS
            .iter()
            .map(|code| code.to_string())
            .chain(extra)
            .unique()
            .collect();
        HeaderConfig { additional }
    }

    /// Parses the comma separated `--additional` option.
    pub fn from_option(list: Option<&str>) -> Self {
        match list {
            Some(list) => HeaderConfig::with_additional(list.split(',')),
            None => HeaderConfig::default(),
        }
    }

    pub fn additional(&self) -> &[String] {
        &self.additional
    }

    pub fn field_kind(&self, header: &str) -> Option<FieldKind> {
        if let Some(field) = RequiredField::ALL.into_iter().find(|f| f.code() == header) {
            return Some(FieldKind::Required(field));
        }
        if let Some(flag) = FlagField::ALL.into_iter().find(|f| f.code() == header) {
            return Some(FieldKind::Flag(flag));
        }
        self.additional
            .iter()
            .find(|code| code.as_str() == header)
            .map(|code| FieldKind::Additional(code.clone()))
    }
}

fn is_reserved(code: &str) -> bool {
    code == OLD_CATEGORY_ID
        || RequiredField::ALL.iter().any(|f| f.code() == code)
        || FlagField::ALL.iter().any(|f| f.code() == code)
}

/// Column positions resolved from the header row. Immutable once built.
#[derive(Debug, Clone)]
pub struct HeaderMap {
    id: usize,
    name: usize,
    parent_id: usize,
    flags: BTreeMap<FlagField, usize>,
    additional: BTreeMap<String, usize>,
}

impl HeaderMap {
    /// Maps header cells to positions. When a name repeats, the last column wins.
    pub fn map(header_row: &[String], config: &HeaderConfig) -> Result<Self, ImportError> {
        let mut required = BTreeMap::new();
        let mut flags = BTreeMap::new();
        let mut additional = BTreeMap::new();
        for (idx, cell) in header_row.iter().enumerate() {
            match config.field_kind(cell) {
                Some(FieldKind::Required(field)) => {
                    required.insert(field, idx);
                }
                Some(FieldKind::Flag(flag)) => {
                    flags.insert(flag, idx);
                }
                Some(FieldKind::Additional(code)) => {
                    additional.insert(code, idx);
                }
                None => {}
            }
        }
        let position = |field: RequiredField| {
            required
                .get(&field)
                .copied()
                .ok_or(ImportError::MissingRequiredHeader(field.code()))
        };
        Ok(HeaderMap {
            id: position(RequiredField::Id)?,
            name: position(RequiredField::Name)?,
            parent_id: position(RequiredField::ParentId)?,
            flags,
            additional,
        })
    }

    pub fn position(&self, field: RequiredField) -> usize {
        match field {
            RequiredField::Id => self.id,
            RequiredField::Name => self.name,
            RequiredField::ParentId => self.parent_id,
        }
    }

    /// Cell for a required field, `None` when the row is too short.
    pub fn value<'r>(&self, cells: &'r [String], field: RequiredField) -> Option<&'r str> {
        cells.get(self.position(field)).map(String::as_str)
    }

    pub fn has_flag(&self, flag: FlagField) -> bool {
        self.flags.contains_key(&flag)
    }

    /// `"1"` is true and any other present value is false. An unmapped column
    /// or a missing cell yields `default`.
    pub fn flag(&self, cells: &[String], flag: FlagField, default: bool) -> bool {
        match self.flags.get(&flag).and_then(|&idx| cells.get(idx)) {
            Some(value) => value == "1",
            None => default,
        }
    }

    pub fn additional_codes(&self) -> impl Iterator<Item = &str> {
        self.additional.keys().map(String::as_str)
    }

    /// Additional attributes that are both mapped and present in `cells`.
    pub fn additional_values<'a>(
        &'a self,
        cells: &'a [String],
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.additional.iter().filter_map(move |(code, &idx)| {
            cells
                .get(idx)
                .map(|value| (code.as_str(), value.as_str()))
        })
    }
}

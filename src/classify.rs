//! Root/child partitioning of data rows.

use crate::headers::{HeaderMap, RequiredField};

/// One data row with the 1-based line it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRow {
    pub line: usize,
    pub cells: Vec<String>,
}

impl CategoryRow {
    pub fn new(line: usize, cells: Vec<String>) -> Self {
        CategoryRow { line, cells }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Root,
    Child,
}

/// Rows split by kind, each list in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub roots: Vec<CategoryRow>,
    pub children: Vec<CategoryRow>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.roots.len() + self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty() && self.children.is_empty()
    }
}

/// A parent reference that points nowhere: missing, empty, `NULL`/`null`, or `0`.
pub fn is_root_reference(value: Option<&str>) -> bool {
    matches!(value, None | Some("" | "NULL" | "null" | "0"))
}

pub fn row_kind(headers: &HeaderMap, cells: &[String]) -> RowKind {
    if is_root_reference(headers.value(cells, RequiredField::ParentId)) {
        RowKind::Root
    } else {
        RowKind::Child
    }
}

pub fn classify_rows<I>(headers: &HeaderMap, rows: I) -> Partition
where
    I: IntoIterator<Item = CategoryRow>,
{
    let mut partition = Partition::default();
    for row in rows {
        match row_kind(headers, &row.cells) {
            RowKind::Root => partition.roots.push(row),
            RowKind::Child => partition.children.push(row),
        }
    }
    partition
}

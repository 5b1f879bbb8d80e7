//! Two-phase hierarchical reconciliation.
//!
//! [`prepare`] does everything that can fail fatally: it reads the input,
//! maps the header row, and partitions the data rows. Nothing touches the
//! store until it succeeds. [`CategoryImporter::import`] then upserts every
//! root row followed by every child row, both in file order. A row that
//! fails is recorded in the [`ImportReport`] and the run moves on.
//!
//! Rows are matched to stored categories through the `old_category_id`
//! attribute, never through internal ids, so running the same file twice
//! updates the categories created by the first run.
//!
//! Child rows are not ordered among themselves. A row whose parent is another
//! child row resolves only when that parent appears earlier in the file.

use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::{
    classify::{CategoryRow, Partition, RowKind, classify_rows},
    error::ImportError,
    headers::{FlagField, HeaderConfig, HeaderMap, RequiredField},
    io_utils,
    record::{CategoryId, DEFAULT_ROOT_PARENT_ID, OLD_CATEGORY_ID},
    report::{ImportReport, RowError, SkipReason},
    settings::ImportSettings,
    store::CategoryStore,
};

/// Header mapping and partitioned rows, ready to reconcile.
#[derive(Debug, Clone)]
pub struct ImportPlan {
    pub headers: HeaderMap,
    pub partition: Partition,
}

pub fn prepare(settings: &ImportSettings) -> Result<ImportPlan> {
    info!(
        "Reading categories from {:?} (delimiter '{}')",
        settings.input,
        crate::printable_delimiter(settings.delimiter)
    );
    let data = io_utils::read_input(&settings.input)?;
    let records = io_utils::read_records(&data, settings.delimiter, settings.encoding)
        .with_context(|| format!("Reading categories from {:?}", settings.input))?;
    let plan = plan_from_records(records, &settings.headers, &settings.input)?;
    info!(
        "Found {} root and {} child categor(ies)",
        plan.partition.roots.len(),
        plan.partition.children.len()
    );
    Ok(plan)
}

/// Splits off the header row, maps it, and classifies the remaining records.
pub fn plan_from_records<I>(
    records: I,
    config: &HeaderConfig,
    source: &Path,
) -> Result<ImportPlan, ImportError>
where
    I: IntoIterator<Item = (usize, Vec<String>)>,
{
    let mut records = records.into_iter();
    let (_, header_row) = records
        .next()
        .ok_or_else(|| ImportError::EmptyInput(source.to_path_buf()))?;
    let headers = HeaderMap::map(&header_row, config)?;
    debug!(
        "Mapped additional attribute column(s): {:?}",
        headers.additional_codes().collect::<Vec<_>>()
    );
    let rows = records.map(|(line, cells)| CategoryRow::new(line, cells));
    let partition = classify_rows(&headers, rows);
    Ok(ImportPlan { headers, partition })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created(CategoryId),
    Updated(CategoryId),
}

impl UpsertOutcome {
    pub fn id(self) -> CategoryId {
        match self {
            UpsertOutcome::Created(id) | UpsertOutcome::Updated(id) => id,
        }
    }
}

pub struct CategoryImporter<'a, S: CategoryStore> {
    store: &'a mut S,
    headers: &'a HeaderMap,
    root_parent_id: CategoryId,
}

impl<'a, S: CategoryStore> CategoryImporter<'a, S> {
    pub fn new(store: &'a mut S, headers: &'a HeaderMap) -> Self {
        CategoryImporter {
            store,
            headers,
            root_parent_id: DEFAULT_ROOT_PARENT_ID,
        }
    }

    pub fn with_root_parent(mut self, id: CategoryId) -> Self {
        self.root_parent_id = id;
        self
    }

    /// Roots first, then children; each phase in file order.
    pub fn import(&mut self, partition: &Partition) -> ImportReport {
        let mut report = ImportReport::default();
        info!(
            "Upserting {} root categor(ies) under parent {}",
            partition.roots.len(),
            self.root_parent_id
        );
        for row in &partition.roots {
            report.roots += 1;
            self.apply(row, RowKind::Root, &mut report);
        }
        info!("Upserting {} child categor(ies)", partition.children.len());
        for row in &partition.children {
            report.children += 1;
            self.apply(row, RowKind::Child, &mut report);
        }
        info!(
            "Processed {} row(s): {} created, {} updated, {} skipped",
            report.processed(),
            report.created,
            report.updated,
            report.errors.len()
        );
        report
    }

    fn apply(&mut self, row: &CategoryRow, kind: RowKind, report: &mut ImportReport) {
        match self.upsert(row, kind) {
            Ok(UpsertOutcome::Created(id)) => {
                debug!("Line {}: created category {id}", row.line);
                report.created += 1;
            }
            Ok(UpsertOutcome::Updated(id)) => {
                debug!("Line {}: updated category {id}", row.line);
                report.updated += 1;
            }
            Err(error) => {
                warn!("Line {}: {error}", row.line);
                report.record_error(error);
            }
        }
    }

    /// Finds or creates the category for `row`, links its parent, and saves it.
    pub fn upsert(
        &mut self,
        row: &CategoryRow,
        kind: RowKind,
    ) -> Result<UpsertOutcome, RowError> {
        let cells = &row.cells;
        let name = self
            .headers
            .value(cells, RequiredField::Name)
            .unwrap_or_default();
        let skip = |reason: SkipReason| RowError::new(row.line, name, reason);

        let external_id = match self.headers.value(cells, RequiredField::Id) {
            Some(id) if !id.is_empty() => id,
            _ => return Err(skip(SkipReason::EmptyExternalId)),
        };

        let existing = self
            .store
            .find_by_external_id(external_id)
            .map_err(|e| skip(e.into()))?
            .and_then(|found| found.id);
        let mut record = match existing {
            Some(id) => self.store.load(id).map_err(|e| skip(e.into()))?,
            None => self.store.create(),
        };

        record.name = name.to_string();
        record.is_active = self.headers.flag(cells, FlagField::IsActive, true);
        record.include_in_menu = self.headers.flag(cells, FlagField::IncludeInMenu, true);
        record.parent_id = Some(match kind {
            RowKind::Root => self.root_parent_id,
            RowKind::Child => self.resolve_parent(cells).map_err(skip)?,
        });
        record.is_anchor = self.headers.flag(cells, FlagField::IsAnchor, true);
        record.custom_use_parent_settings =
            self.headers.flag(cells, FlagField::CustomUseParentSettings, true);
        record.set_attribute(OLD_CATEGORY_ID, external_id);
        for (code, value) in self.headers.additional_values(cells) {
            record.set_attribute(code, value);
        }

        let id = self.store.save(record).map_err(|e| skip(e.into()))?;
        Ok(match existing {
            Some(_) => UpsertOutcome::Updated(id),
            None => UpsertOutcome::Created(id),
        })
    }

    fn resolve_parent(&self, cells: &[String]) -> Result<CategoryId, SkipReason> {
        let parent_ref = self
            .headers
            .value(cells, RequiredField::ParentId)
            .unwrap_or_default();
        let parent = self.store.find_by_external_id(parent_ref)?;
        parent
            .and_then(|record| record.id)
            .ok_or_else(|| SkipReason::MissingParent {
                parent_external_id: parent_ref.to_string(),
            })
    }
}

//! Row-level failures and the end-of-run report.

use std::{fmt, io};

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("does not have existing parent category!")]
    MissingParent { parent_external_id: String },
    #[error("does not have an id!")]
    EmptyExternalId,
    #[error("could not be saved: {0}")]
    Store(#[from] StoreError),
}

/// A skipped row: where it came from, which category, and why.
#[derive(Debug)]
pub struct RowError {
    pub line: usize,
    pub name: String,
    pub reason: SkipReason,
}

impl RowError {
    pub fn new(line: usize, name: impl Into<String>, reason: impl Into<SkipReason>) -> Self {
        RowError {
            line,
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ERROR (RECORD SKIPPED): Category \"{}\" {}",
            self.name, self.reason
        )
    }
}

impl std::error::Error for RowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.reason)
    }
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub roots: usize,
    pub children: usize,
    pub created: usize,
    pub updated: usize,
    pub errors: Vec<RowError>,
}

impl ImportReport {
    pub fn record_error(&mut self, error: RowError) {
        self.errors.push(error);
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn processed(&self) -> usize {
        self.roots + self.children
    }

    pub fn messages(&self) -> impl Iterator<Item = String> + '_ {
        self.errors
            .iter()
            .map(|error| format!("Line {}: {error}", error.line))
    }

    pub fn write_to<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        if self.is_clean() {
            writeln!(out, "Import completed successfully!")?;
            return Ok(());
        }
        writeln!(out, "There was {} errors:", self.errors.len())?;
        for message in self.messages() {
            writeln!(out, "{message}")?;
        }
        Ok(())
    }
}

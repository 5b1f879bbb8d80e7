//! Fatal, run-aborting errors.
//!
//! Anything in here stops the import before a single row is reconciled.
//! Row-level failures live in [`crate::report`] instead.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Please specify path to file! (eg. \"var/import/categories.csv\")")]
    MissingPath,
    #[error("File {} does not exist!", .0.display())]
    FileNotFound(PathBuf),
    #[error("File {} does not contain a header row", .0.display())]
    EmptyInput(PathBuf),
    #[error("Required header \"{0}\" is missing, please fix file")]
    MissingRequiredHeader(&'static str),
}

//! Validated run configuration built from command-line arguments.

use std::path::PathBuf;

use anyhow::Result;
use encoding_rs::Encoding;

use crate::{
    cli::{ImportArgs, TreeArgs},
    error::ImportError,
    headers::HeaderConfig,
    io_utils,
    record::CategoryId,
};

#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub input: PathBuf,
    pub store: PathBuf,
    pub delimiter: u8,
    pub encoding: &'static Encoding,
    pub headers: HeaderConfig,
    pub root_parent_id: CategoryId,
}

impl ImportSettings {
    /// Checks the fatal preconditions: a path was given, the encoding is
    /// known, and the resolved input file exists.
    pub fn from_args(args: &ImportArgs) -> Result<Self> {
        let path = args.path.as_deref().ok_or(ImportError::MissingPath)?;
        let input = io_utils::resolve_under_root(&args.root, path);
        let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
        if !input.is_file() {
            return Err(ImportError::FileNotFound(input).into());
        }
        Ok(ImportSettings {
            input,
            store: io_utils::resolve_under_root(&args.root, &args.store),
            delimiter: args.delimiter,
            encoding,
            headers: HeaderConfig::from_option(args.additional.as_deref()),
            root_parent_id: args.root_parent_id,
        })
    }
}

pub fn store_path(args: &TreeArgs) -> PathBuf {
    io_utils::resolve_under_root(&args.root, &args.store)
}

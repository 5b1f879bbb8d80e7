use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::record::{CategoryId, DEFAULT_ROOT_PARENT_ID};

#[derive(Debug, Parser)]
#[command(author, version, about = "Import category hierarchies from CSV files", long_about = None)]
pub struct Cli {
    /// Print debug logging and the full error chain on failure
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the category importer against a delimited file
    #[command(visible_alias = "import:categories")]
    Import(ImportArgs),
    /// Print the category hierarchy held in the catalog store
    Tree(TreeArgs),
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Path to the CSV file inside the application root (eg. "var/import/categories.csv")
    #[arg(short, long)]
    pub path: Option<PathBuf>,
    /// Custom category attribute codes separated by comma (eg. "my_custom_1,my_custom2")
    #[arg(short, long)]
    pub additional: Option<String>,
    /// Application root directory that relative paths are resolved against
    #[arg(long, env = "CATEGORY_IMPORTER_ROOT", default_value = ".")]
    pub root: PathBuf,
    /// Catalog store document, relative to the application root
    #[arg(long, env = "CATEGORY_IMPORTER_STORE", default_value = "var/catalog.json")]
    pub store: PathBuf,
    /// CSV delimiter character (supports ';', ',', 'tab', '|')
    #[arg(long, value_parser = parse_delimiter, default_value = ";")]
    pub delimiter: u8,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Internal id of the category that root rows are attached to
    #[arg(long = "root-parent-id", default_value_t = DEFAULT_ROOT_PARENT_ID)]
    pub root_parent_id: CategoryId,
}

#[derive(Debug, Args)]
pub struct TreeArgs {
    /// Application root directory that relative paths are resolved against
    #[arg(long, env = "CATEGORY_IMPORTER_ROOT", default_value = ".")]
    pub root: PathBuf,
    /// Catalog store document, relative to the application root
    #[arg(long, env = "CATEGORY_IMPORTER_STORE", default_value = "var/catalog.json")]
    pub store: PathBuf,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

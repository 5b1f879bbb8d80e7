pub mod classify;
pub mod cli;
pub mod error;
pub mod headers;
pub mod importer;
pub mod io_utils;
pub mod record;
pub mod report;
pub mod settings;
pub mod store;
pub mod tree;

use std::{env, io, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands},
    importer::CategoryImporter,
    settings::ImportSettings,
    store::{CategoryStore, JsonStore},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging(verbose: bool) {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            let level = if verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            };
            builder.filter_module("category_importer", level);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let result = match cli.command {
        Commands::Import(args) => handle_import(&args),
        Commands::Tree(args) => handle_tree(&args),
    };
    if cli.verbose {
        if let Err(err) = &result {
            eprintln!("{err:?}");
        }
    }
    result
}

fn handle_import(args: &cli::ImportArgs) -> Result<()> {
    let settings = ImportSettings::from_args(args)?;
    let plan = importer::prepare(&settings)?;
    let mut store = JsonStore::open(&settings.store)
        .with_context(|| format!("Opening catalog store {:?}", settings.store))?;
    info!("Reconciling against catalog store {:?}", store.path());
    let report = CategoryImporter::new(&mut store, &plan.headers)
        .with_root_parent(settings.root_parent_id)
        .import(&plan.partition);
    report
        .write_to(&mut io::stdout().lock())
        .context("Writing import report")?;
    Ok(())
}

fn handle_tree(args: &cli::TreeArgs) -> Result<()> {
    let path = settings::store_path(args);
    let store =
        JsonStore::open(&path).with_context(|| format!("Opening catalog store {path:?}"))?;
    let records = store.all()?;
    print!("{}", tree::render_tree(&records));
    info!("Listed {} categor(ies) from {:?}", records.len(), path);
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}

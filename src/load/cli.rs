//! Implementation of the `dump` sub command.

use std::path::PathBuf;

use clap::Parser;

use crate::adaptor;
use crate::common;
use crate::load;
use crate::registry::Registry;

/// Command line arguments for the `dump` sub command.
#[derive(Parser, Debug, Clone)]
#[command(about = "Load a registry and dump it as JSON", long_about = None)]
pub struct Args {
    /// Path to a registry configuration file (.ini or .json).
    #[arg(long, env = "ENSEMBL_REGISTRY")]
    pub config: Option<PathBuf>,
    /// Registry URL (`mysql://...`) to load instead of a file.
    #[arg(long, conflicts_with = "config")]
    pub url: Option<String>,
    /// Disable downstream caches on the created adaptors.
    #[arg(long)]
    pub no_cache: bool,
}

/// Main entry point for the `dump` sub command.
pub fn run(common: &common::cli::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("Starting 'dump' command");
    tracing::info!("common = {:#?}", &common);
    tracing::info!("args = {:#?}", &args);

    let registry = Registry::new();
    let connector = adaptor::default_connector()?;
    let registered = match &args.url {
        Some(url) => load::url::load_registry_from_url(&registry, &connector, url)?,
        None => load::load_all(&registry, &connector, args.config.as_deref(), args.no_cache)?,
    };
    tracing::info!("registered {} adaptors", registered);

    let config = load::structured::serialise_registry(&registry);
    println!("{}", serde_json::to_string_pretty(&config)?);

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    use clap_verbosity_flag::Verbosity;

    #[test]
    fn smoke_test_dump() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("registry.ini");
        std::fs::write(&path, "[human_core]\nspecies=human\ngroup=core\ndbname=db\n")?;

        let common = common::cli::Args {
            verbose: Verbosity::new(1, 0),
        };
        let args = Args {
            config: Some(path),
            url: None,
            no_cache: false,
        };

        run(&common, &args)
    }
}

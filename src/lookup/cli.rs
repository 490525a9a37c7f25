//! Implementation of the `locate` sub command.

use std::path::PathBuf;

use clap::Parser;

use crate::adaptor;
use crate::common;
use crate::group::Group;
use crate::load;
use crate::lookup::{get_species_and_object_type, LocateOptions};
use crate::registry::Registry;

/// Command line arguments for the `locate` sub command.
#[derive(Parser, Debug, Clone)]
#[command(about = "Resolve stable ids to (species, type, group)", long_about = None)]
pub struct Args {
    /// Path to a registry configuration file (.ini or .json).
    #[arg(long, env = "ENSEMBL_REGISTRY")]
    pub config: Option<PathBuf>,
    /// Registry URL (`mysql://...`) to load instead of a file.
    #[arg(long, conflicts_with = "config")]
    pub url: Option<String>,
    /// Restrict the lookup to one species.
    #[arg(long)]
    pub species: Option<String>,
    /// Restrict the lookup to one object type (e.g. "gene").
    #[arg(long)]
    pub object_type: Option<String>,
    /// Restrict the lookup to one database group.
    #[arg(long)]
    pub db_type: Option<String>,
    /// Skip the indexed lookup database even when one is registered.
    #[arg(long)]
    pub force_long_lookup: bool,
    /// Stable ids to resolve.
    #[arg(required = true)]
    pub stable_ids: Vec<String>,
}

/// Main entry point for the `locate` sub command.
pub fn run(common: &common::cli::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("Starting 'locate' command");
    tracing::info!("common = {:#?}", &common);
    tracing::info!("args = {:#?}", &args);

    let db_type = args
        .db_type
        .as_deref()
        .map(|name| {
            name.parse::<Group>()
                .map_err(|_| anyhow::anyhow!("unknown group '{name}'"))
        })
        .transpose()?;

    let registry = Registry::new();
    let connector = adaptor::default_connector()?;
    match &args.url {
        Some(url) => load::url::load_registry_from_url(&registry, &connector, url)?,
        None => load::load_all(&registry, &connector, args.config.as_deref(), false)?,
    };

    let opts = LocateOptions {
        species: args.species.clone(),
        object_type: args.object_type.clone(),
        db_type,
        force_long_lookup: args.force_long_lookup,
    };
    for stable_id in &args.stable_ids {
        let value = match get_species_and_object_type(&registry, stable_id, &opts)? {
            Some(owner) => serde_json::json!({
                "stable_id": stable_id,
                "species": owner.species,
                "object_type": owner.object_type,
                "group": owner.group,
            }),
            None => serde_json::json!({
                "stable_id": stable_id,
                "species": serde_json::Value::Null,
            }),
        };
        println!("{}", serde_json::to_string(&value)?);
    }

    Ok(())
}

//! Implementation of the `classify` sub command.

use clap::Parser;

use crate::classify::{canonical_species_and_group, Classifier};
use crate::common;

/// Command line arguments for the `classify` sub command.
#[derive(Parser, Debug, Clone)]
#[command(about = "Classify database names against a release", long_about = None)]
pub struct Args {
    /// Release version to classify against.
    #[arg(long)]
    pub release: u32,
    /// Database names to classify.
    #[arg(required = true)]
    pub dbnames: Vec<String>,
}

/// Main entry point for the `classify` sub command.
pub fn run(common: &common::cli::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("Starting 'classify' command");
    tracing::info!("common = {:#?}", &common);
    tracing::info!("args = {:#?}", &args);

    let classifier = Classifier::new();
    for dbname in &args.dbnames {
        let value = match classifier.classify(dbname, args.release) {
            Some(classification) => {
                let (species, group) = canonical_species_and_group(&classification);
                serde_json::json!({
                    "dbname": dbname,
                    "group": group,
                    "species": species,
                    "multispecies": classification.multispecies,
                })
            }
            None => serde_json::json!({
                "dbname": dbname,
                "group": serde_json::Value::Null,
            }),
        };
        println!("{}", serde_json::to_string(&value)?);
    }

    Ok(())
}

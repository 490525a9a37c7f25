use clap::{command, Parser, Subcommand};
use ensembl_registry::{classify, common, load, lookup};

/// CLI parser based on clap.
#[derive(Debug, Clone, Parser)]
#[command(
    author,
    version,
    about = "Registry of versioned biological database sources",
    long_about = "Resolve (species, group) pairs and stable identifiers \
                  against a collection of release-versioned databases."
)]
struct Cli {
    /// Commonly used arguments
    #[command(flatten)]
    common: common::cli::Args,

    /// The sub command to run
    #[command(subcommand)]
    command: Commands,
}

/// Enum supporting the parsing of top-level commands.
#[derive(Debug, Subcommand, Clone)]
enum Commands {
    /// "classify" sub command
    Classify(classify::cli::Args),
    /// "dump" sub command
    Dump(load::cli::Args),
    /// "locate" sub command
    Locate(lookup::cli::Args),
}

pub fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Build a tracing subscriber according to the configuration in `cli.common`.
    let collector = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(match cli.common.verbose.log_level() {
            Some(level) => match level {
                log::Level::Error => tracing::Level::ERROR,
                log::Level::Warn => tracing::Level::WARN,
                log::Level::Info => tracing::Level::INFO,
                log::Level::Debug => tracing::Level::DEBUG,
                log::Level::Trace => tracing::Level::TRACE,
            },
            None => tracing::Level::INFO,
        })
        .compact()
        .finish();

    tracing::subscriber::with_default(collector, || {
        match &cli.command {
            Commands::Classify(args) => classify::cli::run(&cli.common, args)?,
            Commands::Dump(args) => load::cli::run(&cli.common, args)?,
            Commands::Locate(args) => lookup::cli::run(&cli.common, args)?,
        }

        Ok::<(), anyhow::Error>(())
    })?;

    tracing::info!("All done! Have a nice day.");

    Ok(())
}

//! Populate a registry by enumerating the databases on one server.
//!
//! One connection is opened for the whole scan, the candidate databases
//! are listed with two `SHOW DATABASES LIKE` patterns, and the groups are
//! walked in catalog order; each database is consumed by the first group
//! that classifies it.

use std::collections::HashSet;
use std::sync::Arc;

use crate::adaptor::query::{Connector, QueryRunner};
use crate::adaptor::{AdaptorArgs, ConnectionParams, DbAdaptor};
use crate::classify::{canonical_species_and_group, Classifier};
use crate::common::{normalize_species, SOFTWARE_RELEASE};
use crate::error::Error;
use crate::group::GROUP_ORDER;
use crate::registry::Registry;

/// Options for one server scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Server host name.
    pub host: String,
    /// Server port; defaults to 3306 (see [`effective_port`] for the
    /// historical exception).
    pub port: Option<u16>,
    /// User name; defaults to `"ensro"`.
    pub user: Option<String>,
    /// Password.
    pub pass: Option<String>,
    /// Server-side wait timeout in seconds.
    pub wait_timeout: Option<u32>,
    /// Release to load; defaults to [`SOFTWARE_RELEASE`].
    pub db_version: Option<u32>,
    /// Restrict filterable groups to species starting with this prefix.
    pub species_filter: Option<String>,
    /// Suffix appended to every registered species and alias.
    pub species_suffix: String,
    /// Disable downstream caches on the created adaptors.
    pub no_cache: bool,
    /// Log every registration at info level.
    pub verbose: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: None,
            user: None,
            pass: None,
            wait_timeout: None,
            db_version: None,
            species_filter: None,
            species_suffix: String::new(),
            no_cache: false,
            verbose: false,
        }
    }
}

impl ScanOptions {
    /// Options for a scan of `host` with all defaults.
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            ..Default::default()
        }
    }
}

/// Port to connect to, honoring the pre-48 public archive layout.
fn effective_port(opts: &ScanOptions, version: u32) -> u16 {
    if let Some(port) = opts.port {
        return port;
    }
    if opts.host == "ensembldb.ensembl.org" && version < 48 {
        4306
    } else {
        3306
    }
}

/// Candidate database names with a consumed mark per entry.
///
/// Groups walk a snapshot of the unconsumed indexes, so consumption never
/// happens under an iterator over the list itself.
struct Candidates {
    names: Vec<String>,
    consumed: Vec<bool>,
}

impl Candidates {
    fn new(names: Vec<String>) -> Self {
        let consumed = vec![false; names.len()];
        Self { names, consumed }
    }

    fn unconsumed(&self) -> Vec<usize> {
        (0..self.names.len()).filter(|&i| !self.consumed[i]).collect()
    }

    fn name(&self, index: usize) -> &str {
        &self.names[index]
    }

    fn consume(&mut self, index: usize) {
        self.consumed[index] = true;
    }

    fn unconsumed_count(&self) -> usize {
        self.consumed.iter().filter(|&&c| !c).count()
    }
}

/// Scan one server and register every database matching the release.
///
/// Returns the number of adaptors registered.
pub fn load_registry_from_db(
    registry: &Registry,
    connector: &Arc<dyn Connector>,
    opts: &ScanOptions,
) -> Result<usize, Error> {
    let version = opts.db_version.unwrap_or(SOFTWARE_RELEASE);
    let server_params = ConnectionParams {
        host: opts.host.clone(),
        port: effective_port(opts, version),
        user: opts.user.clone().unwrap_or_else(|| String::from("ensro")),
        pass: opts.pass.clone(),
        wait_timeout: opts.wait_timeout.unwrap_or(0),
        ..Default::default()
    };
    // Connect eagerly so authentication problems surface before any work.
    let runner = connector.connect(&server_params)?;

    let mut names: Vec<String> = Vec::new();
    for pattern in [format!("%\\_{version}%"), String::from("userdata%")] {
        for row in runner.query(&format!("SHOW DATABASES LIKE '{pattern}'"), &[])? {
            if let Some(name) = row.into_iter().next().flatten() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
    }
    tracing::debug!("found {} candidate databases on {}", names.len(), opts.host);
    let mut candidates = Candidates::new(names);

    let classifier = Classifier::new();
    let factories = registry.factories();
    let filter = opts.species_filter.as_deref().map(normalize_species);
    let suffix = opts.species_suffix.as_str();
    let mut registered = 0;

    for &group in GROUP_ORDER {
        if !factories.has_module(group.module_id()) {
            tracing::warn!("no adaptor module available for group '{group}', skipping");
            continue;
        }

        let mut group_adaptors: Vec<Arc<DbAdaptor>> = Vec::new();
        for index in candidates.unconsumed() {
            let dbname = candidates.name(index).to_string();
            let Some(classification) = classifier.classify_for_group(&dbname, group, version)
            else {
                continue;
            };
            if let Some(filter) = &filter {
                if group.filterable() && !classification.encoded_name.starts_with(filter.as_str())
                {
                    continue;
                }
            }

            let (canonical, store_group) = canonical_species_and_group(&classification);
            let species_entries: Vec<(u32, String)> = if classification.multispecies {
                fetch_production_names(&runner, &dbname)?
            } else {
                vec![(1, canonical)]
            };

            for (species_id, species) in species_entries {
                let args = AdaptorArgs {
                    species: format!("{species}{suffix}"),
                    species_id,
                    group: store_group,
                    multispecies: classification.multispecies,
                    no_cache: opts.no_cache,
                    params: ConnectionParams {
                        dbname: dbname.clone(),
                        ..server_params.clone()
                    },
                };
                let dba = factories.create(args, connector.clone())?;
                registry.add_db_adaptor(dba.clone())?;
                group_adaptors.push(dba);
                registered += 1;
            }
            if opts.verbose {
                tracing::info!("registered '{dbname}' under group '{group}'");
            } else {
                tracing::debug!("registered '{dbname}' under group '{group}'");
            }
            candidates.consume(index);
        }

        if group.alias_available() {
            harvest_aliases(registry, &runner, &group_adaptors, suffix)?;
        }
        inject_default_aliases(registry, suffix);
    }

    let unmatched = candidates.unconsumed_count();
    if unmatched > 0 {
        tracing::debug!("{unmatched} databases did not classify into any group");
    }
    runner.disconnect_if_idle();
    Ok(registered)
}

/// `(species_id, production name)` pairs of a collection database.
fn fetch_production_names(
    runner: &Arc<dyn QueryRunner>,
    dbname: &str,
) -> Result<Vec<(u32, String)>, Error> {
    let sql = format!(
        "SELECT species_id, meta_value FROM {dbname}.meta \
         WHERE meta_key = 'species.production_name'"
    );
    let mut result = Vec::new();
    for row in runner.query(&sql, &[])? {
        let mut row = row.into_iter();
        let species_id = row
            .next()
            .flatten()
            .and_then(|v| v.parse::<u32>().ok())
            .ok_or_else(|| {
                Error::backend(format!("non-numeric species_id in {dbname}.meta"))
            })?;
        let Some(name) = row.next().flatten() else {
            continue;
        };
        result.push((species_id, name));
    }
    Ok(result)
}

/// Register the `species.alias` meta entries for every adaptor of a group.
///
/// Collection databases are harvested with one self-join batch query per
/// database; single-species databases with one plain query each.
fn harvest_aliases(
    registry: &Registry,
    runner: &Arc<dyn QueryRunner>,
    adaptors: &[Arc<DbAdaptor>],
    suffix: &str,
) -> Result<(), Error> {
    let mut harvested_collections: HashSet<String> = HashSet::new();
    for dba in adaptors {
        let dbname = &dba.params().dbname;
        if dba.is_multispecies() {
            if !harvested_collections.insert(dbname.clone()) {
                continue;
            }
            for (species, alias) in fetch_collection_aliases(runner, dbname)? {
                registry.add_alias(&format!("{species}{suffix}"), [format!("{alias}{suffix}")]);
            }
        } else {
            for alias in fetch_species_aliases(runner, dbname, None)? {
                registry.add_alias(dba.species(), [format!("{alias}{suffix}")]);
            }
        }
    }
    Ok(())
}

/// `(production name, alias)` pairs of a collection database, via one
/// batch self-join on the meta table.
fn fetch_collection_aliases(
    runner: &Arc<dyn QueryRunner>,
    dbname: &str,
) -> Result<Vec<(String, String)>, Error> {
    let sql = format!(
        "SELECT m1.meta_value, m2.meta_value \
         FROM {dbname}.meta m1 JOIN {dbname}.meta m2 ON m1.species_id = m2.species_id \
         WHERE m1.meta_key = 'species.production_name' AND m2.meta_key = 'species.alias'"
    );
    let mut result = Vec::new();
    for row in runner.query(&sql, &[])? {
        let mut row = row.into_iter();
        if let (Some(species), Some(alias)) = (row.next().flatten(), row.next().flatten()) {
            result.push((species, alias));
        }
    }
    Ok(result)
}

/// `species.alias` meta values of one database.
///
/// The `species_id` predicate is applied only when given, which callers
/// restrict to multi-species adaptors.
pub(crate) fn fetch_species_aliases(
    runner: &Arc<dyn QueryRunner>,
    dbname: &str,
    species_id: Option<u32>,
) -> Result<Vec<String>, Error> {
    let mut sql = format!(
        "SELECT meta_value FROM {dbname}.meta WHERE meta_key = 'species.alias'"
    );
    let id;
    let mut params: Vec<&str> = Vec::new();
    if let Some(species_id) = species_id {
        sql.push_str(" AND species_id = ?");
        id = species_id.to_string();
        params.push(&id);
    }
    Ok(runner
        .query(&sql, &params)?
        .into_iter()
        .filter_map(|row| row.into_iter().next().flatten())
        .collect())
}

/// Default aliases for the shared pseudo-species, injected after every
/// group pass.
fn inject_default_aliases(registry: &Registry, suffix: &str) {
    registry.add_alias(
        &format!("multi{suffix}"),
        [
            format!("compara{suffix}"),
            format!("ontology{suffix}"),
            format!("stable_ids{suffix}"),
        ],
    );
    registry.add_alias(
        &format!("Ancestral sequences{suffix}"),
        [format!("ancestral_sequences{suffix}")],
    );
}

//! Resolution of stable identifiers to their owning database.
//!
//! Two strategies: an indexed fast path through the dedicated lookup
//! database under `(multi, stable_ids)`, and a linear scan probing each
//! candidate adaptor with per-object-type SQL.

pub mod cli;

use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;

use crate::adaptor::{DbAdaptor, ObjectAdaptor};
use crate::common::normalize_species;
use crate::error::Error;
use crate::group::Group;
use crate::registry::Registry;

/// Object-adaptor type of the indexed lookup adaptor.
pub const STABLE_ID_LOOKUP_TYPE: &str = "stableidslookup";

/// Object types probed when none is given.
const DEFAULT_OBJECT_TYPES: &[&str] = &[
    "gene",
    "transcript",
    "translation",
    "exon",
    "operon",
    "operontranscript",
];

/// Object types probed for compara databases.
const COMPARA_OBJECT_TYPES: &[&str] = &["genetree"];

/// Filters narrowing a stable-id lookup.
#[derive(Debug, Clone, Default)]
pub struct LocateOptions {
    /// Restrict to one species.
    pub species: Option<String>,
    /// Restrict to one object type.
    pub object_type: Option<String>,
    /// Restrict to one database group.
    pub db_type: Option<Group>,
    /// Skip the indexed lookup database even when one is registered.
    pub force_long_lookup: bool,
}

/// The owner of a stable identifier.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct IdOwner {
    /// Canonical species name.
    pub species: String,
    /// Object type, e.g. `"gene"`.
    pub object_type: String,
    /// Database group.
    pub group: Group,
}

/// Typed adaptor over a dedicated stable-id lookup database.
pub struct StableIdLookupAdaptor {
    dba: Arc<DbAdaptor>,
}

impl StableIdLookupAdaptor {
    /// Wrap the lookup database adaptor.
    pub fn new(dba: Arc<DbAdaptor>) -> Self {
        Self { dba }
    }

    /// One indexed query against `stable_id_lookup`.
    pub fn lookup(
        &self,
        stable_id: &str,
        opts: &LocateOptions,
    ) -> Result<Option<IdOwner>, Error> {
        let dbname = &self.dba.params().dbname;
        let mut sql = format!(
            "SELECT name, object_type, db_type \
             FROM {dbname}.stable_id_lookup JOIN {dbname}.species USING (species_id) \
             WHERE stable_id = ?"
        );
        let species = opts.species.as_deref().map(normalize_species);
        let group = opts.db_type.map(|g| g.to_string());
        let mut params: Vec<&str> = vec![stable_id];
        if let Some(species) = species.as_deref() {
            sql.push_str(" AND name = ?");
            params.push(species);
        }
        if let Some(group) = group.as_deref() {
            sql.push_str(" AND db_type = ?");
            params.push(group);
        }
        if let Some(object_type) = opts.object_type.as_deref() {
            sql.push_str(" AND object_type = ?");
            params.push(object_type);
        }

        let rows = self.dba.runner()?.query(&sql, &params)?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };
        let mut row = row.into_iter();
        let (Some(species), Some(object_type), Some(db_type)) =
            (row.next().flatten(), row.next().flatten(), row.next().flatten())
        else {
            return Ok(None);
        };
        let group = db_type
            .parse::<Group>()
            .map_err(|_| Error::backend(format!("unknown db_type '{db_type}' in {dbname}")))?;
        Ok(Some(IdOwner {
            species,
            object_type,
            group,
        }))
    }
}

impl ObjectAdaptor for StableIdLookupAdaptor {
    fn object_type(&self) -> &str {
        STABLE_ID_LOOKUP_TYPE
    }

    fn db_adaptor(&self) -> &Arc<DbAdaptor> {
        &self.dba
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// SQL probe for one object type; `{db}` is substituted for every
/// qualified table.
///
/// The join runs through `seq_region` and `coord_system` to `meta` so
/// that collection databases answer with the right production name.
fn template_for(object_type: &str) -> Option<&'static str> {
    Some(match object_type {
        "gene" => {
            "SELECT m.meta_value FROM {db}.gene o \
             JOIN {db}.seq_region sr ON o.seq_region_id = sr.seq_region_id \
             JOIN {db}.coord_system cs ON sr.coord_system_id = cs.coord_system_id \
             JOIN {db}.meta m ON cs.species_id = m.species_id \
             WHERE o.stable_id = ? AND m.meta_key = 'species.production_name'"
        }
        "transcript" => {
            "SELECT m.meta_value FROM {db}.transcript o \
             JOIN {db}.seq_region sr ON o.seq_region_id = sr.seq_region_id \
             JOIN {db}.coord_system cs ON sr.coord_system_id = cs.coord_system_id \
             JOIN {db}.meta m ON cs.species_id = m.species_id \
             WHERE o.stable_id = ? AND m.meta_key = 'species.production_name'"
        }
        "translation" => {
            "SELECT m.meta_value FROM {db}.translation tl \
             JOIN {db}.transcript o ON tl.transcript_id = o.transcript_id \
             JOIN {db}.seq_region sr ON o.seq_region_id = sr.seq_region_id \
             JOIN {db}.coord_system cs ON sr.coord_system_id = cs.coord_system_id \
             JOIN {db}.meta m ON cs.species_id = m.species_id \
             WHERE tl.stable_id = ? AND m.meta_key = 'species.production_name'"
        }
        "exon" => {
            "SELECT m.meta_value FROM {db}.exon o \
             JOIN {db}.seq_region sr ON o.seq_region_id = sr.seq_region_id \
             JOIN {db}.coord_system cs ON sr.coord_system_id = cs.coord_system_id \
             JOIN {db}.meta m ON cs.species_id = m.species_id \
             WHERE o.stable_id = ? AND m.meta_key = 'species.production_name'"
        }
        "operon" => {
            "SELECT m.meta_value FROM {db}.operon o \
             JOIN {db}.seq_region sr ON o.seq_region_id = sr.seq_region_id \
             JOIN {db}.coord_system cs ON sr.coord_system_id = cs.coord_system_id \
             JOIN {db}.meta m ON cs.species_id = m.species_id \
             WHERE o.stable_id = ? AND m.meta_key = 'species.production_name'"
        }
        "operontranscript" => {
            "SELECT m.meta_value FROM {db}.operon_transcript o \
             JOIN {db}.seq_region sr ON o.seq_region_id = sr.seq_region_id \
             JOIN {db}.coord_system cs ON sr.coord_system_id = cs.coord_system_id \
             JOIN {db}.meta m ON cs.species_id = m.species_id \
             WHERE o.stable_id = ? AND m.meta_key = 'species.production_name'"
        }
        // Compara probes return a bare truth value; the species comes
        // from the adaptor itself.
        "genetree" => "SELECT 1 FROM {db}.gene_tree_root WHERE stable_id = ?",
        _ => return None,
    })
}

/// Find the `(species, object type, group)` owning a stable id.
///
/// The indexed lookup database is used when registered (unless
/// `force_long_lookup`); otherwise the registered adaptors of the
/// requested group (default `core`) are scanned in registration order.
pub fn get_species_and_object_type(
    registry: &Registry,
    stable_id: &str,
    opts: &LocateOptions,
) -> Result<Option<IdOwner>, Error> {
    if stable_id.is_empty() {
        return Err(Error::BadInput(String::from("stable_id")));
    }
    if !opts.force_long_lookup {
        if let Some(adaptor) = registry.find_adaptor("multi", Group::StableIds, STABLE_ID_LOOKUP_TYPE)
        {
            if let Some(lookup) = adaptor.as_any().downcast_ref::<StableIdLookupAdaptor>() {
                return lookup.lookup(stable_id, opts);
            }
        }
    }

    let group = opts.db_type.unwrap_or(Group::Core);
    let candidates = registry.get_all_db_adaptors(opts.species.as_deref(), Some(group));
    scan_adaptors(stable_id, &candidates, opts.object_type.as_deref())
}

/// Probe each candidate adaptor for the id; the first query returning a
/// non-empty species value wins.
///
/// A collection database shared by several adaptors is visited once,
/// keyed by its connection locator.
fn scan_adaptors(
    stable_id: &str,
    candidates: &[Arc<DbAdaptor>],
    object_type: Option<&str>,
) -> Result<Option<IdOwner>, Error> {
    let mut visited_collections: HashSet<String> = HashSet::new();
    for dba in candidates {
        if dba.is_multispecies()
            && !visited_collections.insert(dba.params().locator_with_dbname())
        {
            continue;
        }
        let object_types: Vec<String> = match object_type {
            Some(object_type) => vec![object_type.to_lowercase()],
            None if dba.group() == Group::Compara => {
                COMPARA_OBJECT_TYPES.iter().map(|t| t.to_string()).collect()
            }
            None => DEFAULT_OBJECT_TYPES.iter().map(|t| t.to_string()).collect(),
        };
        for object_type in object_types {
            let Some(template) = template_for(&object_type) else {
                tracing::warn!("no lookup SQL for object type '{object_type}'");
                continue;
            };
            let sql = template.replace("{db}", &dba.params().dbname);
            let rows = dba.runner()?.query(&sql, &[stable_id])?;
            let Some(value) = rows
                .into_iter()
                .next()
                .and_then(|row| row.into_iter().next().flatten())
            else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            // A bare numeric result is a truth value, not a name.
            let species = if value.bytes().all(|b| b.is_ascii_digit()) {
                dba.species().to_string()
            } else {
                value
            };
            return Ok(Some(IdOwner {
                species,
                object_type,
                group: dba.group(),
            }));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::adaptor::{AdaptorArgs, ConnectionParams};
    use crate::testing::{mock_connector, MockBackend};
    use pretty_assertions::assert_eq;

    fn register(
        registry: &Registry,
        connector: &Arc<dyn crate::adaptor::query::Connector>,
        species: &str,
        group: Group,
        dbname: &str,
        multispecies: bool,
    ) {
        let args = AdaptorArgs {
            species: species.to_string(),
            species_id: 1,
            group,
            multispecies,
            no_cache: false,
            params: ConnectionParams {
                dbname: dbname.to_string(),
                ..Default::default()
            },
        };
        let dba = registry.create_db_adaptor(args, connector.clone()).unwrap();
        registry.add_db_adaptor(dba).unwrap();
    }

    fn indexed_backend() -> MockBackend {
        let mut backend = MockBackend::default();
        backend.add_stable_id("lookup_db", "ENSG000000001", "homo_sapiens", "gene", "core");
        backend.add_object("hs_core", "gene", "ENSG000000001", "homo_sapiens");
        backend
    }

    #[test]
    fn indexed_fast_path_answers_from_the_lookup_db() {
        let registry = Registry::new();
        let connector = mock_connector(indexed_backend());
        register(&registry, &connector, "multi", Group::StableIds, "lookup_db", false);
        register(&registry, &connector, "homo_sapiens", Group::Core, "hs_core", false);

        let owner =
            get_species_and_object_type(&registry, "ENSG000000001", &LocateOptions::default())
                .unwrap()
                .unwrap();
        assert_eq!(
            owner,
            IdOwner {
                species: String::from("homo_sapiens"),
                object_type: String::from("gene"),
                group: Group::Core,
            }
        );

        // Unknown ids come back empty without falling through to a scan.
        assert_eq!(
            get_species_and_object_type(&registry, "ENSG999", &LocateOptions::default()).unwrap(),
            None
        );
    }

    #[test]
    fn fast_path_honors_filters() {
        let registry = Registry::new();
        let connector = mock_connector(indexed_backend());
        register(&registry, &connector, "multi", Group::StableIds, "lookup_db", false);

        let opts = LocateOptions {
            species: Some(String::from("Homo Sapiens")),
            db_type: Some(Group::Core),
            object_type: Some(String::from("gene")),
            ..Default::default()
        };
        assert!(get_species_and_object_type(&registry, "ENSG000000001", &opts)
            .unwrap()
            .is_some());

        let mismatched = LocateOptions {
            db_type: Some(Group::Variation),
            ..Default::default()
        };
        assert_eq!(
            get_species_and_object_type(&registry, "ENSG000000001", &mismatched).unwrap(),
            None
        );
    }

    #[test]
    fn forced_long_lookup_scans_core_adaptors() {
        let registry = Registry::new();
        let connector = mock_connector(indexed_backend());
        register(&registry, &connector, "multi", Group::StableIds, "lookup_db", false);
        register(&registry, &connector, "homo_sapiens", Group::Core, "hs_core", false);

        let opts = LocateOptions {
            force_long_lookup: true,
            ..Default::default()
        };
        let owner = get_species_and_object_type(&registry, "ENSG000000001", &opts)
            .unwrap()
            .unwrap();
        assert_eq!(owner.species, "homo_sapiens");
        assert_eq!(owner.object_type, "gene");
        assert_eq!(owner.group, Group::Core);
    }

    #[test]
    fn scan_probes_types_in_order() {
        let mut backend = MockBackend::default();
        backend.add_object("mm_core", "transcript", "ENSMUST0001", "mus_musculus");
        let registry = Registry::new();
        let connector = mock_connector(backend);
        register(&registry, &connector, "mus_musculus", Group::Core, "mm_core", false);

        let owner = get_species_and_object_type(
            &registry,
            "ENSMUST0001",
            &LocateOptions::default(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(owner.object_type, "transcript");
    }

    #[test]
    fn compara_scan_replaces_numeric_result_with_adaptor_species() {
        let mut backend = MockBackend::default();
        backend.add_object("compara_db", "genetree", "ENSGT0001", "1");
        let registry = Registry::new();
        let connector = mock_connector(backend);
        register(&registry, &connector, "multi", Group::Compara, "compara_db", false);

        let opts = LocateOptions {
            db_type: Some(Group::Compara),
            ..Default::default()
        };
        let owner = get_species_and_object_type(&registry, "ENSGT0001", &opts)
            .unwrap()
            .unwrap();
        assert_eq!(owner.species, "multi");
        assert_eq!(owner.object_type, "genetree");
        assert_eq!(owner.group, Group::Compara);
    }

    #[test]
    fn collection_databases_are_visited_once() {
        let mut backend = MockBackend::default();
        backend.add_object("coll_core", "gene", "EC0001", "escherichia_coli_2");
        let backend = Arc::new(backend);
        let registry = Registry::new();
        let connector = crate::testing::mock_connector_shared(backend.clone());
        register(&registry, &connector, "escherichia_coli_1", Group::Core, "coll_core", true);
        register(&registry, &connector, "escherichia_coli_2", Group::Core, "coll_core", true);

        // A missing id walks every object type, but the shared collection
        // database is probed through the first adaptor only.
        assert_eq!(
            get_species_and_object_type(&registry, "EC_MISSING", &LocateOptions::default())
                .unwrap(),
            None
        );
        let gene_probes = backend
            .queries()
            .iter()
            .filter(|sql| sql.contains("coll_core.gene "))
            .count();
        assert_eq!(gene_probes, 1);

        let owner = get_species_and_object_type(&registry, "EC0001", &LocateOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(owner.species, "escherichia_coli_2");
    }

    #[test]
    fn empty_stable_id_is_bad_input() {
        let registry = Registry::new();
        assert!(matches!(
            get_species_and_object_type(&registry, "", &LocateOptions::default()),
            Err(Error::BadInput(_))
        ));
    }

    #[test]
    fn missing_everywhere_returns_none() {
        let registry = Registry::new();
        let connector = mock_connector(MockBackend::default());
        register(&registry, &connector, "homo_sapiens", Group::Core, "hs_core", false);
        assert_eq!(
            get_species_and_object_type(&registry, "ENSG404", &LocateOptions::default()).unwrap(),
            None
        );
    }
}

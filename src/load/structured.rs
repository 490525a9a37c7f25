//! The canonical ingestion path: normalized configuration structures,
//! their validation, and registry serialization.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use itertools::Itertools as _;
use serde::{Deserialize, Serialize};

use crate::adaptor::query::Connector;
use crate::adaptor::{AdaptorArgs, ConnectionParams};
use crate::error::Error;
use crate::group::Group;
use crate::registry::Registry;

/// One adaptor record of a registry configuration document.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptorConfig {
    /// Canonical species name.
    pub species: Option<String>,
    /// Group name; validated against the catalog at load time.
    pub group: Option<String>,
    /// Server host name.
    pub host: Option<String>,
    /// Server port.
    pub port: Option<u16>,
    /// User name.
    pub user: Option<String>,
    /// Password.
    pub pass: Option<String>,
    /// Database name.
    pub dbname: Option<String>,
    /// Driver name.
    pub driver: Option<String>,
    /// Species id within a collection database.
    pub species_id: Option<u32>,
    /// Whether the database is a species collection.
    pub multispecies_db: Option<bool>,
    /// Disconnect after each unit of work when inactive.
    pub disconnect_when_inactive: Option<bool>,
    /// Server-side wait timeout in seconds.
    pub wait_timeout: Option<u32>,
    /// Transparently reconnect when the connection was lost.
    pub reconnect_when_lost: Option<bool>,
}

/// Normalized configuration consumed by the canonical ingestion path.
///
/// Both keys are individually optional; a document defining neither is
/// rejected by the decoders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Adaptor records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adaptors: Option<Vec<AdaptorConfig>>,
    /// Aliases per canonical species.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aliases: Option<BTreeMap<String, Vec<String>>>,
}

/// Push a normalized configuration into the registry.
///
/// Records without a group warn and are skipped; groups that are unknown
/// or whose adaptor module is unavailable warn and are blacklisted for
/// the remainder of the call. Returns the number of adaptors registered.
pub fn load_registry_from_config(
    registry: &Registry,
    connector: &Arc<dyn Connector>,
    config: &RegistryConfig,
    no_cache: bool,
) -> Result<usize, Error> {
    let factories = registry.factories();
    let mut blacklist: HashSet<String> = HashSet::new();
    let mut registered = 0;

    if let Some(adaptors) = &config.adaptors {
        for record in adaptors {
            let Some(group_name) = record.group.as_deref() else {
                tracing::warn!("adaptor record without group, skipping");
                continue;
            };
            if blacklist.contains(group_name) {
                continue;
            }
            let Ok(group) = group_name.parse::<Group>() else {
                tracing::warn!("unknown group '{group_name}', skipping its adaptors");
                blacklist.insert(group_name.to_string());
                continue;
            };
            if !factories.has_module(group.module_id()) {
                tracing::warn!(
                    "no adaptor module available for group '{group_name}', skipping its adaptors"
                );
                blacklist.insert(group_name.to_string());
                continue;
            }
            let Some(species) = record.species.as_deref() else {
                tracing::warn!("adaptor record without species, skipping");
                continue;
            };

            let params = ConnectionParams {
                host: record.host.clone().unwrap_or_else(|| String::from("localhost")),
                port: record.port.unwrap_or(3306),
                user: record.user.clone().unwrap_or_else(|| String::from("ensro")),
                pass: record.pass.clone(),
                dbname: record.dbname.clone().unwrap_or_default(),
                driver: record.driver.clone().unwrap_or_else(|| String::from("mysql")),
                wait_timeout: record.wait_timeout.unwrap_or(0),
                disconnect_when_inactive: record.disconnect_when_inactive.unwrap_or(false),
                reconnect_when_lost: record.reconnect_when_lost.unwrap_or(false),
            };
            let args = AdaptorArgs {
                species: species.to_string(),
                species_id: record.species_id.unwrap_or(1),
                group,
                multispecies: record.multispecies_db.unwrap_or(false),
                no_cache,
                params,
            };
            let dba = factories.create(args, connector.clone())?;
            registry.add_db_adaptor(dba)?;
            registered += 1;
        }
    }

    if let Some(aliases) = &config.aliases {
        for (species, names) in aliases {
            registry.add_alias(species, names);
        }
    }

    Ok(registered)
}

/// Serialize a registry back into its normalized configuration.
///
/// Adaptors are sorted by `(species, group)` and aliases alphabetically,
/// so the output is canonical and round-trips through
/// [`load_registry_from_config`].
pub fn serialise_registry(registry: &Registry) -> RegistryConfig {
    let adaptors = registry
        .get_all_db_adaptors(None, None)
        .iter()
        .map(|dba| {
            let params = dba.params();
            AdaptorConfig {
                species: Some(dba.species().to_string()),
                group: Some(dba.group().to_string()),
                host: Some(params.host.clone()),
                port: Some(params.port),
                user: Some(params.user.clone()),
                pass: params.pass.clone(),
                dbname: Some(params.dbname.clone()),
                driver: Some(params.driver.clone()),
                species_id: (dba.is_multispecies() || dba.species_id() != 1)
                    .then(|| dba.species_id()),
                multispecies_db: dba.is_multispecies().then_some(true),
                disconnect_when_inactive: params.disconnect_when_inactive.then_some(true),
                wait_timeout: (params.wait_timeout != 0).then_some(params.wait_timeout),
                reconnect_when_lost: params.reconnect_when_lost.then_some(true),
            }
        })
        .sorted_by(|a, b| (&a.species, &a.group).cmp(&(&b.species, &b.group)))
        .collect::<Vec<_>>();

    let aliases = registry
        .aliases_by_species()
        .into_iter()
        .map(|(species, names)| (species, names.into_iter().sorted().collect()))
        .collect::<BTreeMap<String, Vec<String>>>();

    RegistryConfig {
        adaptors: Some(adaptors),
        aliases: Some(aliases),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::{mock_connector, MockBackend};
    use pretty_assertions::assert_eq;

    fn config_with_group(group: &str) -> RegistryConfig {
        RegistryConfig {
            adaptors: Some(vec![AdaptorConfig {
                species: Some(String::from("human")),
                group: Some(group.to_string()),
                dbname: Some(String::from("db")),
                ..Default::default()
            }]),
            aliases: None,
        }
    }

    #[test]
    fn loads_adaptors_and_aliases() {
        let registry = Registry::new();
        let connector = mock_connector(MockBackend::default());
        let config = RegistryConfig {
            adaptors: Some(vec![AdaptorConfig {
                species: Some(String::from("ecoli")),
                group: Some(String::from("core")),
                host: Some(String::from("somewhere")),
                port: Some(3306),
                user: Some(String::from("user")),
                pass: Some(String::from("pass")),
                dbname: Some(String::from("db")),
                multispecies_db: Some(true),
                species_id: Some(20),
                ..Default::default()
            }]),
            aliases: Some(BTreeMap::from([(
                String::from("ecoli"),
                vec![String::from("escherichia_coli")],
            )])),
        };

        let registered =
            load_registry_from_config(&registry, &connector, &config, false).unwrap();
        assert_eq!(registered, 1);

        let dba = registry.get_db_adaptor("ecoli", Group::Core).unwrap();
        assert_eq!(dba.params().host, "somewhere");
        assert!(dba.is_multispecies());
        assert_eq!(dba.species_id(), 20);
        assert_eq!(registry.get_alias("escherichia_coli").as_deref(), Some("ecoli"));
    }

    #[test]
    fn record_without_group_is_skipped() {
        let registry = Registry::new();
        let connector = mock_connector(MockBackend::default());
        let config = RegistryConfig {
            adaptors: Some(vec![AdaptorConfig {
                species: Some(String::from("human")),
                ..Default::default()
            }]),
            aliases: None,
        };
        let registered =
            load_registry_from_config(&registry, &connector, &config, false).unwrap();
        assert_eq!(registered, 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn unknown_group_is_blacklisted() {
        let registry = Registry::new();
        let connector = mock_connector(MockBackend::default());
        let registered = load_registry_from_config(
            &registry,
            &connector,
            &config_with_group("nonsense"),
            false,
        )
        .unwrap();
        assert_eq!(registered, 0);
        assert!(registry.get_db_adaptor("human", Group::Core).is_none());
    }

    #[test]
    fn unavailable_module_is_blacklisted() {
        let mut factories = crate::adaptor::FactoryRegistry::with_defaults();
        factories.unregister_db("variation");
        let registry = Registry::with_factories(factories);
        let connector = mock_connector(MockBackend::default());
        let registered = load_registry_from_config(
            &registry,
            &connector,
            &config_with_group("variation"),
            false,
        )
        .unwrap();
        assert_eq!(registered, 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn no_cache_override_applies_to_all_records() {
        let registry = Registry::new();
        let connector = mock_connector(MockBackend::default());
        load_registry_from_config(&registry, &connector, &config_with_group("core"), true)
            .unwrap();
        assert!(registry
            .get_db_adaptor("human", Group::Core)
            .unwrap()
            .no_cache());
    }

    #[test]
    fn serialise_round_trips() {
        let registry = Registry::new();
        let connector = mock_connector(MockBackend::default());
        let config = RegistryConfig {
            // Records in canonical (species, group) order, as serialised.
            adaptors: Some(vec![
                AdaptorConfig {
                    species: Some(String::from("ecoli")),
                    group: Some(String::from("core")),
                    host: Some(String::from("localhost")),
                    port: Some(3306),
                    user: Some(String::from("ensro")),
                    dbname: Some(String::from("ecoli_db")),
                    driver: Some(String::from("mysql")),
                    species_id: Some(20),
                    multispecies_db: Some(true),
                    ..Default::default()
                },
                AdaptorConfig {
                    species: Some(String::from("human")),
                    group: Some(String::from("core")),
                    host: Some(String::from("localhost")),
                    port: Some(3306),
                    user: Some(String::from("ensro")),
                    dbname: Some(String::from("human_db")),
                    driver: Some(String::from("mysql")),
                    ..Default::default()
                },
                AdaptorConfig {
                    species: Some(String::from("mouse")),
                    group: Some(String::from("core")),
                    host: Some(String::from("localhost")),
                    port: Some(3306),
                    user: Some(String::from("ensro")),
                    dbname: Some(String::from("mouse_db")),
                    driver: Some(String::from("mysql")),
                    ..Default::default()
                },
            ]),
            aliases: Some(BTreeMap::from([
                (
                    String::from("human"),
                    vec![String::from("9606"), String::from("homer")],
                ),
                (String::from("mouse"), vec![String::from("mice")]),
            ])),
        };

        load_registry_from_config(&registry, &connector, &config, false).unwrap();
        let serialised = serialise_registry(&registry);
        assert_eq!(serialised, config);

        // Loading the serialized form again yields the same document.
        let registry2 = Registry::new();
        load_registry_from_config(&registry2, &connector, &serialised, false).unwrap();
        assert_eq!(serialise_registry(&registry2), serialised);
    }
}

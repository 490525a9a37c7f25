//! The registry: an in-memory index of database adaptors and aliases.
//!
//! There is one process-wide instance behind [`Registry::global`] plus any
//! number of private instances; both flavors behave identically. All
//! mutating operations serialize on one lock; the read-heavy lookup paths
//! take the read half.

mod store;

use std::sync::{Arc, OnceLock, RwLock};

use crate::adaptor::{
    AdaptorArgs, ConnectionParams, DbAdaptor, FactoryRegistry, GenericAdaptor, ObjectAdaptor,
};
use crate::error::Error;
use crate::group::Group;
use store::Store;

/// Registry of database sources for a release of the data ecosystem.
pub struct Registry {
    store: RwLock<Store>,
    factories: RwLock<FactoryRegistry>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// New empty registry with the default factory set.
    pub fn new() -> Self {
        Self::with_factories(FactoryRegistry::with_defaults())
    }

    /// New empty registry with an explicit factory set.
    pub fn with_factories(factories: FactoryRegistry) -> Self {
        Self {
            store: RwLock::new(Store::default()),
            factories: RwLock::new(factories),
        }
    }

    /// The process-wide registry, created on first use.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::new)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Store> {
        self.store.read().expect("registry lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Store> {
        self.store.write().expect("registry lock poisoned")
    }

    /// Snapshot of the adaptor factories.
    pub fn factories(&self) -> FactoryRegistry {
        self.factories
            .read()
            .expect("registry lock poisoned")
            .clone()
    }

    /// Replace the adaptor factories.
    pub fn set_factories(&self, factories: FactoryRegistry) {
        *self.factories.write().expect("registry lock poisoned") = factories;
    }

    // -- adaptors ---------------------------------------------------------

    /// Register an adaptor; errors if the `(species, group)` slot is taken.
    pub fn add_db_adaptor(&self, dba: Arc<DbAdaptor>) -> Result<(), Error> {
        self.write().add_db_adaptor(dba, false)
    }

    /// Register an adaptor, replacing any existing registration.
    pub fn reset_db_adaptor(&self, dba: Arc<DbAdaptor>) {
        // Cannot fail in reset mode.
        let _ = self.write().add_db_adaptor(dba, true);
    }

    /// Adaptor for the (alias-resolved) species and group.
    pub fn get_db_adaptor(&self, species: &str, group: Group) -> Option<Arc<DbAdaptor>> {
        self.read().get_db_adaptor(species, group)
    }

    /// All adaptors, optionally filtered by species and/or group.
    pub fn get_all_db_adaptors(
        &self,
        species: Option<&str>,
        group: Option<Group>,
    ) -> Vec<Arc<DbAdaptor>> {
        self.read().get_all_db_adaptors(species, group)
    }

    /// All adaptors whose connection coordinates equal `params`.
    pub fn get_all_db_adaptors_by_connection(
        &self,
        params: &ConnectionParams,
    ) -> Vec<Arc<DbAdaptor>> {
        self.read().get_all_db_adaptors_by_connection(params)
    }

    /// Remove and return the adaptor under `(species, group)`.
    pub fn remove_db_adaptor(&self, species: &str, group: Group) -> Option<Arc<DbAdaptor>> {
        self.write().remove_db_adaptor(species, group)
    }

    /// Distinct species with at least one adaptor.
    pub fn get_all_species(&self, group: Option<Group>) -> Vec<String> {
        self.read().get_all_species(group)
    }

    // -- aliases ----------------------------------------------------------

    /// Register aliases for a canonical species.
    pub fn add_alias<I, S>(&self, species: &str, aliases: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.write().add_alias(species, aliases);
    }

    /// Canonical species for a name, through the alias table.
    pub fn get_alias(&self, name: &str) -> Option<String> {
        self.read().resolve(name)
    }

    /// Whether an alias entry exists for the name.
    pub fn alias_exists(&self, name: &str) -> bool {
        self.read().alias_exists(name)
    }

    /// Every alias sharing the canonical species of `name`, except `name`.
    pub fn get_all_aliases(&self, name: &str) -> Vec<String> {
        self.read().get_all_aliases(name)
    }

    /// Remove one alias entry.
    pub fn remove_alias(&self, alias: &str) {
        self.write().remove_alias(alias);
    }

    /// Aliases grouped per canonical species, self-aliases excluded.
    pub fn aliases_by_species(&self) -> Vec<(String, Vec<String>)> {
        self.read().aliases_by_species()
    }

    // -- typed adaptors ---------------------------------------------------

    /// Register a typed adaptor under `(species, group, object type)`.
    pub fn add_typed_adaptor(
        &self,
        species: &str,
        group: Group,
        object_type: &str,
        adaptor: Arc<dyn ObjectAdaptor>,
        reset: bool,
    ) -> Result<(), Error> {
        self.write()
            .add_typed_adaptor(species, group, object_type, adaptor, reset)
    }

    /// Typed adaptor for `(species, group, object type)`.
    ///
    /// The slot is filled lazily on first access: if a database adaptor is
    /// registered for the pair, the module's typed factory (or the generic
    /// fallback) instantiates the object adaptor. Errors with
    /// [`Error::NotFound`] when no alias resolves for the species; an
    /// unresolved group slot yields `Ok(None)`.
    pub fn get_adaptor(
        &self,
        species: &str,
        group: Group,
        object_type: &str,
    ) -> Result<Option<Arc<dyn ObjectAdaptor>>, Error> {
        let canonical = self
            .get_alias(species)
            .ok_or_else(|| Error::NotFound(species.to_string()))?;
        if let Some(adaptor) = self.read().get_typed_adaptor(&canonical, group, object_type) {
            return Ok(Some(adaptor));
        }
        let Some(dba) = self.get_db_adaptor(&canonical, group) else {
            return Ok(None);
        };
        let factories = self.factories();
        let adaptor = match factories.typed_factory(group.module_id(), object_type) {
            Some(factory) => factory(dba),
            None => Arc::new(GenericAdaptor::new(object_type, dba)),
        };
        self.write()
            .add_typed_adaptor(&canonical, group, object_type, adaptor.clone(), true)?;
        Ok(Some(adaptor))
    }

    /// [`Registry::get_adaptor`] without the missing-species error.
    pub fn find_adaptor(
        &self,
        species: &str,
        group: Group,
        object_type: &str,
    ) -> Option<Arc<dyn ObjectAdaptor>> {
        self.get_adaptor(species, group, object_type).ok().flatten()
    }

    /// Object types with a typed slot for the species.
    pub fn get_all_object_types(&self, species: &str) -> Vec<String> {
        self.read().get_all_object_types(species)
    }

    /// Typed adaptors serving an object type, across all species.
    pub fn get_adaptors_by_type(&self, object_type: &str) -> Vec<Arc<dyn ObjectAdaptor>> {
        self.read().get_adaptors_by_type(object_type)
    }

    // -- DNA overrides ----------------------------------------------------

    /// Redirect sequence-type requests for `(species, group)`.
    pub fn add_dna_adaptor(
        &self,
        species: &str,
        group: Group,
        dna_species: &str,
        dna_group: Group,
    ) {
        self.write()
            .add_dna_override(species, group, dna_species, dna_group);
    }

    /// Remove a sequence-type redirection.
    pub fn remove_dna_adaptor(&self, species: &str, group: Group) {
        self.write().remove_dna_override(species, group);
    }

    /// Adaptor answering sequence-type requests for `(species, group)`.
    pub fn get_dna_adaptor(&self, species: &str, group: Group) -> Option<Arc<DbAdaptor>> {
        self.read().get_dna_adaptor(species, group)
    }

    // -- whole-registry operations ----------------------------------------

    /// Copy adaptors and aliases from `other`; first-seen (i.e. existing)
    /// entries win. Returns the number of adaptors copied.
    pub fn merge(&self, other: &Registry, verbose: bool) -> usize {
        let other_store = other.read();
        self.write().merge(&other_store, verbose)
    }

    /// Close idle connections of every registered adaptor.
    pub fn disconnect_all(&self) {
        self.read().disconnect_all();
    }

    /// Disconnect idle connections and drop all registry state.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Number of registered adaptors.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the registry holds neither adaptors nor aliases.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Convenience constructor for an adaptor through the factory set.
    pub fn create_db_adaptor(
        &self,
        args: AdaptorArgs,
        connector: Arc<dyn crate::adaptor::query::Connector>,
    ) -> Result<Arc<DbAdaptor>, Error> {
        self.factories().create(args, connector)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::{mock_connector, MockBackend};
    use pretty_assertions::assert_eq;

    fn adaptor(
        registry: &Registry,
        species: &str,
        group: Group,
        dbname: &str,
    ) -> Arc<DbAdaptor> {
        let connector = mock_connector(MockBackend::default());
        let params = ConnectionParams {
            dbname: dbname.to_string(),
            ..Default::default()
        };
        registry
            .create_db_adaptor(AdaptorArgs::new(species, group, params), connector)
            .expect("stock factory is registered")
    }

    #[test]
    fn self_alias_is_created_on_registration() {
        let registry = Registry::new();
        registry
            .add_db_adaptor(adaptor(&registry, "homo_sapiens", Group::Core, "hs_core"))
            .unwrap();

        assert_eq!(registry.get_alias("homo_sapiens").as_deref(), Some("homo_sapiens"));
        assert_eq!(registry.get_alias("Homo Sapiens").as_deref(), Some("homo_sapiens"));
        assert_eq!(registry.get_alias("homo-sapiens").as_deref(), Some("homo_sapiens"));
    }

    #[test]
    fn duplicate_slot_is_an_error_unless_reset() {
        let registry = Registry::new();
        registry
            .add_db_adaptor(adaptor(&registry, "human", Group::Core, "db1"))
            .unwrap();
        let err = registry
            .add_db_adaptor(adaptor(&registry, "human", Group::Core, "db2"))
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));

        registry.reset_db_adaptor(adaptor(&registry, "human", Group::Core, "db2"));
        assert_eq!(
            registry
                .get_db_adaptor("human", Group::Core)
                .unwrap()
                .params()
                .dbname,
            "db2"
        );
        // The flat list still holds the adaptor exactly once.
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn aliases_resolve_and_enumerate() {
        let registry = Registry::new();
        registry
            .add_db_adaptor(adaptor(&registry, "human", Group::Core, "db"))
            .unwrap();
        registry.add_alias("human", ["9606", "homer"]);

        assert_eq!(registry.get_alias("9606").as_deref(), Some("human"));
        assert_eq!(registry.get_alias("homer").as_deref(), Some("human"));
        assert!(registry.alias_exists("homer"));
        assert!(!registry.alias_exists("lisa"));

        let mut aliases = registry.get_all_aliases("human");
        aliases.sort();
        assert_eq!(aliases, vec!["9606", "homer"]);
        assert!(!registry.get_all_aliases("human").contains(&String::from("human")));
        // Looked up through an alias, the alias itself is excluded.
        assert_eq!(registry.get_all_aliases("9606"), vec!["human", "homer"]);
    }

    #[test]
    fn add_then_remove_restores_prior_state() {
        let registry = Registry::new();
        registry
            .add_db_adaptor(adaptor(&registry, "human", Group::Core, "db"))
            .unwrap();
        let before_species = registry.get_all_species(None);
        let before_len = registry.len();

        registry
            .add_db_adaptor(adaptor(&registry, "mouse", Group::Variation, "mm_var"))
            .unwrap();
        assert!(registry.remove_db_adaptor("mouse", Group::Variation).is_some());

        assert_eq!(registry.get_all_species(None), before_species);
        assert_eq!(registry.len(), before_len);
        assert!(registry.get_db_adaptor("mouse", Group::Variation).is_none());
    }

    #[test]
    fn filters_on_get_all_db_adaptors() {
        let registry = Registry::new();
        registry
            .add_db_adaptor(adaptor(&registry, "human", Group::Core, "hs_core"))
            .unwrap();
        registry
            .add_db_adaptor(adaptor(&registry, "human", Group::Variation, "hs_var"))
            .unwrap();
        registry
            .add_db_adaptor(adaptor(&registry, "mouse", Group::Core, "mm_core"))
            .unwrap();

        assert_eq!(registry.get_all_db_adaptors(None, None).len(), 3);
        assert_eq!(registry.get_all_db_adaptors(Some("human"), None).len(), 2);
        assert_eq!(registry.get_all_db_adaptors(None, Some(Group::Core)).len(), 2);
        assert_eq!(
            registry
                .get_all_db_adaptors(Some("mouse"), Some(Group::Core))
                .len(),
            1
        );
        assert!(registry.get_all_db_adaptors(Some("krill"), None).is_empty());
    }

    #[test]
    fn adaptors_group_by_connection() {
        let registry = Registry::new();
        registry
            .add_db_adaptor(adaptor(&registry, "human", Group::Core, "shared_db"))
            .unwrap();
        registry
            .add_db_adaptor(adaptor(&registry, "mouse", Group::Core, "other_db"))
            .unwrap();

        let probe = ConnectionParams {
            dbname: String::from("shared_db"),
            ..Default::default()
        };
        let matching = registry.get_all_db_adaptors_by_connection(&probe);
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].species(), "human");
    }

    #[test]
    fn typed_adaptors_are_lazily_instantiated() {
        let registry = Registry::new();
        registry
            .add_db_adaptor(adaptor(&registry, "human", Group::Core, "db"))
            .unwrap();

        let gene = registry.get_adaptor("human", Group::Core, "Gene").unwrap().unwrap();
        assert_eq!(gene.object_type(), "gene");
        assert_eq!(registry.get_all_object_types("human"), vec!["gene"]);
        assert_eq!(registry.get_adaptors_by_type("gene").len(), 1);

        // Unknown species is an error; unknown group slot is not.
        assert!(matches!(
            registry.get_adaptor("krill", Group::Core, "gene"),
            Err(Error::NotFound(_))
        ));
        assert!(registry
            .get_adaptor("human", Group::Variation, "gene")
            .unwrap()
            .is_none());
        assert!(registry.find_adaptor("krill", Group::Core, "gene").is_none());
    }

    #[test]
    fn dna_override_redirects_and_falls_back() {
        let registry = Registry::new();
        registry
            .add_db_adaptor(adaptor(&registry, "human", Group::Otherfeatures, "hs_of"))
            .unwrap();
        registry
            .add_db_adaptor(adaptor(&registry, "human", Group::Core, "hs_core"))
            .unwrap();

        registry.add_dna_adaptor("human", Group::Otherfeatures, "human", Group::Core);
        assert_eq!(
            registry
                .get_dna_adaptor("human", Group::Otherfeatures)
                .unwrap()
                .params()
                .dbname,
            "hs_core"
        );

        // Redirection to an unregistered target falls back to the original.
        registry.add_dna_adaptor("human", Group::Otherfeatures, "human", Group::Vega);
        assert_eq!(
            registry
                .get_dna_adaptor("human", Group::Otherfeatures)
                .unwrap()
                .params()
                .dbname,
            "hs_of"
        );

        registry.remove_dna_adaptor("human", Group::Otherfeatures);
        assert_eq!(
            registry
                .get_dna_adaptor("human", Group::Otherfeatures)
                .unwrap()
                .params()
                .dbname,
            "hs_of"
        );
    }

    #[test]
    fn merge_is_first_seen_wins() {
        let main = Registry::new();
        main.add_db_adaptor(adaptor(&main, "human", Group::Core, "kept"))
            .unwrap();
        main.add_alias("human", ["9606"]);

        let other = Registry::new();
        other
            .add_db_adaptor(adaptor(&other, "human", Group::Core, "ignored"))
            .unwrap();
        other
            .add_db_adaptor(adaptor(&other, "mouse", Group::Core, "copied"))
            .unwrap();
        other.add_alias("human", ["homer"]);

        let copied = main.merge(&other, false);
        assert_eq!(copied, 1);
        assert_eq!(
            main.get_db_adaptor("human", Group::Core).unwrap().params().dbname,
            "kept"
        );
        assert_eq!(
            main.get_db_adaptor("mouse", Group::Core).unwrap().params().dbname,
            "copied"
        );
        assert_eq!(main.get_alias("homer").as_deref(), Some("human"));

        // Merging again copies nothing.
        assert_eq!(main.merge(&other, false), 0);
    }

    #[test]
    fn clear_empties_the_registry() {
        let registry = Registry::new();
        registry
            .add_db_adaptor(adaptor(&registry, "human", Group::Core, "db"))
            .unwrap();
        registry.add_alias("human", ["9606"]);
        registry.clear();

        assert!(registry.is_empty());
        assert!(registry.get_alias("9606").is_none());
        // The factory set survives a clear.
        assert!(registry.factories().has_module("core"));
    }

    #[test]
    fn global_registry_is_a_singleton() {
        let a = Registry::global() as *const Registry;
        let b = Registry::global() as *const Registry;
        assert_eq!(a, b);
    }
}

//! The mutable state behind a registry.
//!
//! `Store` is pure data plus invariant-preserving operations; all locking
//! lives in the [`crate::registry::Registry`] facade.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::adaptor::{DbAdaptor, ObjectAdaptor};
use crate::common::normalize_species;
use crate::error::Error;
use crate::group::Group;

/// Normalized index of adaptors, aliases and overrides.
#[derive(Default)]
pub(crate) struct Store {
    /// Normalized alias -> canonical species.
    aliases: IndexMap<String, String>,
    /// Canonical species -> group -> adaptor.
    adaptors: IndexMap<String, IndexMap<Group, Arc<DbAdaptor>>>,
    /// Every adaptor exactly once, in registration order.
    flat: Vec<Arc<DbAdaptor>>,
    /// `(species, group, object type)` slots.
    typed: IndexMap<(String, Group, String), Arc<dyn ObjectAdaptor>>,
    /// Species -> object types with a typed slot.
    types_by_species: IndexMap<String, Vec<String>>,
    /// Object type -> typed adaptors serving it.
    adaptors_by_type: IndexMap<String, Vec<Arc<dyn ObjectAdaptor>>>,
    /// `(species, group)` -> `(dna species, dna group)` redirections.
    dna_overrides: IndexMap<(String, Group), (String, Group)>,
}

impl Store {
    /// Resolve a name to the canonical species it aliases.
    ///
    /// A canonical species without an alias entry resolves to itself.
    pub(crate) fn resolve(&self, name: &str) -> Option<String> {
        let key = normalize_species(name);
        if let Some(species) = self.aliases.get(&key) {
            return Some(species.clone());
        }
        if self.adaptors.contains_key(name) {
            return Some(name.to_string());
        }
        None
    }

    /// Whether any alias entry exists for the name.
    pub(crate) fn alias_exists(&self, name: &str) -> bool {
        self.aliases.contains_key(&normalize_species(name))
    }

    /// Register aliases for a canonical species.
    pub(crate) fn add_alias<I, S>(&mut self, species: &str, aliases: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for alias in aliases {
            self.aliases
                .insert(normalize_species(alias.as_ref()), species.to_string());
        }
    }

    /// Remove one alias entry.
    pub(crate) fn remove_alias(&mut self, alias: &str) {
        self.aliases.shift_remove(&normalize_species(alias));
    }

    /// All aliases resolving to the same canonical species as `name`,
    /// excluding `name` itself.
    pub(crate) fn get_all_aliases(&self, name: &str) -> Vec<String> {
        let Some(canonical) = self.resolve(name) else {
            return Vec::new();
        };
        let input = normalize_species(name);
        self.aliases
            .iter()
            .filter(|(alias, species)| **species == canonical && **alias != input)
            .map(|(alias, _)| alias.clone())
            .collect()
    }

    /// Register an adaptor under its `(species, group)` slot.
    ///
    /// The self-alias for the species is created if missing. With `reset`
    /// an existing registration is replaced instead of being an error.
    pub(crate) fn add_db_adaptor(
        &mut self,
        dba: Arc<DbAdaptor>,
        reset: bool,
    ) -> Result<(), Error> {
        let species = dba.species().to_string();
        let group = dba.group();

        self.aliases
            .entry(normalize_species(&species))
            .or_insert_with(|| species.clone());

        let slot = self.adaptors.entry(species.clone()).or_default();
        if let Some(previous) = slot.get(&group) {
            if !reset {
                return Err(Error::AlreadyExists { species, group });
            }
            let previous = previous.clone();
            self.flat.retain(|existing| !Arc::ptr_eq(existing, &previous));
        }
        self.adaptors
            .entry(species)
            .or_default()
            .insert(group, dba.clone());
        self.flat.push(dba);
        Ok(())
    }

    /// Adaptor registered for the (alias-resolved) species and group.
    pub(crate) fn get_db_adaptor(&self, species: &str, group: Group) -> Option<Arc<DbAdaptor>> {
        let canonical = self.resolve(species)?;
        self.adaptors.get(&canonical)?.get(&group).cloned()
    }

    /// All adaptors, optionally filtered by species and/or group.
    ///
    /// An unresolvable species filter yields the empty list.
    pub(crate) fn get_all_db_adaptors(
        &self,
        species: Option<&str>,
        group: Option<Group>,
    ) -> Vec<Arc<DbAdaptor>> {
        let canonical = match species {
            Some(name) => match self.resolve(name) {
                Some(canonical) => Some(canonical),
                None => return Vec::new(),
            },
            None => None,
        };
        self.flat
            .iter()
            .filter(|dba| group.is_none_or(|g| dba.group() == g))
            .filter(|dba| {
                canonical
                    .as_deref()
                    .is_none_or(|species| dba.species() == species)
            })
            .cloned()
            .collect()
    }

    /// All adaptors sharing the given connection coordinates.
    pub(crate) fn get_all_db_adaptors_by_connection(
        &self,
        params: &crate::adaptor::ConnectionParams,
    ) -> Vec<Arc<DbAdaptor>> {
        self.flat
            .iter()
            .filter(|dba| dba.params().same_connection(params))
            .cloned()
            .collect()
    }

    /// Remove the adaptor under `(species, group)`.
    pub(crate) fn remove_db_adaptor(
        &mut self,
        species: &str,
        group: Group,
    ) -> Option<Arc<DbAdaptor>> {
        let canonical = self.resolve(species)?;
        let slot = self.adaptors.get_mut(&canonical)?;
        let removed = slot.shift_remove(&group)?;
        if slot.is_empty() {
            self.adaptors.shift_remove(&canonical);
        }
        self.flat.retain(|existing| !Arc::ptr_eq(existing, &removed));
        Some(removed)
    }

    /// Distinct species with at least one adaptor, optionally restricted
    /// to a group.
    pub(crate) fn get_all_species(&self, group: Option<Group>) -> Vec<String> {
        let mut result = Vec::new();
        for dba in &self.flat {
            if group.is_none_or(|g| dba.group() == g) && !result.iter().any(|s| s == dba.species())
            {
                result.push(dba.species().to_string());
            }
        }
        result
    }

    /// Register a typed adaptor under `(species, group, object type)`.
    pub(crate) fn add_typed_adaptor(
        &mut self,
        species: &str,
        group: Group,
        object_type: &str,
        adaptor: Arc<dyn ObjectAdaptor>,
        reset: bool,
    ) -> Result<(), Error> {
        let species = self.resolve(species).unwrap_or_else(|| species.to_string());
        let object_type = object_type.to_lowercase();

        self.aliases
            .entry(normalize_species(&species))
            .or_insert_with(|| species.clone());

        let key = (species.clone(), group, object_type.clone());
        if self.typed.contains_key(&key) && !reset {
            return Err(Error::AlreadyExists { species, group });
        }
        if let Some(replaced) = self.typed.insert(key, adaptor.clone()) {
            if let Some(adaptors) = self.adaptors_by_type.get_mut(&object_type) {
                adaptors.retain(|existing| !Arc::ptr_eq(existing, &replaced));
            }
        }

        let types = self.types_by_species.entry(species).or_default();
        if !types.contains(&object_type) {
            types.push(object_type.clone());
        }
        self.adaptors_by_type
            .entry(object_type)
            .or_default()
            .push(adaptor);
        Ok(())
    }

    /// Typed adaptor under `(species, group, object type)`, if present.
    pub(crate) fn get_typed_adaptor(
        &self,
        species: &str,
        group: Group,
        object_type: &str,
    ) -> Option<Arc<dyn ObjectAdaptor>> {
        let canonical = self.resolve(species)?;
        self.typed
            .get(&(canonical, group, object_type.to_lowercase()))
            .cloned()
    }

    /// Object types with a typed slot for the species.
    pub(crate) fn get_all_object_types(&self, species: &str) -> Vec<String> {
        let Some(canonical) = self.resolve(species) else {
            return Vec::new();
        };
        self.types_by_species
            .get(&canonical)
            .cloned()
            .unwrap_or_default()
    }

    /// Typed adaptors serving an object type, across all species.
    pub(crate) fn get_adaptors_by_type(&self, object_type: &str) -> Vec<Arc<dyn ObjectAdaptor>> {
        self.adaptors_by_type
            .get(&object_type.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    /// Redirect sequence-type requests for `(species, group)`.
    pub(crate) fn add_dna_override(
        &mut self,
        species: &str,
        group: Group,
        dna_species: &str,
        dna_group: Group,
    ) {
        let species = self.resolve(species).unwrap_or_else(|| species.to_string());
        self.dna_overrides.insert(
            (species, group),
            (dna_species.to_string(), dna_group),
        );
    }

    /// Remove a sequence-type redirection.
    pub(crate) fn remove_dna_override(&mut self, species: &str, group: Group) {
        let species = self.resolve(species).unwrap_or_else(|| species.to_string());
        self.dna_overrides.shift_remove(&(species, group));
    }

    /// Adaptor answering sequence-type requests for `(species, group)`.
    ///
    /// Falls back to the original pair when the override target is not
    /// registered.
    pub(crate) fn get_dna_adaptor(&self, species: &str, group: Group) -> Option<Arc<DbAdaptor>> {
        let canonical = self.resolve(species)?;
        if let Some((dna_species, dna_group)) = self.dna_overrides.get(&(canonical.clone(), group))
        {
            if let Some(dba) = self.get_db_adaptor(dna_species, *dna_group) {
                return Some(dba);
            }
        }
        self.get_db_adaptor(&canonical, group)
    }

    /// Copy every adaptor and alias not already present; first-seen wins.
    ///
    /// Returns the number of adaptors copied.
    pub(crate) fn merge(&mut self, other: &Store, verbose: bool) -> usize {
        let mut copied = 0;
        for dba in &other.flat {
            if self
                .adaptors
                .get(dba.species())
                .is_some_and(|slot| slot.contains_key(&dba.group()))
            {
                if verbose {
                    tracing::info!(
                        "skipping duplicate adaptor for ({}, {})",
                        dba.species(),
                        dba.group()
                    );
                }
                continue;
            }
            // Cannot collide: presence was checked above.
            let _ = self.add_db_adaptor(dba.clone(), false);
            copied += 1;
        }
        for (alias, species) in &other.aliases {
            if self.aliases.contains_key(alias) {
                if verbose {
                    tracing::info!("skipping duplicate alias '{alias}'");
                }
                continue;
            }
            self.aliases.insert(alias.clone(), species.clone());
        }
        copied
    }

    /// Aliases grouped per canonical species, self-aliases excluded.
    pub(crate) fn aliases_by_species(&self) -> Vec<(String, Vec<String>)> {
        let mut result: IndexMap<String, Vec<String>> = IndexMap::new();
        for (alias, species) in &self.aliases {
            if *alias != normalize_species(species) {
                result.entry(species.clone()).or_default().push(alias.clone());
            }
        }
        result.into_iter().collect()
    }

    /// Close idle connections of every registered adaptor.
    pub(crate) fn disconnect_all(&self) {
        for dba in &self.flat {
            dba.disconnect_if_idle();
        }
    }

    /// Disconnect idle connections and drop all state.
    pub(crate) fn clear(&mut self) {
        self.disconnect_all();
        *self = Store::default();
    }

    /// Number of registered adaptors.
    pub(crate) fn len(&self) -> usize {
        self.flat.len()
    }

    /// Whether the store holds neither adaptors nor aliases.
    pub(crate) fn is_empty(&self) -> bool {
        self.flat.is_empty() && self.aliases.is_empty()
    }
}

//! Database groups and the static catalog describing them.

/// The role of a database in the ecosystem.
///
/// This is a closed set; configuration files name groups by their
/// `snake_case` rendering (e.g. `"stable_ids"`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Group {
    /// Core gene set of a species.
    Core,
    /// cDNA alignments.
    Cdna,
    /// Additional annotation not in the core set.
    Otherfeatures,
    /// RNA-seq based models.
    Rnaseq,
    /// Manually curated Vega annotation.
    Vega,
    /// Germline and somatic variation.
    Variation,
    /// Regulation / functional genomics.
    Funcgen,
    /// Comparative genomics.
    Compara,
    /// Ancestral sequence reconstructions.
    Ancestral,
    /// Ontology terms.
    Ontology,
    /// The dedicated stable-identifier lookup database.
    StableIds,
    /// User-supplied upload databases.
    Userupload,
    /// eHive pipeline bookkeeping.
    Hive,
    /// Legacy pipeline bookkeeping.
    Pipeline,
    /// External BLAST result store.
    Blast,
    /// External haplotype store.
    Haplotype,
    /// External SNP store.
    Snp,
}

impl Group {
    /// The adaptor module serving this group.
    ///
    /// Several groups are served by the core module; a factory must be
    /// registered under this id for the group to be loadable.
    pub fn module_id(self) -> &'static str {
        match self {
            Group::Core
            | Group::Cdna
            | Group::Otherfeatures
            | Group::Rnaseq
            | Group::Vega
            | Group::Ancestral
            | Group::Userupload => "core",
            Group::Variation => "variation",
            Group::Funcgen => "funcgen",
            Group::Compara => "compara",
            Group::Ontology => "ontology",
            Group::StableIds => "stable_ids",
            Group::Hive => "hive",
            Group::Pipeline => "pipeline",
            Group::Blast => "blast",
            Group::Haplotype => "haplotype",
            Group::Snp => "snp",
        }
    }

    /// Whether databases of this group carry harvestable species aliases.
    pub fn alias_available(self) -> bool {
        matches!(self, Group::Core | Group::Compara)
    }

    /// Whether a species filter applies to this group during server scans.
    pub fn filterable(self) -> bool {
        matches!(
            self,
            Group::Core
                | Group::Otherfeatures
                | Group::Cdna
                | Group::Vega
                | Group::Rnaseq
                | Group::Variation
                | Group::Funcgen
                | Group::Userupload
        )
    }
}

/// The order in which server scans walk the groups.
///
/// The order is observable: a database name that could bind to two groups
/// is consumed by the earlier one.
pub const GROUP_ORDER: &[Group] = &[
    Group::Core,
    Group::Otherfeatures,
    Group::Cdna,
    Group::Vega,
    Group::Rnaseq,
    Group::Variation,
    Group::Funcgen,
    Group::Userupload,
    Group::Compara,
    Group::Ancestral,
    Group::Ontology,
    Group::StableIds,
];

/// All module ids known to the catalog.
pub fn all_module_ids() -> Vec<&'static str> {
    use strum::IntoEnumIterator as _;

    let mut result = Vec::new();
    for group in Group::iter() {
        let module = group.module_id();
        if !result.contains(&module) {
            result.push(module);
        }
    }
    result
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    #[test]
    fn group_names_round_trip() {
        assert_eq!(Group::StableIds.to_string(), "stable_ids");
        assert_eq!(Group::from_str("stable_ids").unwrap(), Group::StableIds);
        assert_eq!(Group::from_str("otherfeatures").unwrap(), Group::Otherfeatures);
        assert!(Group::from_str("no_such_group").is_err());
    }

    #[test]
    fn group_order_is_fixed() {
        assert_eq!(
            GROUP_ORDER,
            &[
                Group::Core,
                Group::Otherfeatures,
                Group::Cdna,
                Group::Vega,
                Group::Rnaseq,
                Group::Variation,
                Group::Funcgen,
                Group::Userupload,
                Group::Compara,
                Group::Ancestral,
                Group::Ontology,
                Group::StableIds,
            ]
        );
    }

    #[test]
    fn alias_and_filter_tables() {
        assert!(Group::Core.alias_available());
        assert!(Group::Compara.alias_available());
        assert!(!Group::Variation.alias_available());

        assert!(Group::Funcgen.filterable());
        assert!(Group::Userupload.filterable());
        assert!(!Group::Compara.filterable());
        assert!(!Group::Ontology.filterable());
    }

    #[test]
    fn module_ids_are_catalogued() {
        assert_eq!(Group::Ancestral.module_id(), "core");
        assert_eq!(Group::Variation.module_id(), "variation");
        assert!(all_module_ids().contains(&"stable_ids"));
    }
}

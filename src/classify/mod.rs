//! Classification of database names against a release version.
//!
//! The name grammar is the compatibility surface with deployed servers:
//! a binomial or trinomial species name (or a `_collection` prefix),
//! followed by the group literal, followed by the release/assembly tail.

pub mod cli;

use regex::Regex;

use crate::group::{Group, GROUP_ORDER};

/// Species part of a database name (binomial or trinomial).
const NAME: &str = "[a-z]+_[a-z0-9]+(?:_[a-z0-9]+)?";
/// Collection prefix of a multi-species database name.
const COLLECTION: &str = r"\w+_collection";
/// Version tail: optional data version, release (captured), assembly.
const END: &str = r"(?:_\d+)?_(\d+)_\d+[a-z]?";

/// Outcome of classifying one database name.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Classification {
    /// Group the name belongs to.
    pub group: Group,
    /// Whether the database holds a species collection.
    pub multispecies: bool,
    /// The species name or collection prefix encoded in the name.
    pub encoded_name: String,
    /// Release encoded in the name; `None` for the unversioned
    /// `userupload` group.
    pub version: Option<u32>,
}

struct GroupPatterns {
    group: Group,
    single: Regex,
    collection: Option<Regex>,
}

/// Classifier with the per-group patterns compiled once.
pub struct Classifier {
    patterns: Vec<GroupPatterns>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    /// Compile the pattern pair for every group in scan order.
    pub fn new() -> Self {
        Self {
            patterns: GROUP_ORDER.iter().map(|&group| build_patterns(group)).collect(),
        }
    }

    /// Classify a name for one group only.
    ///
    /// The collection form is tried before the single-species form; a
    /// match counts only if the encoded release equals `version` (the
    /// unversioned `userupload` group matches any `version`).
    pub fn classify_for_group(
        &self,
        dbname: &str,
        group: Group,
        version: u32,
    ) -> Option<Classification> {
        let patterns = self.patterns.iter().find(|p| p.group == group)?;
        if let Some(collection) = &patterns.collection {
            if let Some(result) = try_pattern(collection, dbname, group, true, version) {
                return Some(result);
            }
        }
        try_pattern(&patterns.single, dbname, group, false, version)
    }

    /// Classify a name by walking the groups in scan order.
    pub fn classify(&self, dbname: &str, version: u32) -> Option<Classification> {
        self.patterns
            .iter()
            .find_map(|p| self.classify_for_group(dbname, p.group, version))
    }
}

fn try_pattern(
    pattern: &Regex,
    dbname: &str,
    group: Group,
    multispecies: bool,
    version: u32,
) -> Option<Classification> {
    let captures = pattern.captures(dbname)?;
    let encoded_name = captures.get(1)?.as_str().to_string();
    let encoded_version = match captures.get(2) {
        Some(m) => Some(m.as_str().parse::<u32>().ok()?),
        None => None,
    };
    if let Some(v) = encoded_version {
        if v != version {
            return None;
        }
    }
    Some(Classification {
        group,
        multispecies,
        encoded_name,
        version: encoded_version,
    })
}

fn build_patterns(group: Group) -> GroupPatterns {
    let compile =
        |pattern: String| Regex::new(&pattern).expect("invalid regex in source code");
    match group {
        Group::Userupload => GroupPatterns {
            group,
            single: compile(format!("^({NAME})_userdata$")),
            collection: Some(compile(format!("^({COLLECTION})_userdata$"))),
        },
        Group::Compara => GroupPatterns {
            group,
            single: compile(String::from(
                r"^(ensembl_compara(?:_[a-z]\w*?)?)(?:_\d+)?_(\d+)$",
            )),
            collection: None,
        },
        Group::Ancestral | Group::Ontology | Group::StableIds => GroupPatterns {
            group,
            single: compile(format!(
                r"^(ensembl[a-z]*_{kind})(?:_\d+)?_(\d+)$",
                kind = group
            )),
            collection: None,
        },
        _ => GroupPatterns {
            group,
            single: compile(format!("^({NAME})_{group}{END}$")),
            collection: Some(compile(format!("^({COLLECTION})_{group}{END}$"))),
        },
    }
}

/// Canonical species and stored group for a classification.
///
/// Most groups use the encoded name verbatim; the multi-species service
/// groups collapse onto the `multi` pseudo-species, and ancestral
/// databases are stored as the core of `Ancestral sequences`.
pub fn canonical_species_and_group(classification: &Classification) -> (String, Group) {
    match classification.group {
        Group::Compara => match classification.encoded_name.strip_prefix("ensembl_compara_") {
            Some(subname) if !subname.is_empty() => (subname.to_string(), Group::Compara),
            _ => (String::from("multi"), Group::Compara),
        },
        Group::Ontology | Group::StableIds => (String::from("multi"), classification.group),
        Group::Ancestral => (String::from("Ancestral sequences"), Group::Core),
        _ => (classification.encoded_name.clone(), classification.group),
    }
}

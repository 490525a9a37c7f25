//! Declarative configuration readers (INI and JSON).
//!
//! Both formats decode into [`RegistryConfig`], the normalized structure
//! consumed by [`crate::load::structured`].

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Error;
use crate::load::structured::{AdaptorConfig, RegistryConfig};

/// Reserved INI section whose keys become defaults for all others.
const DEFAULT_SECTION: &str = "default";

/// Parse INI text into ordered sections of ordered key/value pairs.
///
/// Supports `;` and `#` full-line comments and `key=<<TAG` heredoc values
/// terminated by a line holding only `TAG`.
fn parse_ini(text: &str) -> Result<Vec<(String, Vec<(String, String)>)>, Error> {
    let mut sections: Vec<(String, Vec<(String, String)>)> = Vec::new();
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('#') {
            continue;
        }
        if let Some(name) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            sections.push((name.trim().to_string(), Vec::new()));
            continue;
        }
        let Some((key, value)) = trimmed.split_once('=') else {
            return Err(Error::Type(format!("malformed INI line: '{trimmed}'")));
        };
        let key = key.trim().to_string();
        let value = value.trim();
        let value = if let Some(tag) = value.strip_prefix("<<") {
            let tag = tag.trim();
            let mut body = Vec::new();
            loop {
                let Some(line) = lines.next() else {
                    return Err(Error::Type(format!("unterminated heredoc '<<{tag}'")));
                };
                if line.trim_end_matches('\r').trim() == tag {
                    break;
                }
                body.push(line.trim_end_matches('\r'));
            }
            body.join("\n")
        } else {
            value.to_string()
        };
        match sections.last_mut() {
            Some((_, keys)) => keys.push((key, value)),
            None => {
                tracing::warn!("INI key '{key}' before any section, ignoring");
            }
        }
    }
    Ok(sections)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, Error> {
    match value {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        _ => Err(Error::Type(format!("key '{key}' is not a boolean: '{value}'"))),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, Error> {
    value
        .parse()
        .map_err(|_| Error::Type(format!("key '{key}' is not a number: '{value}'")))
}

/// Decode INI text into the normalized configuration.
///
/// The `[default]` section is folded into every other section; sections
/// without `species` or `group` warn and are skipped; the `alias` key
/// holds one alias per line.
pub fn read_ini_str(text: &str) -> Result<RegistryConfig, Error> {
    let sections = parse_ini(text)?;

    let mut defaults: Vec<(String, String)> = Vec::new();
    for (name, keys) in &sections {
        if name.eq_ignore_ascii_case(DEFAULT_SECTION) {
            defaults.extend(keys.iter().cloned());
        }
    }

    let mut adaptors = Vec::new();
    let mut aliases: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, keys) in &sections {
        if name.eq_ignore_ascii_case(DEFAULT_SECTION) {
            continue;
        }
        // Section keys override the defaults; last occurrence wins.
        let mut merged: BTreeMap<&str, &str> = BTreeMap::new();
        for (key, value) in defaults.iter().chain(keys.iter()) {
            merged.insert(key.as_str(), value.as_str());
        }

        if !merged.contains_key("group") {
            tracing::warn!("section '[{name}]' has no group, skipping");
            continue;
        }
        let Some(species) = merged.get("species").copied() else {
            tracing::warn!("section '[{name}]' has no species, skipping");
            continue;
        };

        let mut config = AdaptorConfig::default();
        for (key, value) in &merged {
            match *key {
                "species" => config.species = Some(value.to_string()),
                "group" => config.group = Some(value.to_string()),
                "host" => config.host = Some(value.to_string()),
                "port" => config.port = Some(parse_num(key, value)?),
                "user" => config.user = Some(value.to_string()),
                "pass" => config.pass = Some(value.to_string()),
                "dbname" => config.dbname = Some(value.to_string()),
                "driver" => config.driver = Some(value.to_string()),
                "species_id" => config.species_id = Some(parse_num(key, value)?),
                "multispecies_db" => config.multispecies_db = Some(parse_bool(key, value)?),
                "disconnect_when_inactive" => {
                    config.disconnect_when_inactive = Some(parse_bool(key, value)?)
                }
                "wait_timeout" => config.wait_timeout = Some(parse_num(key, value)?),
                "reconnect_when_connection_lost" => {
                    config.reconnect_when_lost = Some(parse_bool(key, value)?)
                }
                "alias" => {
                    let entry = aliases.entry(species.to_string()).or_default();
                    for alias in value.lines().map(str::trim).filter(|s| !s.is_empty()) {
                        if !entry.iter().any(|existing| existing == alias) {
                            entry.push(alias.to_string());
                        }
                    }
                }
                _ => {
                    tracing::debug!("ignoring unknown INI key '{key}' in section '[{name}]'");
                }
            }
        }
        adaptors.push(config);
    }

    Ok(RegistryConfig {
        adaptors: Some(adaptors),
        aliases: Some(aliases),
    })
}

/// Decode JSON text into the normalized configuration.
///
/// `{}` (defining neither adaptors nor aliases) is rejected; each key is
/// individually optional. Structural mismatches fail with [`Error::Type`].
pub fn read_json_str(text: &str) -> Result<RegistryConfig, Error> {
    let config: RegistryConfig =
        serde_json::from_str(text).map_err(|e| Error::Type(e.to_string()))?;
    if config.adaptors.is_none() && config.aliases.is_none() {
        return Err(Error::BadInput(String::from(
            "configuration defines neither adaptors nor aliases",
        )));
    }
    Ok(config)
}

/// Read an INI configuration file.
pub fn read_ini_file<P: AsRef<Path>>(path: P) -> Result<RegistryConfig, Error> {
    read_ini_str(&std::fs::read_to_string(path)?)
}

/// Read a JSON configuration file.
pub fn read_json_file<P: AsRef<Path>>(path: P) -> Result<RegistryConfig, Error> {
    read_json_str(&std::fs::read_to_string(path)?)
}

//! In-memory fake server used by the test suite.
//!
//! The mock implements [`QueryRunner`] by recognizing the statement shapes
//! the registry issues (database listing, meta queries, stable-id probes)
//! against data seeded into a [`MockBackend`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::adaptor::query::{Connector, QueryRunner, Row};
use crate::adaptor::ConnectionParams;
use crate::error::Error;

/// Seedable server state shared by every connection of one connector.
#[derive(Default)]
pub(crate) struct MockBackend {
    /// Database names answered to `SHOW DATABASES`.
    pub(crate) databases: Vec<String>,
    /// Meta rows as `(db, species_id, meta_key, meta_value)`.
    meta: Vec<(String, u32, String, String)>,
    /// Lookup rows as `(db, stable_id, species, object_type, db_type)`.
    stable_ids: Vec<(String, String, String, String, String)>,
    /// Object rows as `(db, object_type, stable_id, species value)`.
    objects: Vec<(String, String, String, String)>,
    /// Every statement passed to `query`, in order.
    queries: Mutex<Vec<String>>,
}

impl MockBackend {
    pub(crate) fn add_meta(&mut self, db: &str, species_id: u32, key: &str, value: &str) {
        self.meta
            .push((db.to_string(), species_id, key.to_string(), value.to_string()));
    }

    pub(crate) fn add_stable_id(
        &mut self,
        db: &str,
        stable_id: &str,
        species: &str,
        object_type: &str,
        db_type: &str,
    ) {
        self.stable_ids.push((
            db.to_string(),
            stable_id.to_string(),
            species.to_string(),
            object_type.to_string(),
            db_type.to_string(),
        ));
    }

    pub(crate) fn add_object(&mut self, db: &str, object_type: &str, stable_id: &str, value: &str) {
        self.objects.push((
            db.to_string(),
            object_type.to_string(),
            stable_id.to_string(),
            value.to_string(),
        ));
    }

    /// Snapshot of the statements executed so far.
    pub(crate) fn queries(&self) -> Vec<String> {
        self.queries.lock().expect("mock lock poisoned").clone()
    }
}

/// Connector over an owned backend.
pub(crate) fn mock_connector(backend: MockBackend) -> Arc<dyn Connector> {
    mock_connector_shared(Arc::new(backend))
}

/// Connector over a shared backend, so tests can inspect the query log.
pub(crate) fn mock_connector_shared(backend: Arc<MockBackend>) -> Arc<dyn Connector> {
    Arc::new(MockConnector { backend })
}

/// Connector whose every connection attempt fails.
pub(crate) fn failing_connector() -> Arc<dyn Connector> {
    Arc::new(FailingConnector)
}

struct MockConnector {
    backend: Arc<MockBackend>,
}

impl Connector for MockConnector {
    fn connect(&self, _params: &ConnectionParams) -> Result<Arc<dyn QueryRunner>, Error> {
        Ok(Arc::new(MockRunner {
            backend: self.backend.clone(),
            connected: AtomicBool::new(true),
        }))
    }
}

struct FailingConnector;

impl Connector for FailingConnector {
    fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn QueryRunner>, Error> {
        Err(Error::backend(format!(
            "access denied for {}",
            params.locator()
        )))
    }
}

struct MockRunner {
    backend: Arc<MockBackend>,
    connected: AtomicBool,
}

impl QueryRunner for MockRunner {
    fn query(&self, sql: &str, params: &[&str]) -> Result<Vec<Row>, Error> {
        self.backend
            .queries
            .lock()
            .expect("mock lock poisoned")
            .push(sql.to_string());

        if let Some(pattern) = sql
            .strip_prefix("SHOW DATABASES LIKE '")
            .and_then(|s| s.strip_suffix('\''))
        {
            return Ok(self
                .backend
                .databases
                .iter()
                .filter(|name| like_match(name, pattern))
                .map(|name| vec![Some(name.clone())])
                .collect());
        }

        if sql.contains(".stable_id_lookup") {
            return Ok(self.stable_id_rows(sql, params));
        }

        let Some((db, table)) = from_clause(sql) else {
            return Err(Error::backend(format!("unhandled SQL in mock: {sql}")));
        };
        match table.as_str() {
            "meta" => Ok(self.meta_rows(sql, params, &db)),
            "gene_tree_root" => Ok(self.object_rows(&db, "genetree", params)),
            "gene" | "transcript" | "translation" | "exon" | "operon" | "operon_transcript" => {
                let object_type = if table == "operon_transcript" {
                    "operontranscript"
                } else {
                    table.as_str()
                };
                Ok(self.object_rows(&db, object_type, params))
            }
            _ => Err(Error::backend(format!("unhandled SQL in mock: {sql}"))),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn disconnect_if_idle(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl std::ops::Deref for MockRunner {
    type Target = MockBackend;

    fn deref(&self) -> &MockBackend {
        &self.backend
    }
}

impl MockRunner {
    fn meta_rows(&self, sql: &str, params: &[&str], db: &str) -> Vec<Row> {
        if sql.contains("m1.meta_key = 'species.production_name'") {
            // The alias batch self-join of collection databases.
            let mut rows = Vec::new();
            for (d1, id1, key1, value1) in &self.meta {
                if d1 != db || key1 != "species.production_name" {
                    continue;
                }
                for (d2, id2, key2, value2) in &self.meta {
                    if d2 == db && id2 == id1 && key2 == "species.alias" {
                        rows.push(vec![Some(value1.clone()), Some(value2.clone())]);
                    }
                }
            }
            return rows;
        }
        if sql.starts_with("SELECT species_id, meta_value") {
            return self
                .meta
                .iter()
                .filter(|(d, _, key, _)| d == db && key == "species.production_name")
                .map(|(_, id, _, value)| vec![Some(id.to_string()), Some(value.clone())])
                .collect();
        }
        // Plain alias query, optionally scoped by species_id.
        let species_id = sql
            .contains("species_id = ?")
            .then(|| params.last().and_then(|p| p.parse::<u32>().ok()))
            .flatten();
        self.meta
            .iter()
            .filter(|(d, id, key, _)| {
                d == db && key == "species.alias" && species_id.is_none_or(|wanted| *id == wanted)
            })
            .map(|(_, _, _, value)| vec![Some(value.clone())])
            .collect()
    }

    fn stable_id_rows(&self, sql: &str, params: &[&str]) -> Vec<Row> {
        let mut params = params.iter();
        let stable_id = params.next().copied().unwrap_or_default();
        let species = sql.contains("AND name = ?").then(|| params.next()).flatten();
        let db_type = sql
            .contains("AND db_type = ?")
            .then(|| params.next())
            .flatten();
        let object_type = sql
            .contains("AND object_type = ?")
            .then(|| params.next())
            .flatten();
        self.stable_ids
            .iter()
            .filter(|(_, id, name, otype, dtype)| {
                id == stable_id
                    && species.is_none_or(|s| name == *s)
                    && db_type.is_none_or(|d| dtype == *d)
                    && object_type.is_none_or(|o| otype == *o)
            })
            .map(|(_, _, name, otype, dtype)| {
                vec![Some(name.clone()), Some(otype.clone()), Some(dtype.clone())]
            })
            .collect()
    }

    fn object_rows(&self, db: &str, object_type: &str, params: &[&str]) -> Vec<Row> {
        let stable_id = params.first().copied().unwrap_or_default();
        self.objects
            .iter()
            .filter(|(d, otype, id, _)| d == db && otype == object_type && id == stable_id)
            .map(|(_, _, _, value)| vec![Some(value.clone())])
            .collect()
    }
}

/// First `db.table` token after `FROM`.
fn from_clause(sql: &str) -> Option<(String, String)> {
    let rest = sql.split("FROM ").nth(1)?;
    let token = rest.split_whitespace().next()?;
    let (db, table) = token.split_once('.')?;
    Some((db.to_string(), table.to_string()))
}

/// Translate a MySQL `LIKE` pattern into a match against `name`.
fn like_match(name: &str, pattern: &str) -> bool {
    let mut regex = String::from("^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    regex.push_str(&regex::escape(&escaped.to_string()));
                }
            }
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex.push('$');
    regex::Regex::new(&regex)
        .expect("invalid LIKE pattern")
        .is_match(name)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn like_patterns_translate() {
        assert!(like_match("homo_sapiens_core_65_37", "%\\_65%"));
        assert!(!like_match("homo_sapiens_core_64_36", "%\\_65%"));
        assert!(like_match("userdata_fish_userdata", "userdata%"));
        assert!(!like_match("fish_userdata", "userdata%"));
        // A bare underscore matches any single character.
        assert!(like_match("ab", "a_"));
    }
}

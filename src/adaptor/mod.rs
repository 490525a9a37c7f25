//! Database adaptors and the factory registry that creates them.

pub mod query;

#[cfg(feature = "mysql-native")]
pub mod mysql;

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::group::{self, Group};
use query::{Connector, QueryRunner};

/// Connection coordinates for one database.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Server host name.
    pub host: String,
    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// User name.
    #[serde(default = "default_user")]
    pub user: String,
    /// Password, if any.
    pub pass: Option<String>,
    /// Database name on the server; empty for a server-level connection.
    #[serde(default)]
    pub dbname: String,
    /// Driver name; only `"mysql"` is meaningful today.
    #[serde(default = "default_driver")]
    pub driver: String,
    /// Server-side wait timeout in seconds; 0 leaves the server default.
    #[serde(default)]
    pub wait_timeout: u32,
    /// Disconnect after each unit of work when otherwise inactive.
    #[serde(default)]
    pub disconnect_when_inactive: bool,
    /// Transparently reconnect when the connection was lost.
    #[serde(default)]
    pub reconnect_when_lost: bool,
}

fn default_port() -> u16 {
    3306
}

fn default_user() -> String {
    String::from("ensro")
}

fn default_driver() -> String {
    String::from("mysql")
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: default_port(),
            user: default_user(),
            pass: None,
            dbname: String::new(),
            driver: default_driver(),
            wait_timeout: 0,
            disconnect_when_inactive: false,
            reconnect_when_lost: false,
        }
    }
}

impl ConnectionParams {
    /// Locator identifying the server endpoint and account.
    pub fn locator(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.user)
    }

    /// Locator including the database name.
    pub fn locator_with_dbname(&self) -> String {
        format!("{}/{}", self.locator(), self.dbname)
    }

    /// Whether both sides address the same database through the same
    /// account.
    pub fn same_connection(&self, other: &ConnectionParams) -> bool {
        self.host == other.host
            && self.port == other.port
            && self.user == other.user
            && self.dbname == other.dbname
    }
}

/// A registered database source.
///
/// The handle owns its connection lazily; nothing is opened until the
/// first query against it.
pub struct DbAdaptor {
    species: String,
    species_id: u32,
    group: Group,
    multispecies: bool,
    no_cache: bool,
    params: ConnectionParams,
    connector: Arc<dyn Connector>,
    runner: Mutex<Option<Arc<dyn QueryRunner>>>,
}

impl std::fmt::Debug for DbAdaptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbAdaptor")
            .field("species", &self.species)
            .field("species_id", &self.species_id)
            .field("group", &self.group)
            .field("multispecies", &self.multispecies)
            .field("dbname", &self.params.dbname)
            .field("locator", &self.params.locator())
            .finish()
    }
}

impl DbAdaptor {
    /// Create an adaptor from factory arguments.
    pub fn new(args: AdaptorArgs, connector: Arc<dyn Connector>) -> Self {
        Self {
            species: args.species,
            species_id: args.species_id,
            group: args.group,
            multispecies: args.multispecies,
            no_cache: args.no_cache,
            params: args.params,
            connector,
            runner: Mutex::new(None),
        }
    }

    /// Canonical species this adaptor serves.
    pub fn species(&self) -> &str {
        &self.species
    }

    /// Species id within the database (1 for single-species schemas).
    pub fn species_id(&self) -> u32 {
        self.species_id
    }

    /// Group this adaptor is registered under.
    pub fn group(&self) -> Group {
        self.group
    }

    /// Whether the backing database is a species collection.
    pub fn is_multispecies(&self) -> bool {
        self.multispecies
    }

    /// Whether downstream caches are disabled for this adaptor.
    pub fn no_cache(&self) -> bool {
        self.no_cache
    }

    /// Connection coordinates.
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// Connection for this adaptor, opened on first use.
    pub fn runner(&self) -> Result<Arc<dyn QueryRunner>, Error> {
        let mut guard = self.runner.lock().expect("adaptor lock poisoned");
        if let Some(runner) = guard.as_ref() {
            if runner.is_connected() {
                return Ok(runner.clone());
            }
        }
        let runner = self.connector.connect(&self.params)?;
        *guard = Some(runner.clone());
        Ok(runner)
    }

    /// Close the underlying connection if it is open and idle.
    pub fn disconnect_if_idle(&self) {
        let guard = self.runner.lock().expect("adaptor lock poisoned");
        if let Some(runner) = guard.as_ref() {
            runner.disconnect_if_idle();
        }
    }
}

/// A typed per-object adaptor living under a `(species, group, type)` slot.
pub trait ObjectAdaptor: Send + Sync {
    /// The object type this adaptor serves (`"gene"`, `"transcript"`, ...).
    fn object_type(&self) -> &str;

    /// The database adaptor this adaptor reads from.
    fn db_adaptor(&self) -> &Arc<DbAdaptor>;

    /// Downcasting support for specialized adaptors.
    fn as_any(&self) -> &dyn Any;
}

/// Object adaptor used when a group has no specialized implementation for
/// the requested type.
pub struct GenericAdaptor {
    object_type: String,
    dba: Arc<DbAdaptor>,
}

impl GenericAdaptor {
    /// Create a generic adaptor for the given type.
    pub fn new(object_type: &str, dba: Arc<DbAdaptor>) -> Self {
        Self {
            object_type: object_type.to_lowercase(),
            dba,
        }
    }
}

impl ObjectAdaptor for GenericAdaptor {
    fn object_type(&self) -> &str {
        &self.object_type
    }

    fn db_adaptor(&self) -> &Arc<DbAdaptor> {
        &self.dba
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Arguments handed to a database-adaptor factory.
#[derive(Debug, Clone)]
pub struct AdaptorArgs {
    /// Canonical species name (already suffixed where applicable).
    pub species: String,
    /// Species id within the database.
    pub species_id: u32,
    /// Group to register under.
    pub group: Group,
    /// Whether the database is a species collection.
    pub multispecies: bool,
    /// Disable downstream caches.
    pub no_cache: bool,
    /// Connection coordinates.
    pub params: ConnectionParams,
}

impl AdaptorArgs {
    /// Arguments for a plain single-species adaptor.
    pub fn new(species: &str, group: Group, params: ConnectionParams) -> Self {
        Self {
            species: species.to_string(),
            species_id: 1,
            group,
            multispecies: false,
            no_cache: false,
            params,
        }
    }
}

/// Creates a [`DbAdaptor`] for one module.
pub type DbAdaptorFactory =
    Arc<dyn Fn(AdaptorArgs, Arc<dyn Connector>) -> Result<Arc<DbAdaptor>, Error> + Send + Sync>;

/// Creates a typed object adaptor on top of a database adaptor.
pub type ObjectAdaptorFactory = Arc<dyn Fn(Arc<DbAdaptor>) -> Arc<dyn ObjectAdaptor> + Send + Sync>;

/// Registry of adaptor factories, keyed by module id.
///
/// This stands in for the source ecosystem's dynamically loaded adaptor
/// classes: a group whose module id has no entry behaves like an
/// uninstalled module, and loaders warn and skip it.
#[derive(Clone, Default)]
pub struct FactoryRegistry {
    db: HashMap<&'static str, DbAdaptorFactory>,
    typed: HashMap<(String, String), ObjectAdaptorFactory>,
}

impl FactoryRegistry {
    /// An empty factory set; every group is unavailable.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Factory set with the stock adaptor registered for every module.
    pub fn with_defaults() -> Self {
        let mut result = Self::empty();
        for module in group::all_module_ids() {
            result.register_db(module, Arc::new(|args, connector| {
                Ok(Arc::new(DbAdaptor::new(args, connector)))
            }));
        }
        result.register_typed(
            Group::StableIds.module_id(),
            crate::lookup::STABLE_ID_LOOKUP_TYPE,
            Arc::new(|dba| Arc::new(crate::lookup::StableIdLookupAdaptor::new(dba))),
        );
        result
    }

    /// Register a database-adaptor factory for a module.
    pub fn register_db(&mut self, module: &'static str, factory: DbAdaptorFactory) {
        self.db.insert(module, factory);
    }

    /// Remove a module's database-adaptor factory.
    pub fn unregister_db(&mut self, module: &str) {
        self.db.remove(module);
    }

    /// Register a typed-adaptor factory for `(module, object type)`.
    pub fn register_typed(
        &mut self,
        module: &str,
        object_type: &str,
        factory: ObjectAdaptorFactory,
    ) {
        self.typed
            .insert((module.to_string(), object_type.to_lowercase()), factory);
    }

    /// Whether a database-adaptor factory is registered for the module.
    pub fn has_module(&self, module: &str) -> bool {
        self.db.contains_key(module)
    }

    /// Typed-adaptor factory for `(module, object type)`, if registered.
    pub fn typed_factory(&self, module: &str, object_type: &str) -> Option<&ObjectAdaptorFactory> {
        self.typed
            .get(&(module.to_string(), object_type.to_lowercase()))
    }

    /// Create an adaptor through the factory registered for the group's
    /// module.
    pub fn create(
        &self,
        args: AdaptorArgs,
        connector: Arc<dyn Connector>,
    ) -> Result<Arc<DbAdaptor>, Error> {
        let module = args.group.module_id();
        let factory = self
            .db
            .get(module)
            .ok_or_else(|| Error::UnavailableModule(module.to_string()))?;
        factory(args, connector)
    }
}

/// The connector compiled into this build.
///
/// With the `mysql-native` feature this is a real MySQL connector;
/// otherwise it is [`query::NoDriverConnector`] and every connection
/// attempt reports the driver module as unavailable.
pub fn default_connector() -> Result<Arc<dyn Connector>, Error> {
    #[cfg(feature = "mysql-native")]
    {
        Ok(Arc::new(mysql::MysqlConnector::new()?))
    }
    #[cfg(not(feature = "mysql-native"))]
    {
        Ok(Arc::new(query::NoDriverConnector))
    }
}

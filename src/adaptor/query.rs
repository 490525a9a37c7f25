//! The query seam between the registry and a SQL backend.
//!
//! The concrete MySQL client is deliberately kept out of the library; every
//! statement the registry issues goes through [`QueryRunner`], and
//! connections are opened through [`Connector`].

use std::sync::Arc;

use crate::adaptor::ConnectionParams;
use crate::error::Error;

/// One result row, column values in select order.
pub type Row = Vec<Option<String>>;

/// Minimal interface to an open database connection.
pub trait QueryRunner: Send + Sync {
    /// Run a statement with `?` placeholders bound to `params`.
    fn query(&self, sql: &str, params: &[&str]) -> Result<Vec<Row>, Error>;

    /// Whether the connection is currently open.
    fn is_connected(&self) -> bool;

    /// Close the connection if no work is in flight.
    fn disconnect_if_idle(&self);
}

/// Opens connections for given connection parameters.
///
/// Implementations must connect eagerly so that authentication failures
/// surface from [`Connector::connect`] and not from a later query.
pub trait Connector: Send + Sync {
    /// Open a connection to the database addressed by `params`.
    fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn QueryRunner>, Error>;
}

/// Connector used when no database driver is compiled in.
///
/// Every connection attempt fails with [`Error::UnavailableModule`], which
/// loaders treat like any other unavailable module.
pub struct NoDriverConnector;

impl Connector for NoDriverConnector {
    fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn QueryRunner>, Error> {
        Err(Error::UnavailableModule(format!(
            "{} driver",
            params.driver
        )))
    }
}

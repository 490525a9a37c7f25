//! MySQL-backed connector, available behind the `mysql-native` feature.
//!
//! The async driver is run to completion on a private current-thread
//! runtime, keeping the rest of the crate synchronous.

use std::sync::{Arc, Mutex};

use mysql_async::prelude::Queryable as _;

use crate::adaptor::query::{Connector, QueryRunner, Row};
use crate::adaptor::ConnectionParams;
use crate::error::Error;

/// Connector backed by `mysql_async`.
pub struct MysqlConnector {
    runtime: Arc<tokio::runtime::Runtime>,
}

impl MysqlConnector {
    /// Create the connector with its own runtime.
    pub fn new() -> Result<Self, Error> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(Error::Io)?;
        Ok(Self {
            runtime: Arc::new(runtime),
        })
    }
}

impl Connector for MysqlConnector {
    fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn QueryRunner>, Error> {
        let mut opts = mysql_async::OptsBuilder::default()
            .ip_or_hostname(params.host.clone())
            .tcp_port(params.port)
            .user(Some(params.user.clone()))
            .pass(params.pass.clone());
        if !params.dbname.is_empty() {
            opts = opts.db_name(Some(params.dbname.clone()));
        }
        if params.wait_timeout > 0 {
            opts = opts.wait_timeout(Some(params.wait_timeout as usize));
        }
        let conn = self
            .runtime
            .block_on(mysql_async::Conn::new(opts))
            .map_err(Error::backend)?;
        Ok(Arc::new(MysqlRunner {
            runtime: self.runtime.clone(),
            conn: Mutex::new(Some(conn)),
        }))
    }
}

/// One open connection; statements run to completion on the owning
/// runtime.
struct MysqlRunner {
    runtime: Arc<tokio::runtime::Runtime>,
    conn: Mutex<Option<mysql_async::Conn>>,
}

impl QueryRunner for MysqlRunner {
    fn query(&self, sql: &str, params: &[&str]) -> Result<Vec<Row>, Error> {
        let mut guard = self.conn.lock().expect("connection lock poisoned");
        let conn = guard
            .as_mut()
            .ok_or_else(|| Error::backend(String::from("connection is closed")))?;
        let rows: Vec<mysql_async::Row> = if params.is_empty() {
            self.runtime
                .block_on(conn.query(sql))
                .map_err(Error::backend)?
        } else {
            let values = params
                .iter()
                .map(|p| mysql_async::Value::from(*p))
                .collect::<Vec<_>>();
            self.runtime
                .block_on(conn.exec(sql, mysql_async::Params::Positional(values)))
                .map_err(Error::backend)?
        };
        Ok(rows
            .into_iter()
            .map(|row| {
                (0..row.len())
                    .map(|index| row.get::<Option<String>, _>(index).flatten())
                    .collect()
            })
            .collect())
    }

    fn is_connected(&self) -> bool {
        self.conn.lock().expect("connection lock poisoned").is_some()
    }

    fn disconnect_if_idle(&self) {
        let conn = self.conn.lock().expect("connection lock poisoned").take();
        if let Some(conn) = conn {
            if let Err(error) = self.runtime.block_on(conn.disconnect()) {
                tracing::warn!("error on disconnect: {error}");
            }
        }
    }
}

//! Scanning several servers into one registry.

use std::sync::Arc;

use crate::adaptor::query::Connector;
use crate::error::Error;
use crate::load::db_scan::{load_registry_from_db, ScanOptions};
use crate::registry::Registry;

/// Scan every server in declaration order and merge the results.
///
/// Each scan runs into a temporary registry sharing the target's factory
/// set; the merge keeps the first-seen adaptor and alias for every key.
/// Returns the number of adaptors added to the target registry.
pub fn load_registry_from_multiple_dbs(
    registry: &Registry,
    connector: &Arc<dyn Connector>,
    all_opts: &[ScanOptions],
) -> Result<usize, Error> {
    let mut added = 0;
    for opts in all_opts {
        let scratch = Registry::with_factories(registry.factories());
        let scanned = load_registry_from_db(&scratch, connector, opts)?;
        let copied = registry.merge(&scratch, opts.verbose);
        tracing::debug!(
            "scan of {} found {scanned} adaptors, {copied} were new",
            opts.host
        );
        added += copied;
    }
    Ok(added)
}

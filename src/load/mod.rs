//! Loaders that populate a registry.

pub mod cli;
pub mod config;
pub mod db_scan;
pub mod multi;
pub mod structured;
pub mod url;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::adaptor::query::Connector;
use crate::error::Error;
use crate::registry::Registry;

/// Environment variable consulted when no configuration path is given.
pub const ENV_REGISTRY: &str = "ENSEMBL_REGISTRY";

/// Default configuration file in the user's home directory.
pub const HOME_CONFIG: &str = ".ensembl_init";

/// Resolve the configuration file to load.
fn discover_config(path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = path {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(ENV_REGISTRY) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(HOME_CONFIG))
}

/// Load a configuration file into the registry.
///
/// Without an explicit path, the `ENSEMBL_REGISTRY` environment variable
/// and then `$HOME/.ensembl_init` are consulted. A missing file yields an
/// empty registry; an unsupported extension is an error. Returns the
/// number of adaptors registered.
pub fn load_all(
    registry: &Registry,
    connector: &Arc<dyn Connector>,
    path: Option<&Path>,
    no_cache: bool,
) -> Result<usize, Error> {
    let Some(path) = discover_config(path) else {
        tracing::debug!("no registry configuration file found");
        return Ok(0);
    };
    if !path.exists() {
        tracing::warn!("registry configuration '{}' does not exist", path.display());
        return Ok(0);
    }
    let decoded = match path.extension().and_then(std::ffi::OsStr::to_str) {
        Some("ini") => config::read_ini_file(&path)?,
        Some("json") => config::read_json_file(&path)?,
        _ => {
            return Err(Error::BadInput(format!(
                "unsupported configuration format: {}",
                path.display()
            )))
        }
    };
    structured::load_registry_from_config(registry, connector, &decoded, no_cache)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::group::Group;
    use crate::testing::{mock_connector, MockBackend};
    use pretty_assertions::assert_eq;

    #[test]
    fn explicit_ini_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.ini");
        std::fs::write(&path, "[human_core]\nspecies=human\ngroup=core\ndbname=db\n").unwrap();

        let registry = Registry::new();
        let connector = mock_connector(MockBackend::default());
        let registered = load_all(&registry, &connector, Some(path.as_path()), false).unwrap();
        assert_eq!(registered, 1);
        assert!(registry.get_db_adaptor("human", Group::Core).is_some());
    }

    #[test]
    fn explicit_json_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(
            &path,
            r#"{"adaptors":[{"species":"human","group":"core","dbname":"db"}]}"#,
        )
        .unwrap();

        let registry = Registry::new();
        let connector = mock_connector(MockBackend::default());
        assert_eq!(
            load_all(&registry, &connector, Some(path.as_path()), false).unwrap(),
            1
        );
    }

    #[test]
    fn missing_file_yields_an_empty_registry() {
        let registry = Registry::new();
        let connector = mock_connector(MockBackend::default());
        let registered = load_all(
            &registry,
            &connector,
            Some(Path::new("/nonexistent/registry.ini")),
            false,
        )
        .unwrap();
        assert_eq!(registered, 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.pl");
        std::fs::write(&path, "# a scripted configuration\n").unwrap();

        let registry = Registry::new();
        let connector = mock_connector(MockBackend::default());
        assert!(matches!(
            load_all(&registry, &connector, Some(path.as_path()), false),
            Err(Error::BadInput(_))
        ));
    }
}

//! Error type definition.

use thiserror::Error;

use crate::group::Group;

/// Error type for `ensembl-registry`.
#[derive(Error, Debug)]
pub enum Error {
    /// A required argument was missing or empty.
    #[error("missing required argument: {0}")]
    BadInput(String),
    /// A configuration document does not have the expected structure.
    #[error("invalid configuration structure: {0}")]
    Type(String),
    /// No alias resolves for the requested species.
    #[error("no alias found for species '{0}'")]
    NotFound(String),
    /// The `(species, group)` adaptor slot is already taken.
    #[error("adaptor already registered for species '{species}' and group '{group}'")]
    AlreadyExists {
        /// Canonical species of the colliding registration.
        species: String,
        /// Group of the colliding registration.
        group: Group,
    },
    /// A registry URL does not match the accepted grammar.
    #[error("bad registry URL '{url}': {reason}")]
    BadUrl {
        /// The offending URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
    /// No adaptor factory is registered for a module.
    #[error("no adaptor module available for '{0}'")]
    UnavailableModule(String),
    /// Failure in the underlying database layer.
    #[error("database error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Error in underlying I/O.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap an arbitrary database-layer failure.
    pub fn backend<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::Backend(err.into())
    }
}

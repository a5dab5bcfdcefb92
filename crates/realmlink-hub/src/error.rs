//! Error types for hub construction.

use realmlink_realm::RealmError;

use crate::config::ConfigError;

/// Errors that abort hub construction. No partial hub is ever returned.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// A relay link references a key with no registered realm.
    #[error("unknown realm: {0}")]
    UnknownRealm(String),

    /// Two realms were registered under the same key.
    #[error("duplicate realm: {0}")]
    DuplicateRealm(String),

    /// A configured realm key contains the sub-realm delimiter.
    #[error("invalid realm key {0:?}: keys must not contain the sub-realm delimiter")]
    InvalidKey(String),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A realm could not be constructed from its settings.
    #[error("realm {realm}: {source}")]
    Realm {
        /// Key of the realm that failed.
        realm: String,
        /// The underlying failure.
        #[source]
        source: RealmError,
    },
}

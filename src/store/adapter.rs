//! Persistence adapter abstraction: hash maps, sets, and prefix iteration
//! over a key/value store, with no multi-key transaction requirement.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("persistence adapter unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
    #[error("malformed record at key {key}: {reason}")]
    Malformed { key: String, reason: String },
}

impl AdapterError {
    /// Is this the kind of adapter failure that won't clear up by retrying
    /// the next cell (e.g. authentication failure), per §7's distinction
    /// between a transient `AdapterUnavailable` and a fatal one?
    #[must_use]
    pub(crate) fn is_fatal(&self) -> bool {
        match self {
            Self::Unavailable(error) => crate::util::error::is_fatal(error),
            Self::Malformed { .. } => false,
        }
    }
}

/// Abstraction over a key/value store providing string-keyed hash maps,
/// string sets, and prefix-enumerable keys.
///
/// Implementations must make a single field-set on a hash or a single
/// element-add to a set atomic; no cross-key transaction is required.
pub trait StoreAdapter: Send + Sync {
    /// Set one field on the hash at `key`. Creates the hash if absent.
    ///
    /// # Errors
    /// Returns `AdapterError::Unavailable` if the underlying store cannot be reached.
    fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), AdapterError>;

    /// Set several fields on the hash at `key` in one call.
    ///
    /// # Errors
    /// Returns `AdapterError::Unavailable` if the underlying store cannot be reached.
    fn hash_set_multiple(&self, key: &str, fields: &[(&str, &str)]) -> Result<(), AdapterError>;

    /// Read one field from the hash at `key`, or `None` if the hash or field is absent.
    ///
    /// # Errors
    /// Returns `AdapterError::Unavailable` if the underlying store cannot be reached.
    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, AdapterError>;

    /// Read all fields of the hash at `key`. Empty map if the hash is absent.
    ///
    /// # Errors
    /// Returns `AdapterError::Unavailable` if the underlying store cannot be reached.
    fn hash_get_all(&self, key: &str) -> Result<Vec<(String, String)>, AdapterError>;

    /// Does the hash at `key` have `field` set already?
    ///
    /// # Errors
    /// Returns `AdapterError::Unavailable` if the underlying store cannot be reached.
    fn hash_contains(&self, key: &str, field: &str) -> Result<bool, AdapterError>;

    /// Add `member` to the set at `key`. Creates the set if absent.
    ///
    /// # Errors
    /// Returns `AdapterError::Unavailable` if the underlying store cannot be reached.
    fn set_add(&self, key: &str, member: &str) -> Result<(), AdapterError>;

    /// Members of the set at `key`. Empty if the set is absent.
    ///
    /// # Errors
    /// Returns `AdapterError::Unavailable` if the underlying store cannot be reached.
    fn set_members(&self, key: &str) -> Result<Vec<String>, AdapterError>;

    /// Number of members of the set at `key`.
    ///
    /// # Errors
    /// Returns `AdapterError::Unavailable` if the underlying store cannot be reached.
    fn set_size(&self, key: &str) -> Result<usize, AdapterError>;
}

//! Shared error types for the services crate.

use thiserror::Error;

use mastery_core::model::SettingsError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Failures on the durable side of a store.
///
/// These never reach callers of store operations: they are logged and the
/// in-memory state stays authoritative.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PersistError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("could not encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("could not decode snapshot: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Errors emitted while bootstrapping the progression engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

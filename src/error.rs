//! Error kinds surfaced to callers.
//!
//! Provider failures are deliberately absent here: they are recovered locally as
//! "absent" or "empty series" and only logged. What remains are failures a caller
//! has to act on.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to persist the identifier cache / watch-list store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write store {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize store: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to replace store {path:?}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
}

/// Failure to read the runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

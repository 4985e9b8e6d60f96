use std::path::PathBuf;

use melt_core::CoreError;

/// Errors from dumping, loading, and the bootstrap artifacts.
///
/// Any of these aborts the whole dump or load; there is no partial
/// recovery of a half-written or half-read store.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("i/o on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store was written by an incompatible schema.
    #[error("schema version mismatch: store has {found}, expected {expected}")]
    SchemaVersion { found: i64, expected: i64 },

    /// A persisted object row the loader cannot make sense of.
    #[error("malformed row for object {id}: {detail}")]
    BadRow { id: String, detail: String },

    /// A bootstrap artifact the boot reader cannot make sense of.
    #[error("bad bootstrap artifact {path}: {detail}")]
    BadArtifact { path: PathBuf, detail: String },
}

impl PersistError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PersistError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for persistence operations.
pub type Result<T> = std::result::Result<T, PersistError>;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("application number already registered: {0}")]
    DuplicateApplication(String),

    #[error("CRM id already registered: {0}")]
    DuplicateCrmId(String),

    #[error("matter not found: {0}")]
    MatterNotFound(String),

    #[error("{0}")]
    Other(String),
}

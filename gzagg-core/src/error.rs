use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AggError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog error under {path}: {source}")]
    Catalog {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot decompress {path}: {source}")]
    Decompress {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{count} file(s) could not be aggregated; first failure: {first}")]
    FilesFailed { count: u64, first: String },

    #[error("Worker error: {0}")]
    Worker(String),
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, AggError>;

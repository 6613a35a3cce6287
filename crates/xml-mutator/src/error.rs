//! Typed errors for the parts of the crate that are not on the AFL++ hot path.
//!
//! The dispatcher itself never propagates a `Result` across the host boundary: strategy
//! failures collapse to a sentinel buffer. `MutatorError` is for `init`, config loading, and
//! persistence, where a `thiserror`-based enum plus `anyhow::Context` at the CLI layer is the
//! idiom used throughout.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MutatorError {
    #[error("failed to read config file {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML config {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unknown strategy type {0:?}")]
    UnknownStrategy(String),

    #[error("unknown metric type {0:?}")]
    UnknownMetric(String),

    #[error("mutator config is missing required field {0}")]
    MissingField(&'static str),

    #[error("failed to read seed corpus file {path}: {source}")]
    CorpusIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to snapshot persisted state: {0}")]
    PersistWrite(#[source] serde_cbor::Error),

    #[error("failed to restore persisted state: {0}")]
    PersistRead(#[source] serde_cbor::Error),

    #[error("failed to access backup file {path}: {source}")]
    BackupIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, MutatorError>;

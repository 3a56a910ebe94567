//! Crate-level error type and `Result` alias.

use std::path::PathBuf;

/// Errors produced by the cache layer itself.
///
/// Cache misses are not errors (`get` returns `Option`), and producer
/// failures inside [`crate::cache::Memoizer`] propagate as the producer's
/// own error type. This enum only covers configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

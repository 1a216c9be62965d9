use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading data, preparing it, or configuring a run.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O failure on a named file.
    #[error("I/O error on `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed dataset contents.
    #[error("parse error: {0}")]
    Parse(String),

    /// Array dimensions that do not line up.
    #[error("shape mismatch: {0}")]
    Shape(String),

    /// Invalid hyperparameters or settings.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

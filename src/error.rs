//! Error types for a galaxy build.
//!
//! Only structural problems surface here. Bad cells become nulls and
//! missing columns are dropped from the output, neither of which is an
//! error.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Pipeline stage that produced an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Staging,
    Dimensions,
    Facts,
    Export,
}

impl Stage {
    pub fn as_str(&self) -> &str {
        match self {
            Stage::Staging => "staging",
            Stage::Dimensions => "dimensions",
            Stage::Facts => "facts",
            Stage::Export => "export",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that abort a run.
#[derive(Error, Debug)]
pub enum EtlError {
    /// A required feed file does not exist
    #[error("required input `{feed}` not found at {}", path.display())]
    MissingInput { feed: String, path: PathBuf },

    /// A feed file exists but could not be read as CSV
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A stage could not complete
    #[error("{stage} stage failed: {message}")]
    Stage { stage: Stage, message: String },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// YAML configuration could not be parsed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Arrow array or batch construction error
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet encoding error
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EtlError {
    pub fn stage(stage: Stage, message: impl Into<String>) -> Self {
        EtlError::Stage {
            stage,
            message: message.into(),
        }
    }

    /// Whether the run failed because a required input was unavailable.
    pub fn is_missing_input(&self) -> bool {
        matches!(self, EtlError::MissingInput { .. })
    }
}

pub type Result<T, E = EtlError> = std::result::Result<T, E>;

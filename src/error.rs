use std::path::PathBuf;

use thiserror::Error;

/// Everything that can stop a pipeline stage. Per-row parse problems are not
/// represented here, those are recovered where they happen.
#[derive(Error, Debug)]
pub enum MagrefError {
    #[error("Required input not found: {}", path.display())]
    MissingInput { path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing table {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Unexpected format in {}: {detail}", path.display())]
    Schema { path: PathBuf, detail: String },

    #[error("Error reading sequences from {}: {detail}", path.display())]
    Fasta { path: PathBuf, detail: String },

    #[error("Genome ID '{id}' not found in ID map ({context}). Check mapping file or naming consistency.")]
    UnmappedIdentifier { id: String, context: String },

    #[error("{0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, MagrefError>;

impl MagrefError {
    pub fn io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> MagrefError {
        MagrefError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv<P: Into<PathBuf>>(path: P, source: csv::Error) -> MagrefError {
        MagrefError::Csv {
            path: path.into(),
            source,
        }
    }

    pub fn schema<P: Into<PathBuf>, S: Into<String>>(path: P, detail: S) -> MagrefError {
        MagrefError::Schema {
            path: path.into(),
            detail: detail.into(),
        }
    }
}

use std::path::PathBuf;

use mrlcheck_core::LookupError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("source file not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("unsupported source format: {0} (expected .parquet or .csv)")]
    UnsupportedFormat(PathBuf),

    #[error("pesticide_mrl table is missing column `{0}`")]
    MissingColumn(String),

    #[error("no results for query")]
    NoResults,

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("{0}")]
    Other(String),
}

impl From<StoreError> for LookupError {
    fn from(err: StoreError) -> Self {
        LookupError::new("duckdb", err)
    }
}

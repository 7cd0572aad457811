use thiserror::Error;

use crate::LookupError;

/// Malformed request input. Fatal to the call, never retried.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("unknown target market: {0}. Use 'EU' or 'Codex'.")]
    UnsupportedMarket(String),

    #[error("residue level must be a non-negative number of mg/kg, got {0}")]
    InvalidResidue(f64),
}

/// Everything that can stop a compliance check from producing a result.
///
/// A missing record is not an error: it yields an `UNKNOWN` result.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Lookup(#[from] LookupError),
}

//! The read-only seam between the rule engine and a record store.

use std::error::Error as StdError;

use async_trait::async_trait;
use thiserror::Error;

use crate::{RegulatoryRecord, SubstanceSummary};

/// EU status a substitute substance must carry to be suggested.
pub const APPROVED_STATUS: &str = "Approved";

/// Maximum number of substitutes returned by [`RecordLookup::find_alternatives`].
pub const ALTERNATIVES_LIMIT: usize = 5;

/// A record store could not be reached or rejected the query.
///
/// Surfaced to the caller unchanged; the engine never retries.
#[derive(Debug, Error)]
#[error("{backend} lookup failed: {source}")]
pub struct LookupError {
    pub backend: &'static str,
    #[source]
    pub source: Box<dyn StdError + Send + Sync>,
}

impl LookupError {
    pub fn new(backend: &'static str, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            backend,
            source: source.into(),
        }
    }
}

/// Queryable table of crop × substance regulatory records.
///
/// Implementations are constructed by the caller and handed to
/// [`ComplianceChecker::new`](crate::ComplianceChecker::new).
#[async_trait]
pub trait RecordLookup: Send + Sync {
    /// First record whose crop and substance match, ignoring case.
    async fn find_record(
        &self,
        crop: &str,
        substance: &str,
    ) -> Result<Option<RegulatoryRecord>, LookupError>;

    /// Approved substances for `crop` whose pesticide type contains
    /// `pesticide_type` (case-insensitive), at most [`ALTERNATIVES_LIMIT`],
    /// in store order.
    ///
    /// Callers pass an empty type when the record has none; implementations
    /// return an empty list without querying in that case.
    async fn find_alternatives(
        &self,
        crop: &str,
        pesticide_type: &str,
    ) -> Result<Vec<String>, LookupError>;

    /// Every substance documented for `crop`, ordered by EU status descending
    /// then substance name ascending.
    async fn list_substances_for_crop(
        &self,
        crop: &str,
    ) -> Result<Vec<SubstanceSummary>, LookupError>;
}

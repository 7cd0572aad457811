pub mod batch;
pub mod error;
pub mod evaluator;
pub mod gap;
pub mod lookup;
pub mod market;
pub mod record;
pub mod result;
pub mod rules;
pub mod schema;

#[cfg(test)]
pub(crate) mod fixtures;

pub use batch::{BatchItem, BatchSummary};
pub use error::{CheckError, ValidationError};
pub use evaluator::ComplianceChecker;
pub use gap::GapRecommendations;
pub use lookup::{ALTERNATIVES_LIMIT, APPROVED_STATUS, LookupError, RecordLookup};
pub use market::Market;
pub use record::{RegulatoryRecord, SubstanceSummary};
pub use result::{ComplianceResult, Severity, Status};
pub use schema::pesticide_mrl;

//! Storage layer: DuckDB-backed `pesticide_mrl` table implementing `RecordLookup`.

mod error;
pub use error::StoreError;

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckStore;

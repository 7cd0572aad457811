//! Remote record stores: PostgREST/Supabase lookup of the `pesticide_mrl` table.

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{RestLookup, SyncError};

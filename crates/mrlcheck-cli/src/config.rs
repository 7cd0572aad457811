//! Record store selection from flags and environment.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Args;
use mrlcheck_core::RecordLookup;
use mrlcheck_store::DuckStore;
use mrlcheck_sync::RestLookup;
use tracing::info;

#[derive(Debug, Clone, Default, Args)]
pub struct StoreArgs {
    /// Persistent DuckDB database holding the `pesticide_mrl` table.
    #[arg(long, env = "MRLCHECK_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Parquet or CSV export of the MRL table, loaded at startup.
    #[arg(long, env = "MRLCHECK_DATA", global = true)]
    pub data: Option<PathBuf>,

    /// PostgREST/Supabase project URL serving the `pesticide_mrl` table.
    #[arg(long, env = "MRLCHECK_REST_URL", global = true)]
    pub rest_url: Option<String>,

    /// API key for the REST store.
    #[arg(long, env = "MRLCHECK_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Backend {
    Duck {
        db: Option<PathBuf>,
        data: Option<PathBuf>,
    },
    Rest {
        url: String,
        api_key: String,
    },
}

impl StoreArgs {
    /// Pick the record store. A REST URL wins over local files.
    pub fn backend(&self) -> anyhow::Result<Backend> {
        if let Some(url) = &self.rest_url {
            let Some(api_key) = &self.api_key else {
                bail!("REST store requires an API key. Set MRLCHECK_API_KEY or pass --api-key.");
            };
            return Ok(Backend::Rest {
                url: url.clone(),
                api_key: api_key.clone(),
            });
        }
        if self.db.is_none() && self.data.is_none() {
            bail!(
                "no record store configured. Set MRLCHECK_DB or MRLCHECK_DATA for a local \
                 database, or MRLCHECK_REST_URL and MRLCHECK_API_KEY for a remote one."
            );
        }
        Ok(Backend::Duck {
            db: self.db.clone(),
            data: self.data.clone(),
        })
    }
}

impl Backend {
    /// Build the lookup the checker will query.
    pub fn open(&self) -> anyhow::Result<Arc<dyn RecordLookup>> {
        match self {
            Self::Rest { url, api_key } => {
                info!(url = %url, "using remote record store");
                Ok(Arc::new(RestLookup::new(url.clone(), api_key.clone())))
            }
            Self::Duck { db, data } => {
                let store = match db {
                    Some(path) => DuckStore::open_persistent(path)
                        .with_context(|| format!("opening {}", path.display()))?,
                    None => DuckStore::open().context("opening in-memory database")?,
                };
                if let Some(data) = data {
                    store
                        .load_records(data)
                        .with_context(|| format!("loading {}", data.display()))?;
                } else if !store.has_table() {
                    bail!("database has no pesticide_mrl table. Run `mrlcheck load --db <PATH> --data <FILE>` first.");
                }
                Ok(Arc::new(store))
            }
        }
    }
}

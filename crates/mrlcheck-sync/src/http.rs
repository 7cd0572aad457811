//! HTTP lookup client for a PostgREST (Supabase) hosted `pesticide_mrl` table.

use async_trait::async_trait;
use mrlcheck_core::pesticide_mrl::TABLE;
use mrlcheck_core::{
    ALTERNATIVES_LIMIT, APPROVED_STATUS, LookupError, RecordLookup, RegulatoryRecord,
    SubstanceSummary,
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<SyncError> for LookupError {
    fn from(err: SyncError) -> Self {
        LookupError::new("postgrest", err)
    }
}

type Query = Vec<(&'static str, String)>;

/// Record lookup over PostgREST's REST interface.
///
/// Every request carries the API key both as `apikey` and as a bearer token,
/// which is what Supabase expects for anonymous or service-role keys.
pub struct RestLookup {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestLookup {
    /// Create a lookup client for the given project URL.
    ///
    /// `base_url` should be like `https://abc.supabase.co` (no trailing slash).
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{TABLE}", self.base_url)
    }

    async fn get_rows<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>, SyncError> {
        let url = self.table_url();
        let resp = self
            .client
            .get(&url)
            .query(query)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Server {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// First record matching crop and substance, ignoring case.
    ///
    /// `ilike` may still widen the match when a value contains `*`, so rows
    /// are checked for equality before one is returned.
    pub async fn record(
        &self,
        crop: &str,
        substance: &str,
    ) -> Result<Option<RegulatoryRecord>, SyncError> {
        let rows: Vec<RegulatoryRecord> = self.get_rows(&record_query(crop, substance)).await?;
        let record = rows.into_iter().find(|r| r.matches(crop, substance));
        debug!(crop, substance, found = record.is_some(), "remote record lookup");
        Ok(record)
    }

    /// Approved substances for `crop` whose type contains `pesticide_type`.
    pub async fn alternatives(
        &self,
        crop: &str,
        pesticide_type: &str,
    ) -> Result<Vec<String>, SyncError> {
        let pesticide_type = pesticide_type.trim();
        if pesticide_type.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<AlternativeRow> = self
            .get_rows(&alternatives_query(crop, pesticide_type))
            .await?;
        let wanted = pesticide_type.to_lowercase();
        Ok(rows
            .into_iter()
            .filter(|r| {
                same_text(&r.crop, crop)
                    && r
                        .pesticide_type
                        .as_deref()
                        .is_some_and(|t| t.to_lowercase().contains(&wanted))
            })
            .map(|r| r.active_substance)
            .take(ALTERNATIVES_LIMIT)
            .collect())
    }

    /// Every substance documented for `crop`.
    pub async fn substances_for_crop(
        &self,
        crop: &str,
    ) -> Result<Vec<SubstanceSummary>, SyncError> {
        info!(url = %self.table_url(), crop, "listing substances from remote store");
        let rows: Vec<ListedRow> = self.get_rows(&substances_query(crop)).await?;
        let rows: Vec<SubstanceSummary> = rows
            .into_iter()
            .filter(|r| same_text(&r.crop, crop))
            .map(|r| r.summary)
            .collect();
        info!(count = rows.len(), "listed substances");
        Ok(rows)
    }
}

#[derive(serde::Deserialize)]
struct AlternativeRow {
    crop: String,
    active_substance: String,
    #[serde(default)]
    pesticide_type: Option<String>,
}

#[derive(serde::Deserialize)]
struct ListedRow {
    crop: String,
    #[serde(flatten)]
    summary: SubstanceSummary,
}

fn same_text(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

#[async_trait]
impl RecordLookup for RestLookup {
    async fn find_record(
        &self,
        crop: &str,
        substance: &str,
    ) -> Result<Option<RegulatoryRecord>, LookupError> {
        Ok(self.record(crop, substance).await?)
    }

    async fn find_alternatives(
        &self,
        crop: &str,
        pesticide_type: &str,
    ) -> Result<Vec<String>, LookupError> {
        Ok(self.alternatives(crop, pesticide_type).await?)
    }

    async fn list_substances_for_crop(
        &self,
        crop: &str,
    ) -> Result<Vec<SubstanceSummary>, LookupError> {
        Ok(self.substances_for_crop(crop).await?)
    }
}

// ── Query construction ──

/// Escape LIKE metacharacters so `ilike` behaves as a case-insensitive equality.
///
/// PostgREST rewrites `*` to `%` before the pattern reaches the database, so
/// `*` cannot be escaped here. Queries built from such values drop their row
/// limit and callers filter the rows themselves.
fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn has_wildcard(values: &[&str]) -> bool {
    values.iter().any(|v| v.contains('*'))
}

fn record_query(crop: &str, substance: &str) -> Query {
    let mut query = vec![
        ("select", "*".to_string()),
        ("crop", format!("ilike.{}", escape_like(crop))),
        ("active_substance", format!("ilike.{}", escape_like(substance))),
    ];
    if !has_wildcard(&[crop, substance]) {
        query.push(("limit", "1".to_string()));
    }
    query
}

fn alternatives_query(crop: &str, pesticide_type: &str) -> Query {
    let mut query = vec![
        ("select", "crop,active_substance,pesticide_type".to_string()),
        ("crop", format!("ilike.{}", escape_like(crop))),
        (
            "pesticide_type",
            format!("ilike.*{}*", escape_like(pesticide_type)),
        ),
        ("eu_status", format!("eq.{APPROVED_STATUS}")),
    ];
    if !has_wildcard(&[crop, pesticide_type]) {
        query.push(("limit", ALTERNATIVES_LIMIT.to_string()));
    }
    query
}

fn substances_query(crop: &str) -> Query {
    vec![
        (
            "select",
            "crop,active_substance,pesticide_type,eu_status,mrl_eu,mrl_codex".to_string(),
        ),
        ("crop", format!("ilike.{}", escape_like(crop))),
        ("order", "eu_status.desc.nullslast,active_substance.asc".to_string()),
    ]
}

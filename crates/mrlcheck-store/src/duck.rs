//! DuckDB store for the `pesticide_mrl` regulatory table.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use arrow::array::{Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use duckdb::Connection;
use mrlcheck_core::pesticide_mrl::{self, COLUMNS, NUMERIC_COLUMNS, TABLE};
use mrlcheck_core::{
    ALTERNATIVES_LIMIT, APPROVED_STATUS, LookupError, RecordLookup, RegulatoryRecord,
    SubstanceSummary,
};
use tracing::{debug, info};

use crate::StoreError;

/// DuckDB store holding one row per crop × active substance.
///
/// Lookups match crop and substance case-insensitively and return rows in
/// table order. The connection sits behind a mutex so a single store can be
/// shared by concurrent checks.
///
/// Use [`open`](Self::open) for in-memory and [`open_persistent`](Self::open_persistent)
/// for a file-backed database that survives restarts.
pub struct DuckStore {
    conn: Mutex<Connection>,
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open or create a persistent DuckDB database at the given path.
    ///
    /// Use [`has_table`](Self::has_table) to check whether a load is needed.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Other("duckdb connection lock poisoned".into()))
    }

    /// Check whether the `pesticide_mrl` table exists.
    pub fn has_table(&self) -> bool {
        self.record_count().is_ok()
    }

    /// Create an empty `pesticide_mrl` table if none exists.
    pub fn create_table(&self) -> Result<(), StoreError> {
        let columns: Vec<String> = pesticide_mrl::schema()
            .fields()
            .iter()
            .map(|f| {
                let sql_type = match f.data_type() {
                    DataType::Float64 => "DOUBLE",
                    _ => "VARCHAR",
                };
                let not_null = if f.is_nullable() { "" } else { " NOT NULL" };
                format!("{} {sql_type}{not_null}", f.name())
            })
            .collect();
        let sql = format!("CREATE TABLE IF NOT EXISTS {TABLE} ({})", columns.join(", "));
        self.conn()?.execute_batch(&sql)?;
        Ok(())
    }

    /// Replace the `pesticide_mrl` table with the contents of a Parquet or CSV file.
    ///
    /// Returns the number of rows loaded. Fails if the file lacks any of the
    /// expected columns.
    pub fn load_records(&self, path: &Path) -> Result<usize, StoreError> {
        if !path.exists() {
            return Err(StoreError::SourceNotFound(path.to_path_buf()));
        }
        let reader = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("parquet") => "read_parquet",
            Some(ext) if ext.eq_ignore_ascii_case("csv") => "read_csv_auto",
            _ => return Err(StoreError::UnsupportedFormat(path.to_path_buf())),
        };
        let quoted = path.display().to_string().replace('\'', "''");
        let sql = format!("CREATE OR REPLACE TABLE {TABLE} AS SELECT * FROM {reader}('{quoted}')");
        self.conn()?.execute_batch(&sql)?;
        self.verify_columns()?;
        let count = self.record_count()?;
        info!(count, path = %path.display(), "loaded pesticide_mrl table");
        Ok(count)
    }

    fn verify_columns(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT * FROM {TABLE} LIMIT 0"))?;
        let schema = stmt.query_arrow([])?.get_schema();
        match COLUMNS.iter().find(|c| schema.index_of(c).is_err()) {
            Some(missing) => Err(StoreError::MissingColumn((*missing).to_string())),
            None => Ok(()),
        }
    }

    /// Number of rows in the `pesticide_mrl` table.
    pub fn record_count(&self) -> Result<usize, StoreError> {
        let batches = self.query_arrow(&format!("SELECT count(*)::BIGINT AS cnt FROM {TABLE}"))?;
        let batch = batches.first().ok_or(StoreError::NoResults)?;
        let col = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| StoreError::Other("count column not i64".into()))?;
        usize::try_from(col.value(0)).map_err(|e| StoreError::Other(e.to_string()))
    }

    // ── Lookups ──

    /// First record matching crop and substance, ignoring case.
    pub fn record(
        &self,
        crop: &str,
        substance: &str,
    ) -> Result<Option<RegulatoryRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {TABLE} \
             WHERE lower(crop) = lower(?) AND lower(active_substance) = lower(?) \
             LIMIT 1",
            select_list(COLUMNS)
        );
        let batches = self.query_arrow_with(&sql, &[crop, substance])?;
        let mut records = decode_records(&batches)?;
        debug!(crop, substance, found = !records.is_empty(), "record lookup");
        Ok(if records.is_empty() {
            None
        } else {
            Some(records.swap_remove(0))
        })
    }

    /// Approved substances for `crop` whose type contains `pesticide_type`.
    pub fn alternatives(
        &self,
        crop: &str,
        pesticide_type: &str,
    ) -> Result<Vec<String>, StoreError> {
        let pesticide_type = pesticide_type.trim();
        if pesticide_type.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT active_substance::VARCHAR AS active_substance FROM {TABLE} \
             WHERE lower(crop) = lower(?) \
               AND contains(lower(pesticide_type::VARCHAR), lower(?)) \
               AND eu_status = ? \
             LIMIT {ALTERNATIVES_LIMIT}"
        );
        let batches = self.query_arrow_with(&sql, &[crop, pesticide_type, APPROVED_STATUS])?;
        let mut names = Vec::new();
        for batch in &batches {
            let col = text_column(batch, "active_substance")?;
            names.extend((0..col.len()).filter_map(|i| text(&col, i)));
        }
        Ok(names)
    }

    /// Every substance for `crop`, by EU status descending then name.
    pub fn substances_for_crop(&self, crop: &str) -> Result<Vec<SubstanceSummary>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {TABLE} \
             WHERE lower(crop) = lower(?) \
             ORDER BY eu_status DESC NULLS LAST, active_substance ASC",
            select_list(&[
                "active_substance",
                "pesticide_type",
                "eu_status",
                "mrl_eu",
                "mrl_codex",
            ])
        );
        let batches = self.query_arrow_with(&sql, &[crop])?;
        let mut rows = Vec::new();
        for batch in &batches {
            let substance = text_column(batch, "active_substance")?;
            let pesticide_type = text_column(batch, "pesticide_type")?;
            let eu_status = text_column(batch, "eu_status")?;
            let mrl_eu = float_column(batch, "mrl_eu")?;
            let mrl_codex = float_column(batch, "mrl_codex")?;
            for i in 0..batch.num_rows() {
                rows.push(SubstanceSummary {
                    active_substance: text(&substance, i).unwrap_or_default(),
                    pesticide_type: text(&pesticide_type, i),
                    eu_status: text(&eu_status, i),
                    mrl_eu: float(&mrl_eu, i),
                    mrl_codex: float(&mrl_codex, i),
                });
            }
        }
        Ok(rows)
    }

    // ── Escape hatches ──

    /// Execute arbitrary SQL and return Arrow RecordBatches.
    pub fn query_arrow(&self, sql: &str) -> Result<Vec<RecordBatch>, StoreError> {
        self.query_arrow_with(sql, &[])
    }

    /// Execute one or more statements that return no rows.
    pub fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        self.conn()?.execute_batch(sql)?;
        Ok(())
    }

    fn query_arrow_with(&self, sql: &str, params: &[&str]) -> Result<Vec<RecordBatch>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let batches: Vec<RecordBatch> = stmt
            .query_arrow(duckdb::params_from_iter(params.iter()))?
            .collect();
        Ok(batches)
    }
}

#[async_trait]
impl RecordLookup for DuckStore {
    async fn find_record(
        &self,
        crop: &str,
        substance: &str,
    ) -> Result<Option<RegulatoryRecord>, LookupError> {
        Ok(self.record(crop, substance)?)
    }

    async fn find_alternatives(
        &self,
        crop: &str,
        pesticide_type: &str,
    ) -> Result<Vec<String>, LookupError> {
        Ok(self.alternatives(crop, pesticide_type)?)
    }

    async fn list_substances_for_crop(
        &self,
        crop: &str,
    ) -> Result<Vec<SubstanceSummary>, LookupError> {
        Ok(self.substances_for_crop(crop)?)
    }
}

// ── Row decoding ──

/// Select list casting every column to the type the decoder expects, so
/// tables loaded from loosely-typed CSV decode the same as typed ones.
fn select_list(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|&c| {
            if NUMERIC_COLUMNS.contains(&c) {
                format!("TRY_CAST({c} AS DOUBLE) AS {c}")
            } else {
                format!("CAST({c} AS VARCHAR) AS {c}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn decode_records(batches: &[RecordBatch]) -> Result<Vec<RegulatoryRecord>, StoreError> {
    let mut records = Vec::new();
    for batch in batches {
        let col = |name: &str| text_column(batch, name);
        let crop = col("crop")?;
        let substance = col("active_substance")?;
        let eu_status = col("eu_status")?;
        let eu_expiration = col("eu_expiration")?;
        let mrl_eu = float_column(batch, "mrl_eu")?;
        let mrl_eu_flag = col("mrl_eu_flag")?;
        let mrl_codex = float_column(batch, "mrl_codex")?;
        let mrl_codex_flag = col("mrl_codex_flag")?;
        let pesticide_type = col("pesticide_type")?;
        let dose = col("dose")?;
        let max_applications = col("max_applications")?;
        let interval_days = col("interval_days")?;
        let preharvest_eu = col("preharvest_eu")?;
        let preharvest_codex = col("preharvest_codex")?;
        let who_class = col("who_class")?;
        let resistance_group = col("resistance_group")?;

        for i in 0..batch.num_rows() {
            records.push(RegulatoryRecord {
                crop: text(&crop, i).unwrap_or_default(),
                active_substance: text(&substance, i).unwrap_or_default(),
                eu_status: text(&eu_status, i),
                eu_expiration_date: text(&eu_expiration, i),
                mrl_eu: float(&mrl_eu, i),
                mrl_eu_flag: text(&mrl_eu_flag, i),
                mrl_codex: float(&mrl_codex, i),
                mrl_codex_flag: text(&mrl_codex_flag, i),
                pesticide_type: text(&pesticide_type, i),
                dose: text(&dose, i),
                max_applications: text(&max_applications, i),
                interval_days: text(&interval_days, i),
                preharvest_interval_eu: text(&preharvest_eu, i),
                preharvest_interval_codex: text(&preharvest_codex, i),
                who_toxicity_class: text(&who_class, i),
                resistance_group: text(&resistance_group, i),
            });
        }
    }
    Ok(records)
}

fn text_column(batch: &RecordBatch, name: &str) -> Result<StringArray, StoreError> {
    let col = batch
        .column_by_name(name)
        .ok_or_else(|| StoreError::MissingColumn(name.to_string()))?;
    let cast = arrow::compute::cast(col, &DataType::Utf8)?;
    cast.as_any()
        .downcast_ref::<StringArray>()
        .cloned()
        .ok_or_else(|| StoreError::Other(format!("{name} column not utf8")))
}

fn float_column(batch: &RecordBatch, name: &str) -> Result<Float64Array, StoreError> {
    let col = batch
        .column_by_name(name)
        .ok_or_else(|| StoreError::MissingColumn(name.to_string()))?;
    let cast = arrow::compute::cast(col, &DataType::Float64)?;
    cast.as_any()
        .downcast_ref::<Float64Array>()
        .cloned()
        .ok_or_else(|| StoreError::Other(format!("{name} column not f64")))
}

fn text(col: &StringArray, i: usize) -> Option<String> {
    (!col.is_null(i)).then(|| col.value(i).to_string())
}

fn float(col: &Float64Array, i: usize) -> Option<f64> {
    (!col.is_null(i)).then(|| col.value(i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use mrlcheck_core::{ComplianceChecker, Severity, Status};

    const ROWS: &str = "
        INSERT INTO pesticide_mrl (crop, active_substance, eu_status, eu_expiration, mrl_eu, mrl_eu_flag, mrl_codex, pesticide_type, dose, max_applications, preharvest_eu) VALUES
            ('Mango', 'Alpha-cypermethrin', 'Not approved', NULL, 0.05, NULL, 0.7, 'Insecticide', '0.2 L/ha', '2', '14'),
            ('Mango', 'Azoxystrobin', 'Approved', '2033-12-31', 5.0, NULL, NULL, 'Fungicide', '0.5 L/ha', '3', '7'),
            ('Mango', 'Lambda-cyhalothrin', 'Approved', NULL, 0.2, NULL, 0.2, 'Insecticide (pyrethroid)', NULL, NULL, NULL),
            ('Mango', 'Spinosad', 'Approved', NULL, 0.3, NULL, NULL, 'insecticide', NULL, NULL, NULL),
            ('Mango', 'Chlorpyrifos', 'Not listed', NULL, 0.01, 'LOQ', 1.0, 'Insecticide', NULL, NULL, NULL),
            ('Mango', 'Dimethoate', 'Not approved', NULL, 0.01, 'LOQ', NULL, 'Insecticide', NULL, NULL, NULL),
            ('Tomato', 'Acetamiprid', 'Approved', NULL, 0.5, NULL, 0.2, 'Insecticide', NULL, NULL, NULL);
    ";

    fn seeded() -> DuckStore {
        let store = DuckStore::open().unwrap();
        store.create_table().unwrap();
        store.execute_batch(ROWS).unwrap();
        store
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn open_in_memory() {
        let store = DuckStore::open().unwrap();
        let batches = store.query_arrow("SELECT 1 AS x").unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].num_rows(), 1);
    }

    #[test]
    fn has_table_false_for_empty_memory() {
        let store = DuckStore::open().unwrap();
        assert!(!store.has_table());
        store.create_table().unwrap();
        assert!(store.has_table());
        assert_eq!(store.record_count().unwrap(), 0);
    }

    #[test]
    fn record_lookup_ignores_case() {
        let store = seeded();
        let record = store.record("MANGO", "azoxystrobin").unwrap().unwrap();
        assert_eq!(record.crop, "Mango");
        assert_eq!(record.active_substance, "Azoxystrobin");
        assert_eq!(record.mrl_eu, Some(5.0));
        assert_eq!(record.eu_expiration_date.as_deref(), Some("2033-12-31"));
        assert_eq!(record.dose.as_deref(), Some("0.5 L/ha"));
        assert!(record.mrl_codex.is_none());
        assert!(record.who_toxicity_class.is_none());
    }

    #[test]
    fn record_lookup_is_exact_not_pattern() {
        let store = seeded();
        assert!(store.record("mango", "Azoxy%").unwrap().is_none());
        assert!(store.record("mango", "Azoxystrobin ").unwrap().is_none());
        assert!(store.record("tomato", "Azoxystrobin").unwrap().is_none());
    }

    #[test]
    fn duplicate_rows_return_first() {
        let store = seeded();
        store
            .execute_batch(
                "INSERT INTO pesticide_mrl (crop, active_substance, eu_status, mrl_eu) \
                 VALUES ('mango', 'AZOXYSTROBIN', 'Approved', 9.9)",
            )
            .unwrap();
        let record = store.record("mango", "azoxystrobin").unwrap().unwrap();
        assert_eq!(record.mrl_eu, Some(5.0));
    }

    #[test]
    fn alternatives_filter_type_status_and_crop() {
        let store = seeded();
        let alts = store.alternatives("mango", "INSECTICIDE").unwrap();
        assert_eq!(alts, vec!["Lambda-cyhalothrin", "Spinosad"]);
        assert!(store.alternatives("mango", "Herbicide").unwrap().is_empty());
    }

    #[test]
    fn alternatives_empty_type_is_noop() {
        let store = seeded();
        assert!(store.alternatives("mango", "").unwrap().is_empty());
        assert!(store.alternatives("mango", "   ").unwrap().is_empty());
    }

    #[test]
    fn alternatives_are_capped() {
        let store = seeded();
        let values: Vec<String> = (0..8)
            .map(|i| format!("('Mango', 'Bio-{i}', 'Approved', 'Bio-insecticide')"))
            .collect();
        store
            .execute_batch(&format!(
                "INSERT INTO pesticide_mrl (crop, active_substance, eu_status, pesticide_type) VALUES {}",
                values.join(", ")
            ))
            .unwrap();
        let alts = store.alternatives("mango", "insecticide").unwrap();
        assert_eq!(alts.len(), ALTERNATIVES_LIMIT);
    }

    #[test]
    fn substances_for_crop_are_ordered() {
        let store = seeded();
        let rows = store.substances_for_crop("mango").unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.active_substance.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Chlorpyrifos",
                "Alpha-cypermethrin",
                "Dimethoate",
                "Azoxystrobin",
                "Lambda-cyhalothrin",
                "Spinosad",
            ]
        );
        assert_eq!(rows[0].mrl_codex, Some(1.0));
        assert!(store.substances_for_crop("papaya").unwrap().is_empty());
    }

    #[test]
    fn load_missing_file_errors() {
        let store = DuckStore::open().unwrap();
        let result = store.load_records(Path::new("/nonexistent/file.parquet"));
        assert!(matches!(result, Err(StoreError::SourceNotFound(_))));
    }

    #[test]
    fn load_unsupported_format_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("records.xlsx");
        std::fs::write(&path, b"").unwrap();
        let store = DuckStore::open().unwrap();
        let result = store.load_records(&path);
        assert!(matches!(result, Err(StoreError::UnsupportedFormat(_))));
    }

    fn write_csv(dir: &Path, header: &str, rows: &[&str]) -> std::path::PathBuf {
        let path = dir.join("pesticide_mrl.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{header}").unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        path
    }

    const HEADER: &str = "crop,active_substance,eu_status,eu_expiration,mrl_eu,mrl_eu_flag,mrl_codex,mrl_codex_flag,pesticide_type,dose,max_applications,interval_days,preharvest_eu,preharvest_codex,who_class,resistance_group";

    #[test]
    fn load_csv_and_lookup() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_csv(
            tmp.path(),
            HEADER,
            &[
                "Tomato,Azoxystrobin,Approved,2033-12-31,3,,3,,Fungicide,0.8 L/ha,3,10,3,3,U,11",
                "Tomato,Chlorothalonil,Not approved,,0.01,LOQ,5,,Fungicide,,,,,,,M5",
            ],
        );
        let store = DuckStore::open().unwrap();
        assert_eq!(store.load_records(&path).unwrap(), 2);

        let record = store.record("tomato", "AZOXYSTROBIN").unwrap().unwrap();
        assert_eq!(record.mrl_eu, Some(3.0));
        assert_eq!(record.eu_expiration_date.as_deref(), Some("2033-12-31"));
        assert_eq!(record.max_applications.as_deref(), Some("3"));
        assert_eq!(record.who_toxicity_class.as_deref(), Some("U"));

        let banned = store.record("tomato", "chlorothalonil").unwrap().unwrap();
        assert_eq!(banned.mrl_eu_flag.as_deref(), Some("LOQ"));
        assert!(banned.eu_expiration_date.is_none());
        assert_eq!(
            store.alternatives("tomato", "fungicide").unwrap(),
            vec!["Azoxystrobin"]
        );
    }

    #[test]
    fn load_csv_missing_column_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_csv(
            tmp.path(),
            "crop,active_substance,eu_status",
            &["Tomato,Azoxystrobin,Approved"],
        );
        let store = DuckStore::open().unwrap();
        let result = store.load_records(&path);
        assert!(matches!(result, Err(StoreError::MissingColumn(ref c)) if c == "eu_expiration"));
    }

    #[test]
    fn persistent_load_and_reopen() {
        let tmp = tempfile::TempDir::new().unwrap();
        let csv = write_csv(
            tmp.path(),
            HEADER,
            &["Mango,Spinosad,Approved,,0.3,,,,Insecticide,,,,,,,5"],
        );
        let db_path = tmp.path().join("mrl.duckdb");

        let store = DuckStore::open_persistent(&db_path).unwrap();
        assert!(!store.has_table());
        store.load_records(&csv).unwrap();
        drop(store);

        let store = DuckStore::open_persistent(&db_path).unwrap();
        assert!(store.has_table());
        assert_eq!(store.record_count().unwrap(), 1);
        assert!(store.record("MANGO", "spinosad").unwrap().is_some());
    }

    // ── Through the rule engine ──

    fn checker() -> ComplianceChecker {
        ComplianceChecker::new(Arc::new(seeded()))
    }

    #[tokio::test]
    async fn non_approved_on_duckdb_is_critical() {
        let result = checker()
            .evaluate_at("mango", "Alpha-cypermethrin", "EU", Some(0.5), now())
            .await
            .unwrap();
        assert_eq!(result.status, Status::NonCompliant);
        assert_eq!(result.severity, Severity::Critical);
        assert_eq!(
            result.alternatives,
            Some(vec!["Lambda-cyhalothrin".to_string(), "Spinosad".to_string()])
        );
    }

    #[tokio::test]
    async fn residue_scenarios_on_duckdb() {
        let checker = checker();
        let ok = checker
            .evaluate_at("mango", "Azoxystrobin", "EU", Some(2.0), now())
            .await
            .unwrap();
        assert_eq!((ok.status, ok.severity), (Status::Compliant, Severity::Info));

        let over = checker
            .evaluate_at("mango", "Azoxystrobin", "EU", Some(5.5), now())
            .await
            .unwrap();
        assert_eq!((over.status, over.severity), (Status::NonCompliant, Severity::Major));
    }

    #[tokio::test]
    async fn unknown_and_codex_scenarios_on_duckdb() {
        let checker = checker();
        let unknown = checker
            .evaluate_at("tomato", "Unknownicide", "EU", None, now())
            .await
            .unwrap();
        assert_eq!(unknown.status, Status::Unknown);
        assert!(unknown.gap_recommendations.is_none());

        let no_codex = checker
            .evaluate_at("mango", "Azoxystrobin", "Codex", None, now())
            .await
            .unwrap();
        assert_eq!(no_codex.status, Status::Unknown);
        assert!(no_codex.gap_recommendations.is_some());

        let err = checker
            .evaluate_at("mango", "Azoxystrobin", "FR", None, now())
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn lookup_errors_surface_as_lookup_failures() {
        // No table: every query fails.
        let checker = ComplianceChecker::new(Arc::new(DuckStore::open().unwrap()));
        let err = checker
            .evaluate_at("mango", "Azoxystrobin", "EU", None, now())
            .await
            .unwrap_err();
        assert!(matches!(err, mrlcheck_core::CheckError::Lookup(_)));
    }
}

/// Arrow schema of the `pesticide_mrl` regulatory table.
pub mod pesticide_mrl {
    use arrow::datatypes::{DataType, Field, Schema};

    pub const TABLE: &str = "pesticide_mrl";

    /// Columns decoded as 64-bit floats; everything else is text.
    pub const NUMERIC_COLUMNS: &[&str] = &["mrl_eu", "mrl_codex"];

    /// Columns in table order.
    pub const COLUMNS: &[&str] = &[
        "crop",
        "active_substance",
        "eu_status",
        "eu_expiration",
        "mrl_eu",
        "mrl_eu_flag",
        "mrl_codex",
        "mrl_codex_flag",
        "pesticide_type",
        "dose",
        "max_applications",
        "interval_days",
        "preharvest_eu",
        "preharvest_codex",
        "who_class",
        "resistance_group",
    ];

    /// Schema for one row per crop × active substance.
    ///
    /// Only the identifying pair is non-nullable. Expiration dates are kept
    /// as text because source sheets are not consistently formatted.
    pub fn schema() -> Schema {
        Schema::new(
            COLUMNS
                .iter()
                .map(|&name| {
                    let data_type = if NUMERIC_COLUMNS.contains(&name) {
                        DataType::Float64
                    } else {
                        DataType::Utf8
                    };
                    let nullable = !matches!(name, "crop" | "active_substance");
                    Field::new(name, data_type, nullable)
                })
                .collect::<Vec<_>>(),
        )
    }
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceOrDerived {
    Source,
    Derived,
}

impl SourceOrDerived {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceOrDerived::Source => "SOURCE",
            SourceOrDerived::Derived => "DERIVED",
        }
    }
}

/// The per-dashboard flat table produced by phase 2 (`tables_columns.csv`)
/// and enriched by phase 3 (`tables_columns_enriched.csv`, adding
/// `datatype`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableColumnRow {
    pub table_name: String,
    pub column_name: String,
    pub alias: String,
    pub source_or_derived: SourceOrDerived,
    #[serde(default)]
    pub derived_logic: Option<String>,
    pub chart_id: i64,
    pub chart_label: String,
    #[serde(default)]
    pub datatype: Option<String>,
}

/// Column schema order for `tables_columns.csv`, stable across runs.
pub const TABLES_COLUMNS_HEADER: [&str; 7] = [
    "tables_involved",
    "column_names",
    "alias_column_name",
    "source_or_derived",
    "derived_column_logic",
    "chart_id",
    "chart_label",
];

/// Column schema order for `tables_columns_enriched.csv`.
pub const TABLES_COLUMNS_ENRICHED_HEADER: [&str; 8] = [
    "tables_involved",
    "column_names",
    "alias_column_name",
    "source_or_derived",
    "derived_column_logic",
    "chart_id",
    "chart_label",
    "column_datatype",
];

impl TableColumnRow {
    pub fn to_csv_record(&self, enriched: bool) -> Vec<String> {
        let mut record = vec![
            self.table_name.clone(),
            self.column_name.clone(),
            self.alias.clone(),
            self.source_or_derived.as_str().to_string(),
            self.derived_logic.clone().unwrap_or_default(),
            self.chart_id.to_string(),
            self.chart_label.clone(),
        ];
        if enriched {
            record.push(self.datatype.clone().unwrap_or_default());
        }
        record
    }
}

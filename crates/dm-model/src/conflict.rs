use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    TableCategorical,
    TableFreeText,
    ColumnDatatype,
    ColumnDescription,
    ColumnRequiredFlag,
    JoiningRemarks,
    TermDefinition,
}

/// A record of a lossy merge resolution: two or more dashboards disagreed
/// on a field's value and the merge engine had to pick (or synthesize) one.
///
/// Invariant: every conflict references at least two distinct source
/// dashboards and at least two distinct variant values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConflictRecord {
    pub kind: ConflictKind,
    pub subject_key: String,
    pub sources: Vec<i64>,
    pub values: Vec<String>,
    pub resolution: String,
}

impl ConflictRecord {
    pub fn is_well_formed(&self) -> bool {
        let mut distinct_sources = self.sources.clone();
        distinct_sources.sort_unstable();
        distinct_sources.dedup();

        let mut distinct_values = self.values.clone();
        distinct_values.sort();
        distinct_values.dedup();

        distinct_sources.len() >= 2 && distinct_values.len() >= 2
    }
}

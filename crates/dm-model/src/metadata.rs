use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableMetadata {
    pub table_name: String,
    pub table_description: String,
    pub refresh_frequency: String,
    pub vertical: String,
    pub partition_column: String,
    pub remarks: String,
    pub relationship_context: String,
}

pub const TABLE_METADATA_HEADER: [&str; 7] = [
    "table_name",
    "table_description",
    "refresh_frequency",
    "vertical",
    "partition_column",
    "remarks",
    "relationship_context",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnMetadata {
    pub table_name: String,
    pub column_name: String,
    pub variable_type: String,
    pub column_description: String,
    pub required_flag: bool,
}

pub const COLUMNS_METADATA_HEADER: [&str; 5] = [
    "table_name",
    "column_name",
    "variable_type",
    "column_description",
    "required_flag",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoiningType {
    Inner,
    Left,
    Right,
    Full,
}

impl JoiningType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoiningType::Inner => "INNER",
            JoiningType::Left => "LEFT",
            JoiningType::Right => "RIGHT",
            JoiningType::Full => "FULL",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoiningCondition {
    pub table1: String,
    pub table2: String,
    pub joining_condition: String,
    pub joining_type: JoiningType,
    pub remarks: String,
}

pub const JOINING_CONDITIONS_HEADER: [&str; 5] = [
    "table1",
    "table2",
    "joining_condition",
    "joining_type",
    "remarks",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TermDefinition {
    pub term: String,
    #[serde(rename = "type")]
    pub term_type: String,
    pub definition: String,
    /// Comma-joined list of aliases; populated with synonyms by the merge
    /// engine's term-clustering step.
    pub business_alias: String,
}

pub const DEFINITIONS_HEADER: [&str; 4] = ["term", "type", "definition", "business_alias"];

/// Filter-conditions artifact is a free-text document, one block per chart,
/// not a row-oriented CSV.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FilterConditionsDoc {
    pub dashboard_id: i64,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joining_type_renders_uppercase() {
        assert_eq!(JoiningType::Inner.as_str(), "INNER");
        assert_eq!(JoiningType::Full.as_str(), "FULL");
    }
}

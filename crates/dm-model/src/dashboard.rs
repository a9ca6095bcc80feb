use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Copy)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    Table,
    Line,
    Bar,
    Pie,
    BigNumber,
    Area,
    Scatter,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metric {
    pub label: String,
    pub expression: String,
    #[serde(default)]
    pub aggregate: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Filter {
    pub column: String,
    pub operator: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeRange {
    pub column: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub grain: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartRecord {
    pub chart_id: i64,
    pub chart_name: String,
    pub chart_type: ChartType,
    pub dataset_id: i64,
    pub dataset_name: String,
    pub database_name: String,
    #[serde(default)]
    pub sql_query: Option<String>,
    #[serde(default)]
    pub metrics: Vec<Metric>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub groupby_columns: Vec<String>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub time_range: Option<TimeRange>,
}

impl ChartRecord {
    /// Charts with no retrievable SQL are retained in the dashboard record
    /// but skipped by every SQL-consuming phase (2, 6, 7, 8).
    pub fn has_sql(&self) -> bool {
        self.sql_query
            .as_deref()
            .is_some_and(|sql| !sql.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardRecord {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub owner: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub changed_at: chrono::DateTime<chrono::Utc>,
    pub charts: Vec<ChartRecord>,
}

impl DashboardRecord {
    pub fn charts_with_sql(&self) -> impl Iterator<Item = &ChartRecord> {
        self.charts.iter().filter(|chart| chart.has_sql())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardSummary {
    pub id: i64,
    pub title: String,
    pub tags: Vec<String>,
}

//! Wire-format DTOs for the upstream BI service's JSON responses. Kept
//! separate from `dm_model`'s domain types since the upstream's field
//! naming (snake_case REST conventions typical of this class of BI
//! service) does not always match the normalized domain shape.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardHeaderResponse {
    pub id: i64,
    pub dashboard_title: String,
    pub url: String,
    pub owner: String,
    pub created_on_utc: chrono::DateTime<chrono::Utc>,
    pub changed_on_utc: chrono::DateTime<chrono::Utc>,
    pub chart_ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardSummaryResponse {
    pub id: i64,
    pub dashboard_title: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartMetadataResponse {
    pub id: i64,
    pub slice_name: String,
    pub viz_type: String,
    pub datasource_id: i64,
    pub datasource_name: String,
    #[serde(default)]
    pub database_name: Option<String>,
    #[serde(default)]
    pub params: ChartParamsResponse,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartParamsResponse {
    #[serde(default)]
    pub metrics: Vec<MetricResponse>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub groupby: Vec<String>,
    #[serde(default)]
    pub adhoc_filters: Vec<FilterResponse>,
    #[serde(default)]
    pub time_range: Option<String>,
    #[serde(default)]
    pub granularity_sqla: Option<String>,
    #[serde(default)]
    pub time_grain_sqla: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MetricResponse {
    Label(String),
    Expression {
        label: String,
        #[serde(default)]
        expression_type: Option<String>,
        #[serde(default)]
        sql_expression: Option<String>,
        #[serde(default)]
        aggregate: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterResponse {
    pub subject: String,
    pub operator: String,
    #[serde(default)]
    pub comparator: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartDataResponse {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetResponse {
    #[serde(default)]
    pub sql: Option<String>,
}

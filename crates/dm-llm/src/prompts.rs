//! The typed prompt registry: each LLM-backed phase operation gets one
//! function taking a structured input and returning a structured output,
//! with no reflection or decorator metaprogramming behind it — just a
//! hand-written system/user template and a `serde_json::Value` -> typed
//! struct decode at the call site.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::gateway::LlmGatewayHandle;
use crate::types::{CompletionRequest, LlmError};

fn decode<T: for<'de> Deserialize<'de>>(value: serde_json::Value) -> Result<T, LlmError> {
    serde_json::from_value(value.clone())
        .map_err(|error| LlmError::MalformedOutput(format!("{error}: {value}")))
}

async fn call(
    gateway: &LlmGatewayHandle,
    system: &str,
    user: serde_json::Value,
) -> Result<serde_json::Value, LlmError> {
    let request = CompletionRequest {
        system: system.to_string(),
        user: user.to_string(),
        max_tokens: 2_048,
        temperature: 0.0,
        json_mode: true,
    };
    gateway.complete_json(request).await
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ExtractSourceTablesColumnsOutput {
    pub source_tables: Vec<String>,
    pub source_columns: Vec<String>,
    #[serde(default)]
    pub derived_columns_map: std::collections::BTreeMap<String, String>,
}

pub async fn extract_source_tables_columns(
    gateway: &LlmGatewayHandle,
    sql: &str,
    chart_metadata: &serde_json::Value,
) -> Result<ExtractSourceTablesColumnsOutput, LlmError> {
    let system = "You extract the source tables and columns a SQL query reads from, \
        distinguishing columns computed by an expression (derived) from columns read \
        directly off a table (source). Respond as JSON with keys source_tables, \
        source_columns, and derived_columns_map (maps a derived column name to the \
        expression that computes it).";
    let user = json!({"sql": sql, "chart_metadata": chart_metadata});
    decode(call(gateway, system, user).await?)
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DescribeTableOutput {
    pub description: String,
    pub refresh_frequency: String,
    pub vertical: String,
    pub partition_column: String,
    pub remarks: String,
    pub relationship_context: String,
}

pub async fn describe_table(
    gateway: &LlmGatewayHandle,
    dashboard_title: &str,
    table_name: &str,
    columns_with_usage: &serde_json::Value,
    sample_sql: &str,
) -> Result<DescribeTableOutput, LlmError> {
    let system = "You write concise business-facing documentation for a data warehouse \
        table given the dashboard that uses it and a sample of the columns and SQL that \
        reference it. Respond as JSON with keys description, refresh_frequency, vertical, \
        partition_column, remarks, relationship_context.";
    let user = json!({
        "dashboard_title": dashboard_title,
        "table_name": table_name,
        "columns_with_usage": columns_with_usage,
        "sample_sql": sample_sql,
    });
    decode(call(gateway, system, user).await?)
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DescribeColumnOutput {
    pub description: String,
}

pub async fn describe_column(
    gateway: &LlmGatewayHandle,
    column: &str,
    table: &str,
    datatype: Option<&str>,
    chart_labels: &[String],
    sql_usage: &str,
) -> Result<DescribeColumnOutput, LlmError> {
    let system = "You write a one- or two-sentence business description of a data \
        warehouse column given its table, datatype, the chart labels that reference it, \
        and a sample of SQL using it. Respond as JSON with key description.";
    let user = json!({
        "column": column,
        "table": table,
        "datatype": datatype,
        "chart_labels": chart_labels,
        "sql_usage": sql_usage,
    });
    decode(call(gateway, system, user).await?)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoiningTypeOutput {
    Inner,
    Left,
    Right,
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractJoinConditionOutput {
    pub joining_condition: String,
    pub joining_type: JoiningTypeOutput,
    pub remarks: String,
}

pub async fn extract_join_condition(
    gateway: &LlmGatewayHandle,
    table1: &str,
    table2: &str,
    sql: &str,
    context: &serde_json::Value,
) -> Result<ExtractJoinConditionOutput, LlmError> {
    let system = "You identify how two tables are joined in a SQL query. Respond as JSON \
        with keys joining_condition (the predicate), joining_type (one of INNER, LEFT, \
        RIGHT, FULL), and remarks.";
    let user = json!({"table1": table1, "table2": table2, "sql": sql, "context": context});
    decode(call(gateway, system, user).await?)
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ExtractFilterConditionsOutput {
    pub documentation: String,
}

pub async fn extract_filter_conditions(
    gateway: &LlmGatewayHandle,
    dashboard_title: &str,
    chart_labels: &[String],
    sql: &str,
    metrics: &serde_json::Value,
) -> Result<ExtractFilterConditionsOutput, LlmError> {
    let system = "You write free-text documentation describing the filter conditions a \
        dashboard's charts apply, in business terms. Respond as JSON with key \
        documentation.";
    let user = json!({
        "dashboard_title": dashboard_title,
        "chart_labels": chart_labels,
        "sql": sql,
        "metrics": metrics,
    });
    decode(call(gateway, system, user).await?)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TermDefinitionOutput {
    pub term: String,
    #[serde(rename = "type")]
    pub term_type: String,
    pub definition: String,
    pub business_alias: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ExtractTermDefinitionsOutput {
    pub terms: Vec<TermDefinitionOutput>,
}

pub async fn extract_term_definitions(
    gateway: &LlmGatewayHandle,
    dashboard_title: &str,
    chart_names_and_labels: &serde_json::Value,
    sql: &str,
    metrics: &serde_json::Value,
) -> Result<ExtractTermDefinitionsOutput, LlmError> {
    let system = "You extract the business terms a dashboard's charts define or rely on \
        (metric names, dimension names, acronyms). Respond as JSON with key terms, an \
        array of objects each with term, type, definition, business_alias.";
    let user = json!({
        "dashboard_title": dashboard_title,
        "charts": chart_names_and_labels,
        "sql": sql,
        "metrics": metrics,
    });
    decode(call(gateway, system, user).await?)
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MergedWithConflictsOutput {
    pub merged: serde_json::Value,
    #[serde(default)]
    pub conflicting_fields: Vec<String>,
}

pub async fn merge_table(gateway: &LlmGatewayHandle, variants: &[serde_json::Value]) -> Result<MergedWithConflictsOutput, LlmError> {
    merge_entity(gateway, "table descriptions", variants).await
}

pub async fn merge_column(gateway: &LlmGatewayHandle, variants: &[serde_json::Value]) -> Result<MergedWithConflictsOutput, LlmError> {
    merge_entity(gateway, "column descriptions", variants).await
}

pub async fn merge_join(gateway: &LlmGatewayHandle, variants: &[serde_json::Value]) -> Result<MergedWithConflictsOutput, LlmError> {
    merge_entity(gateway, "join condition remarks", variants).await
}

pub async fn merge_term(gateway: &LlmGatewayHandle, variants: &[serde_json::Value]) -> Result<MergedWithConflictsOutput, LlmError> {
    merge_entity(gateway, "business term definitions", variants).await
}

async fn merge_entity(
    gateway: &LlmGatewayHandle,
    entity_label: &str,
    variants: &[serde_json::Value],
) -> Result<MergedWithConflictsOutput, LlmError> {
    let system = format!(
        "You are given {entity_label} produced independently from {count} different \
         dashboards describing what should be the same real-world entity. Produce one \
         merged, consolidated free-text value that reconciles the variants, and list the \
         field names where the variants meaningfully disagreed. Respond as JSON with keys \
         merged and conflicting_fields.",
        entity_label = entity_label,
        count = variants.len(),
    );
    let user = json!({"variants": variants});
    decode(call(gateway, &system, user).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joining_type_output_serializes_uppercase() {
        let value = serde_json::to_value(JoiningTypeOutput::Left).expect("serialize");
        assert_eq!(value, serde_json::json!("LEFT"));
    }

    #[test]
    fn decode_reports_raw_value_on_mismatch() {
        let result: Result<DescribeColumnOutput, LlmError> = decode(json!({"wrong_key": "x"}));
        assert!(matches!(result, Err(LlmError::MalformedOutput(_))));
    }
}
